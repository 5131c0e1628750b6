//! Headless dashboard console for the test-automation platform.
//!
//! Connects to the orchestration server, renders the live console to stdout,
//! and accepts operator commands on stdin. All state transitions run on one
//! cooperative event queue (current-thread runtime, no locking).

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use dashboard::dispatch::{Dashboard, DashboardEvent, OperatorAction};
use dashboard::io::config::load_config;
use dashboard::io::session_store::SessionStore;

#[derive(Parser)]
#[command(
    name = "dashboard",
    version,
    about = "Live console for driving and observing automated app test runs"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "dashboard.toml")]
    config: PathBuf,

    /// Directory holding the persisted session snapshot.
    #[arg(long, default_value = ".dashboard/state")]
    state_dir: PathBuf,

    /// Override the orchestration server base URL from the config.
    #[arg(long)]
    base_url: Option<String>,

    /// Override the active application variant from the config.
    #[arg(long)]
    variant: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dashboard::logging::init();
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(variant) = args.variant {
        config.active_variant = variant;
    }
    config.validate()?;

    let store = SessionStore::new(&args.state_dir, config.log_retention);
    let mut dashboard = Dashboard::new(config, store)?;
    dashboard.connect();
    spawn_command_reader(dashboard.sender());

    info!("dashboard started");
    tokio::select! {
        () = dashboard.run() => {}
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}

/// Read operator commands from stdin and feed them into the event queue.
fn spawn_command_reader(events: UnboundedSender<DashboardEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(&line) {
                Some(event) => {
                    let shutdown = matches!(event, DashboardEvent::Shutdown);
                    if events.send(event).is_err() || shutdown {
                        return;
                    }
                }
                None => {
                    if !line.trim().is_empty() {
                        eprintln!(
                            "commands: start | stop | reset | toggle <n> | variant <id> | \
                             url <url> | apk <name> | clear-source | packages | \
                             driver <start|stop> | report <yes|no> | quit"
                        );
                    }
                }
            }
        }
    });
}

/// Parse one operator command line.
fn parse_command(line: &str) -> Option<DashboardEvent> {
    let mut parts = line.trim().split_whitespace();
    let command = parts.next()?;
    let rest = parts.collect::<Vec<_>>().join(" ");

    let action = match command {
        "start" => OperatorAction::Start,
        "stop" => OperatorAction::Stop,
        "reset" => OperatorAction::Reset,
        "toggle" => OperatorAction::ToggleSelection(rest.parse().ok()?),
        "variant" if !rest.is_empty() => OperatorAction::SwitchVariant(rest),
        "url" if !rest.is_empty() => OperatorAction::SetSourceUrl(rest),
        "apk" if !rest.is_empty() => OperatorAction::SetStagedPackage(rest),
        "clear-source" => OperatorAction::ClearSource,
        "driver" => match rest.as_str() {
            "start" => OperatorAction::StartDriver,
            "stop" => OperatorAction::StopDriver,
            _ => return None,
        },
        "packages" => OperatorAction::ListStagedPackages,
        "report" => match rest.as_str() {
            "yes" | "y" => OperatorAction::ConfirmPartialReport(true),
            "no" | "n" => OperatorAction::ConfirmPartialReport(false),
            _ => return None,
        },
        "quit" | "exit" => return Some(DashboardEvent::Shutdown),
        _ => return None,
    };
    Some(DashboardEvent::Action(action))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert!(matches!(
            parse_command("start"),
            Some(DashboardEvent::Action(OperatorAction::Start))
        ));
        assert!(matches!(
            parse_command("  toggle 2 "),
            Some(DashboardEvent::Action(OperatorAction::ToggleSelection(2)))
        ));
        assert!(matches!(parse_command("quit"), Some(DashboardEvent::Shutdown)));
    }

    #[test]
    fn parses_commands_with_arguments() {
        match parse_command("apk build-7.apk") {
            Some(DashboardEvent::Action(OperatorAction::SetStagedPackage(name))) => {
                assert_eq!(name, "build-7.apk");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
        assert!(matches!(
            parse_command("report yes"),
            Some(DashboardEvent::Action(OperatorAction::ConfirmPartialReport(true)))
        ));
        assert!(matches!(
            parse_command("driver start"),
            Some(DashboardEvent::Action(OperatorAction::StartDriver))
        ));
    }

    #[test]
    fn rejects_junk_and_incomplete_commands() {
        assert!(parse_command("").is_none());
        assert!(parse_command("toggle").is_none());
        assert!(parse_command("toggle x").is_none());
        assert!(parse_command("variant").is_none());
        assert!(parse_command("report maybe").is_none());
        assert!(parse_command("launch").is_none());
    }
}
