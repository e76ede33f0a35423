//! tally-bridge: CLI adapter between the upstream presence source and the
//! Tally daemon.
//!
//! The upstream integration (gateway connection, entity cache, command
//! surface) lives outside this workspace; it talks to the bridge with
//! newline-delimited JSON. The bridge frames each message as a daemon
//! request, fills in event ids and timestamps the upstream left out, and
//! never lets a single bad line stop the stream.
//!
//! ## Subcommands
//!
//! - `run`: forward presence messages from stdin to the daemon
//! - `report`: request a leaderboard or member report and print the JSON
//! - `health`: daemon liveness probe

mod daemon_client;
mod logging;

use std::io::BufRead;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use tally_daemon_protocol::Method;

#[derive(Parser)]
#[command(name = "tally-bridge")]
#[command(about = "Presence event adapter for the Tally daemon")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward presence messages from stdin (one JSON object per line)
    Run,

    /// Request a report and print the daemon's JSON response
    Report {
        /// Guild to report on
        #[arg(long)]
        guild: u64,

        /// Member for a per-member breakdown; omit for the leaderboard
        #[arg(long)]
        member: Option<u64>,
    },

    /// Check that the daemon is reachable
    Health,
}

/// One stdin line: a daemon method plus its params.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InboundLine {
    method: Method,
    #[serde(default)]
    params: Option<Value>,
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_forwarder(),
        Commands::Report { guild, member } => {
            if let Err(e) = run_report(guild, member) {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
        Commands::Health => {
            if let Err(e) = run_health() {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_forwarder() {
    let stdin = std::io::stdin();
    let mut forwarded: u64 = 0;
    let mut failed: u64 = 0;

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "Failed to read stdin; stopping forwarder");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match forward_line(&line) {
            Ok(()) => forwarded += 1,
            Err(err) => {
                failed += 1;
                warn!(error = %err, "Failed to forward message");
            }
        }
    }

    info!(forwarded, failed, "Forwarder finished");
}

fn forward_line(line: &str) -> Result<(), String> {
    let inbound: InboundLine =
        serde_json::from_str(line).map_err(|err| format!("Invalid message line: {}", err))?;

    let params = match inbound.method {
        Method::Event => Some(fill_event_defaults(inbound.params)),
        Method::SyncPresence | Method::SyncDirectory => inbound.params,
        other => {
            return Err(format!(
                "Method {:?} is not accepted on the event stream",
                other
            ));
        }
    };

    let response = daemon_client::send_request(inbound.method, params)?;
    if !response.ok {
        let detail = response
            .error
            .map(|err| format!("{}: {}", err.code, err.message))
            .unwrap_or_else(|| "unknown daemon error".to_string());
        return Err(format!("Daemon rejected message: {}", detail));
    }
    Ok(())
}

/// Upstream integrations often omit bookkeeping fields; stamp them here so
/// the daemon's validation passes and events stay traceable in logs.
fn fill_event_defaults(params: Option<Value>) -> Value {
    let mut object = match params {
        Some(Value::Object(map)) => map,
        Some(other) => return other,
        None => serde_json::Map::new(),
    };

    object
        .entry("event_id")
        .or_insert_with(|| Value::String(daemon_client::make_event_id()));
    object
        .entry("recorded_at")
        .or_insert_with(|| Value::String(chrono::Utc::now().to_rfc3339()));

    Value::Object(object)
}

fn run_report(guild: u64, member: Option<u64>) -> Result<(), String> {
    let (method, params) = match member {
        Some(member) => (
            Method::GetMemberReport,
            serde_json::json!({"guild_id": guild, "member_id": member}),
        ),
        None => (Method::GetLeaderboard, serde_json::json!({"guild_id": guild})),
    };

    let response = daemon_client::send_request(method, Some(params))?;
    if !response.ok {
        let detail = response
            .error
            .map(|err| format!("{}: {}", err.code, err.message))
            .unwrap_or_else(|| "unknown daemon error".to_string());
        return Err(format!("Report request failed: {}", detail));
    }

    let data = response.data.unwrap_or(Value::Null);
    let rendered = serde_json::to_string_pretty(&data)
        .map_err(|err| format!("Failed to render report: {}", err))?;
    println!("{}", rendered);
    Ok(())
}

fn run_health() -> Result<(), String> {
    let response = daemon_client::send_request(Method::GetHealth, None)?;
    if !response.ok {
        return Err("Daemon reported unhealthy".to_string());
    }
    let data = response.data.unwrap_or(Value::Null);
    println!(
        "{}",
        serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inbound_line_parses_event() {
        let line: InboundLine = serde_json::from_str(
            r#"{"method":"event","params":{"guild_id":42,"member_id":7,"event_id":"e","recorded_at":"2026-02-01T12:00:00Z"}}"#,
        )
        .expect("parse line");
        assert_eq!(line.method, Method::Event);
        assert!(line.params.is_some());
    }

    #[test]
    fn inbound_line_rejects_unknown_fields() {
        assert!(serde_json::from_str::<InboundLine>(r#"{"method":"event","extra":1}"#).is_err());
    }

    #[test]
    fn fill_event_defaults_stamps_missing_fields() {
        let filled = fill_event_defaults(Some(json!({"guild_id": 42, "member_id": 7})));
        assert!(filled["event_id"].as_str().is_some());
        assert!(filled["recorded_at"].as_str().is_some());
    }

    #[test]
    fn fill_event_defaults_keeps_upstream_values() {
        let filled = fill_event_defaults(Some(json!({
            "event_id": "evt-upstream",
            "recorded_at": "2026-02-01T12:00:00Z",
        })));
        assert_eq!(filled["event_id"].as_str(), Some("evt-upstream"));
        assert_eq!(
            filled["recorded_at"].as_str(),
            Some("2026-02-01T12:00:00Z")
        );
    }
}
