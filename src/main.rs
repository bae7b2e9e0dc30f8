//! TerraGuard Console - Headless Entry Point
//!
//! Keeps one sync session open against the simulation server, reads
//! operator commands from stdin and prints alert notices as they arrive.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use terraguard_console::api::{HttpSimulationApi, SimulationMode, StartParams};
use terraguard_console::config::ConsoleConfig;
use terraguard_console::constants::{APP_NAME, APP_VERSION};
use terraguard_console::logic::alerts::{AlertNotice, ChannelSink, ToastSlot};
use terraguard_console::logic::format;
use terraguard_console::logic::sync::{ControlGate, GateOutcome, Session, SyncSnapshot};

const ALERT_CHANNEL_CAPACITY: usize = 32;

const HELP: &str = "\
Commands:
  start [classification|regression] [csv_path]
  stop | reset
  speed <seconds>
  mode <classification|regression>
  status | nodes | help | quit";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Start(StartParams),
    Stop,
    Reset,
    Speed(f64),
    Mode(SimulationMode),
    Status,
    Nodes,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };

    let command = match head.to_ascii_lowercase().as_str() {
        "start" => {
            let mut params = StartParams::default();
            for word in words {
                match SimulationMode::parse(word) {
                    Some(mode) if params.mode.is_none() => params.mode = Some(mode),
                    _ => params.csv_path = Some(word.to_string()),
                }
            }
            Command::Start(params)
        }
        "stop" => Command::Stop,
        "reset" => Command::Reset,
        "speed" => {
            let raw = words.next().ok_or("usage: speed <seconds>")?;
            let speed: f64 = raw.parse().map_err(|_| format!("not a number: {}", raw))?;
            if !speed.is_finite() || speed <= 0.0 {
                return Err("speed must be a positive number of seconds".to_string());
            }
            Command::Speed(speed)
        }
        "mode" => {
            let raw = words.next().ok_or("usage: mode <classification|regression>")?;
            Command::Mode(SimulationMode::parse(raw).ok_or_else(|| format!("unknown mode: {}", raw))?)
        }
        "status" => Command::Status,
        "nodes" => Command::Nodes,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {} (try 'help')", other)),
    };
    Ok(Some(command))
}

/// Control actions run in their own task so the prompt stays responsive
/// and a second request while one is in flight hits the gate.
fn spawn_action(gate: ControlGate<HttpSimulationApi>, command: Command) {
    tokio::spawn(async move {
        let (name, outcome) = match command {
            Command::Start(params) => ("start", gate.start(params).await),
            Command::Stop => ("stop", gate.stop().await),
            Command::Reset => ("reset", gate.reset().await),
            Command::Speed(speed) => ("speed", gate.set_speed(speed).await),
            Command::Mode(mode) => ("mode", gate.set_mode(mode).await),
            _ => return,
        };
        match outcome {
            GateOutcome::Completed => println!("{}: ok", name),
            GateOutcome::Failed(e) if e.is_transient() => {
                println!("{}: server unreachable, try again: {}", name, e)
            }
            GateOutcome::Failed(e) => println!("{}: rejected: {}", name, e),
            GateOutcome::Busy => println!("{}: ignored, another action is in flight", name),
        }
    });
}

fn print_status(snapshot: &SyncSnapshot, toast: &ToastSlot) {
    let now = Utc::now();
    println!(
        "[{}] mode={} risk={} active alerts={}",
        snapshot.liveness(now).label(),
        snapshot.effective_mode(),
        snapshot.risk.band,
        snapshot.active_alerts_count
    );

    if let Some(status) = &snapshot.status {
        println!(
            "  running={} step={}/{} speed={}s",
            status.running,
            status.current_index,
            status.dataset_length,
            format::format_number(status.speed, 2)
        );
    } else if snapshot.loading {
        println!("  loading...");
    }
    if let Some(record) = snapshot.latest_record() {
        println!(
            "  latest record #{} at {}",
            record.id,
            format::format_timestamp(&record.timestamp)
        );
    }
    match snapshot.action_label {
        Some(action) => println!("  {}", action.progress_label()),
        None if snapshot.action_in_progress => println!("  Applying..."),
        None => {}
    }
    if let Some(error) = &snapshot.error {
        println!("  error: {}", error);
    }
    if let Some(at) = snapshot.last_synced_at() {
        println!("  last sync: {}", at.with_timezone(&Local).format("%H:%M:%S"));
    }
    if let Some(notice) = toast.visible(now) {
        println!("  latest alert: #{} {}", notice.record_id, notice.message);
    }
}

fn print_nodes(session: &Session<HttpSimulationApi>) {
    for reading in session.nodes() {
        let confidence = reading
            .confidence
            .map(|c| format::format_percent(c, 0))
            .unwrap_or_else(|| format::PLACEHOLDER.to_string());
        let trend: String = reading.trend.iter().rev().take(12).rev().map(|h| h.to_string()).collect();
        println!(
            "{} {:<20} hazard={} disp={} conf={} trend={} alerts={}",
            reading.node.id,
            reading.node.name,
            reading.hazard,
            format::format_number(reading.displacement, 2),
            confidence,
            trend,
            reading.alerts.len()
        );
    }
}

fn print_notice(notice: &AlertNotice) {
    println!(
        "!! ALERT #{} [{}] {} ({})",
        notice.record_id,
        notice.band,
        notice.message,
        format::format_timestamp(&notice.record_timestamp)
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "terraguard_console=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ConsoleConfig::from_env().context("invalid configuration")?;

    tracing::info!("{} Console v{} starting...", APP_NAME, APP_VERSION);
    tracing::info!("   Server: {}", config.api_base_url);
    tracing::info!(
        "   Status every {}ms, history every {}ms (limit {})",
        config.status_poll_ms,
        config.history_poll_ms,
        config.history_limit
    );

    let api = HttpSimulationApi::new(&config).context("failed to build HTTP client")?;
    let (sink, mut alerts) = ChannelSink::new(ALERT_CHANNEL_CAPACITY);
    let toast = ToastSlot::new(config.toast_duration());
    let session = Session::new(api, &config, Arc::new(sink));

    let mut handle = session.open().await;
    print_status(&session.snapshot(), &toast);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(Command::Status)) => print_status(&session.snapshot(), &toast),
                    Ok(Some(Command::Nodes)) => print_nodes(&session),
                    Ok(Some(Command::Help)) => println!("{}", HELP),
                    Ok(Some(command)) => spawn_action(session.gate().clone(), command),
                    Err(message) => println!("{}", message),
                }
            }
            notice = alerts.recv() => match notice {
                Ok(notice) => {
                    print_notice(&notice);
                    toast.raise(notice, Utc::now());
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Alert display fell behind, {} notices skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    handle.stop();
    tracing::info!("{} Console stopped", APP_NAME);
    Ok(())
}
