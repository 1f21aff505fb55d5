// Companion CLI
// Interactive terminal host for the conversation engine.

use anyhow::{Context, Result};
use companion_core::session::{set_therapist_tone, therapist_tone, CompanionSession, Response};
use companion_core::EngineConfig;
use std::env;
use std::io::{self, BufRead, Write};
use tracing::info;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const HELP: &str = "Commands: /reset, /history, /tone on|off, /debug, /quit";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("COMPANION_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new("companion-cli".into(), io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn print_response(out: &mut impl Write, response: &Response) -> io::Result<()> {
    match response {
        Response::Message { text } => writeln!(out, "\n{}\n", text),
        Response::Choice { text, options } => {
            writeln!(out, "\n{}", text)?;
            for (i, option) in options.iter().enumerate() {
                writeln!(out, "  [{}] {}", i + 1, option)?;
            }
            writeln!(out)
        }
    }
}

/// Handles a slash command. Returns `false` when the user asked to quit.
fn run_command(session: &mut CompanionSession, line: &str, out: &mut impl Write) -> Result<bool> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("/quit"), _) | (Some("/exit"), _) => return Ok(false),
        (Some("/reset"), _) => {
            session.reset_conversation();
            writeln!(out, "(conversation reset)")?;
        }
        (Some("/history"), _) => {
            for exchange in session.history() {
                writeln!(
                    out,
                    "[{}] you: {}\n        companion: {}",
                    exchange.at.format("%H:%M:%S"),
                    exchange.user,
                    exchange.ai
                )?;
            }
        }
        (Some("/tone"), Some(value)) => {
            set_therapist_tone(matches!(value, "on" | "true" | "1"));
            writeln!(out, "(therapist tone: {})", therapist_tone())?;
        }
        (Some("/debug"), _) => {
            let snapshot = serde_json::to_string_pretty(&session.debug_state())?;
            writeln!(out, "{}", snapshot)?;
        }
        _ => writeln!(out, "{}", HELP)?,
    }
    Ok(true)
}

fn main() -> Result<()> {
    init_tracing();

    let config = EngineConfig::from_env().context("Invalid companion configuration")?;
    set_therapist_tone(config.therapist_tone);
    let mut session =
        CompanionSession::from_config(config).context("Failed to load conversation data")?;

    info!("Companion CLI started");
    let stdin = io::stdin();
    let mut out = io::stdout();
    writeln!(out, "Hi, I'm here to listen. {}", HELP)?;

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read input")?;
        let trimmed = line.trim();

        if trimmed.starts_with('/') {
            if !run_command(&mut session, trimmed, &mut out)? {
                break;
            }
            continue;
        }

        let response = session.get_response(&line);
        print_response(&mut out, &response)?;
        out.flush()?;
    }

    info!("Companion CLI stopped");
    Ok(())
}
