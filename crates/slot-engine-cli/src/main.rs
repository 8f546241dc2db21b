//! `slots` CLI: resolve bookable windows from a JSON store snapshot.
//!
//! ## Usage
//!
//! ```sh
//! # Bookable windows for one event type over a week
//! slots resolve -d store.json --user host-1 --event-type et-30 \
//!     --from 2026-03-16T00:00:00Z --to 2026-03-23T00:00:00Z
//!
//! # Same query as the booking page would see it on a given instant
//! slots resolve -d store.json --user host-1 --event-type et-30 \
//!     --from 2026-03-16T00:00:00Z --to 2026-03-17T00:00:00Z --now 2026-03-15T12:00:00Z
//!
//! # Effective windows of one date (schedule preview)
//! slots day -d store.json --user host-1 --date 2026-03-16
//!
//! # Report dangling references and malformed records
//! slots check -d store.json
//! ```
//!
//! The snapshot is read from stdin when `-d` is omitted. Logs go to stderr
//! and honour `RUST_LOG` (default `warn`).

use std::io::{self, Read};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use slot_engine::rules::WindowSource;
use slot_engine::{
    AvailabilityRequest, InMemoryStore, Resolver, ResolverConfig, SlotError, StoreSnapshot,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "slots", version, about = "Resolve bookable windows for booking pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Resolver configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the bookable windows of an event type
    Resolve {
        /// Store snapshot (reads from stdin if omitted)
        #[arg(short, long)]
        data: Option<String>,
        /// Host user id
        #[arg(long)]
        user: String,
        /// Event type id
        #[arg(long)]
        event_type: String,
        /// Range start, inclusive (RFC 3339)
        #[arg(long)]
        from: DateTime<Utc>,
        /// Range end, exclusive (RFC 3339)
        #[arg(long)]
        to: DateTime<Utc>,
        /// Interpret all rules and sessions in this IANA zone
        #[arg(long)]
        timezone: Option<String>,
        /// Company profile to scope rules and overrides to
        #[arg(long)]
        company: Option<String>,
        /// Evaluate notice and booking window as of this instant (defaults to now)
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Show the effective availability windows of one date
    Day {
        /// Store snapshot (reads from stdin if omitted)
        #[arg(short, long)]
        data: Option<String>,
        /// Host user id
        #[arg(long)]
        user: String,
        /// Event type id; omit to see the user's global schedule
        #[arg(long)]
        event_type: Option<String>,
        /// Calendar date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Interpret all rules in this IANA zone
        #[arg(long)]
        timezone: Option<String>,
    },
    /// Validate a store snapshot
    Check {
        /// Store snapshot (reads from stdin if omitted)
        #[arg(short, long)]
        data: Option<String>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => ResolverConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path))?,
        None => ResolverConfig::default(),
    };

    match cli.command {
        Commands::Resolve {
            data,
            user,
            event_type,
            from,
            to,
            timezone,
            company,
            now,
            output,
        } => {
            let resolver = Resolver::with_config(load_store(data.as_deref())?, config)?;
            let request = AvailabilityRequest {
                user_id: user,
                event_type_id: event_type,
                range_start: from,
                range_end: to,
                timezone,
                company_profile_id: company,
            };
            let now = now.unwrap_or_else(Utc::now);
            debug!(%now, "resolving");

            let availability = resolver.resolve_at(&request, now).map_err(explain)?;
            if availability.is_empty() {
                eprintln!("{}", slot_engine::Availability::EMPTY_MESSAGE);
            }
            let json = serde_json::to_string_pretty(&availability)?;
            write_output(output.as_deref(), &json)?;
        }
        Commands::Day {
            data,
            user,
            event_type,
            date,
            timezone,
        } => {
            let resolver = Resolver::with_config(load_store(data.as_deref())?, config)?;
            let windows = resolver
                .effective_day_windows(&user, event_type.as_deref(), date, timezone.as_deref())
                .map_err(explain)?;
            if windows.is_empty() {
                println!("{date}: unavailable");
            }
            for w in windows {
                let source = match w.source {
                    WindowSource::Rule => "rule",
                    WindowSource::Override => "override",
                };
                println!(
                    "{} {}-{} {} ({})",
                    w.date,
                    w.start.format("%H:%M"),
                    w.end.format("%H:%M"),
                    w.timezone.name(),
                    source
                );
            }
        }
        Commands::Check { data } => {
            let snapshot = read_snapshot(data.as_deref())?;
            let problems = snapshot.lint();
            for problem in &problems {
                println!("{problem}");
            }
            if !problems.is_empty() {
                bail!("{} problem(s) found", problems.len());
            }
            println!(
                "ok: {} hosts, {} event types, {} rules, {} overrides, {} time slots, {} bookings",
                snapshot.hosts.len(),
                snapshot.event_types.len(),
                snapshot.availability_rules.len(),
                snapshot.availability_overrides.len(),
                snapshot.time_slots.len(),
                snapshot.bookings.len()
            );
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Lead with the booking-page message, keep the detailed error as its cause.
fn explain(err: SlotError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

fn read_snapshot(path: Option<&str>) -> Result<StoreSnapshot> {
    let json = read_input(path)?;
    StoreSnapshot::from_json(&json).context("Failed to parse store snapshot")
}

fn load_store(path: Option<&str>) -> Result<InMemoryStore> {
    let snapshot = read_snapshot(path)?;
    InMemoryStore::from_snapshot(snapshot).context("Store snapshot is inconsistent")
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
