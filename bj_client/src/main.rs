//! Terminal blackjack client.
//!
//! Hosts a hot-seat table in a fresh room, or attaches to an existing
//! room as a seated player or a read-only observer.

use anyhow::{Context, Result};
use blackjack::PlayerId;
use pico_args::Arguments;
use std::fs::File;

use bj_client::tui_app::{Mode, TuiApp};

const HELP: &str = "\
Play blackjack at a synchronized table

USAGE:
  bj_client [OPTIONS]

OPTIONS:
  --name NAME           Seat name for the first player [default: login name]
  --seats N             Hot-seat players at a hosted table, 1-4 [default: 1]
  --room ID             Attach to an existing room instead of hosting one
                        (needs a shared store backend; the stock build
                        uses a per-process in-memory store)
  --watch               Observe the room read-only (requires --room)

FLAGS:
  -h, --help            Print help information
";

const MAX_SEATS: usize = 4;
const LOG_FILE: &str = "bj_client.log";

struct Args {
    name: String,
    seats: usize,
    room: Option<String>,
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        name: pargs
            .opt_value_from_str("--name")?
            .unwrap_or_else(whoami::username),
        seats: pargs.opt_value_from_str("--seats")?.unwrap_or(1),
        room: pargs.opt_value_from_str("--room")?,
        watch: pargs.contains("--watch"),
    };

    if !(1..=MAX_SEATS).contains(&args.seats) {
        anyhow::bail!("--seats must be between 1 and {MAX_SEATS}");
    }
    if args.watch && args.room.is_none() {
        anyhow::bail!("--watch needs a --room to observe");
    }

    // The TUI owns the terminal, so logs go to a file.
    let log_file = File::create(LOG_FILE).context("failed to open log file")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let mode = match args.room {
        Some(room_id) if args.watch => Mode::Observe { room_id },
        Some(room_id) => Mode::Join {
            room_id,
            player: PlayerId::new(&args.name),
        },
        None => Mode::Host {
            seats: seat_names(&args.name, args.seats),
        },
    };

    let terminal = ratatui::init();
    let result = TuiApp::new(mode).run(terminal).await;
    ratatui::restore();
    result
}

/// First seat keeps the given name, extra hot-seat players get a
/// numbered suffix.
fn seat_names(name: &str, seats: usize) -> Vec<PlayerId> {
    (1..=seats)
        .map(|n| {
            if n == 1 {
                PlayerId::new(name)
            } else {
                PlayerId::new(&format!("{name}-{n}"))
            }
        })
        .collect()
}
