use clap::{Parser, Subcommand};
use simplelog::{Config, LevelFilter, WriteLogger};
use std::fs::{self, File};
use std::path::PathBuf;

use garnet::movegen;
use garnet::position::{Position, START_FEN};

#[derive(Parser)]
#[command(name = "garnet", version, about = "UCI chess engine built on magic bitboards")]
struct Args {
    /// Append protocol traffic and internal events to this file
    #[arg(long, default_value = "garnet.log")]
    log_file: PathBuf,

    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Count the move-tree leaves of a position to the given depth
    Perft {
        #[arg(short, long)]
        depth: u32,
        /// Position in Forsyth-Edwards Notation; defaults to the start
        #[arg(default_value = START_FEN)]
        fen: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // keep one previous log around; the new run starts a fresh file
    if args.log_level != LevelFilter::Off {
        if args.log_file.exists() {
            let aside = PathBuf::from(format!("{}.old", args.log_file.display()));
            let _ = fs::rename(&args.log_file, &aside);
        }
        WriteLogger::init(args.log_level, Config::default(), File::create(&args.log_file)?)?;
    }

    garnet::init();

    match args.command {
        None => {
            log::info!("garnet {} starting", env!("CARGO_PKG_VERSION"));
            garnet::uci::uci_loop();
            log::info!("bye");
        }
        Some(Command::Perft { depth, fen }) => {
            let mut pos = Position::from_fen(&fen)?;
            let start = std::time::Instant::now();
            let count = movegen::perft_divide(&mut pos, depth);
            let ms = start.elapsed().as_millis();
            println!("Depth {}: {} nodes in {} ms", depth, count, ms);
        }
    }

    Ok(())
}
