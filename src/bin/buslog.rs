use clap::{Parser, Subcommand};

use buslog::cli::{self, CommandCode};

#[derive(Parser)]
#[command(name = "buslog", version, about = "Record and replay pub/sub transport logs")]
struct Cli {
    /// Verbosity level, 0 (silent) through 4 (debug)
    #[arg(short, long, default_value_t = 1)]
    verbosity: i32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record matching topics into a log file until interrupted
    Record {
        file: String,
        /// Pattern matched against full topic names
        #[arg(default_value = ".*")]
        pattern: String,
    },
    /// Replay a log file onto the bus, preserving original timing
    Play {
        file: String,
        /// Pattern matched against full topic names
        #[arg(default_value = ".*")]
        pattern: String,
    },
}

fn main() {
    let args = Cli::parse();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let code = cli::verbosity(args.verbosity);
    if code != CommandCode::Success {
        std::process::exit(code.into());
    }

    let code = match args.command {
        Commands::Record { file, pattern } => cli::record_topics(&file, &pattern),
        Commands::Play { file, pattern } => cli::playback_topics(&file, &pattern),
    };
    std::process::exit(code.into());
}
