mod commands;
mod logging;

use clap::{Parser, Subcommand};

use commands::TaskArgs;

#[derive(Parser)]
#[command(
    name = "docbridge",
    version,
    about = "Move tuples in and out of a local document store"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Scroll a resource and print one JSON array per tuple
    Read {
        #[command(flatten)]
        task: TaskArgs,
        /// Query (`*`, `path:value`, or `?q=path:value`)
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Write JSON arrays from stdin, one tuple per line
    Write {
        #[command(flatten)]
        task: TaskArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Read { task, query } => commands::read::execute(&task, query.as_deref()),
        Commands::Write { task } => commands::write::execute(&task),
    }
}
