use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "nomercy", version, about = "No Mercy habit tracker CLI")]
struct Cli {
    /// User id (default: $NOMERCY_USER, then $USER)
    #[arg(long, global = true)]
    user: Option<String>,
    /// Display name used when the user is first created
    #[arg(long, global = true)]
    name: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Task management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Death-mode settings
    Strict {
        #[command(subcommand)]
        action: commands::strict::StrictAction,
    },
    /// Print the current progression snapshot as JSON
    Status,
    /// Daily/weekly/streak counters and per-day history
    Report {
        /// Days of history to include
        #[arg(long, default_value = "7")]
        days: u32,
    },
    /// Achievement badges
    Achievements,
    /// Top users by experience
    Leaderboard {
        /// Number of entries (default from config)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Run one death-mode check
    Tick,
    /// Run death-mode checks until interrupted
    Watch {
        /// Seconds between checks (default from config)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("NOMERCY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let session = commands::Session::resolve(cli.user, cli.name);

    let result = match cli.command {
        Commands::Task { action } => commands::task::run(&session, action),
        Commands::Strict { action } => commands::strict::run(&session, action),
        Commands::Status => commands::status::status(&session),
        Commands::Report { days } => commands::status::report(&session, days),
        Commands::Achievements => commands::status::achievements(&session),
        Commands::Leaderboard { limit } => commands::status::leaderboard(&session, limit),
        Commands::Tick => commands::enforce::tick(&session),
        Commands::Watch { interval } => commands::enforce::watch(&session, interval),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
