use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "codepet", version, about = "Grow a pet by keeping your coding streak")]
struct Cli {
    /// Disable client-side retries
    #[arg(long, global = true)]
    no_retry: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile today's commits and show the pet
    Pet {
        /// GitHub username
        username: String,
    },
    /// LeetCode account linking and stats
    Leetcode {
        #[command(subcommand)]
        action: commands::leetcode::LeetcodeAction,
    },
    /// List a user's repositories (cached for an hour)
    Repos {
        /// GitHub username
        username: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Credential management
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CODEPET_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let opts = commands::Options {
        retry: !cli.no_retry,
    };

    let result = match cli.command {
        Commands::Pet { username } => commands::pet::run(&username, opts).await,
        Commands::Leetcode { action } => commands::leetcode::run(action, opts).await,
        Commands::Repos { username } => commands::repos::run(&username, opts).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Auth { action } => commands::auth::run(action),
    };

    if let Err(e) = result {
        commands::report(e.as_ref());
        std::process::exit(1);
    }
}
