use clap::Subcommand;
use codepet_core::sources::keyring_store;
use codepet_core::Config;

use super::CommandResult;

const GITHUB_TOKEN_KEY: &str = "github_token";

#[derive(Subcommand)]
pub enum AuthAction {
    /// GitHub: login / logout / status
    Github {
        #[command(subcommand)]
        action: AuthOp,
    },
}

#[derive(Subcommand)]
pub enum AuthOp {
    /// Store a personal access token in the OS keyring
    Login {
        /// Personal access token
        #[arg(long)]
        token: String,
    },
    /// Remove the stored token
    Logout,
    /// Check authentication status
    Status,
}

pub fn run(action: AuthAction) -> CommandResult {
    match action {
        AuthAction::Github { action: op } => handle_github(op),
    }
}

fn handle_github(op: AuthOp) -> CommandResult {
    match op {
        AuthOp::Login { token } => {
            if token.trim().is_empty() {
                return Err("--token must not be empty".into());
            }
            keyring_store::set(GITHUB_TOKEN_KEY, token.trim())?;
            println!("GitHub token saved");
        }
        AuthOp::Logout => {
            keyring_store::delete(GITHUB_TOKEN_KEY)?;
            println!("GitHub token removed");
        }
        AuthOp::Status => {
            let config = Config::load_or_default();
            println!(
                "{}",
                if config.github_token().is_some() {
                    "authenticated"
                } else {
                    "not authenticated (60 requests/hour)"
                }
            );
        }
    }
    Ok(())
}
