use clap::Subcommand;

use super::{print_json, CommandResult, Context, Options};

#[derive(Subcommand)]
pub enum LeetcodeAction {
    /// Link a LeetCode account to a GitHub user
    Link {
        /// GitHub username
        username: String,
        /// LeetCode username
        leetcode_username: String,
    },
    /// Reconcile today's submissions and show LeetCode stats
    Stats {
        /// GitHub username
        username: String,
    },
}

pub async fn run(action: LeetcodeAction, opts: Options) -> CommandResult {
    let ctx = Context::load(opts)?;
    match action {
        LeetcodeAction::Link {
            username,
            leetcode_username,
        } => {
            let ack = ctx
                .engine
                .link_secondary_source(&username, &leetcode_username)
                .await?;
            print_json(&ack)
        }
        LeetcodeAction::Stats { username } => {
            let stats = ctx
                .with_retry(|| ctx.engine.get_secondary_stats(&username))
                .await?;
            print_json(&stats)
        }
    }
}
