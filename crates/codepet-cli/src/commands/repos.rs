use super::{print_json, CommandResult, Context, Options};

pub async fn run(username: &str, opts: Options) -> CommandResult {
    let ctx = Context::load(opts)?;
    let listing = ctx
        .with_retry(|| ctx.engine.list_recent_items(username))
        .await?;
    print_json(&listing)
}
