use super::{print_json, CommandResult, Context, Options};

pub async fn run(username: &str, opts: Options) -> CommandResult {
    let ctx = Context::load(opts)?;
    let result = ctx
        .with_retry(|| ctx.engine.get_or_create_profile(username))
        .await?;
    print_json(&result)
}
