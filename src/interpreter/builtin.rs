//! Commands every session answers.

use async_trait::async_trait;

use crate::version::{SOURCE_URL, version_string};

use super::registry::{BotCommand, CommandContext, CommandRegistry};

pub(super) fn register_builtins(registry: &CommandRegistry) {
    registry.register_fn("VERSION", |_: &CommandContext<'_>, _: &str| {
        Ok(version_string())
    });
    registry.register_fn("SOURCE", |_: &CommandContext<'_>, _: &str| {
        Ok(SOURCE_URL.to_owned())
    });
    registry.register_fn("LAG", |ctx: &CommandContext<'_>, _: &str| {
        Ok(match ctx.lag() {
            Some(lag) => format!("lag: {lag:?}"),
            None => "lag: not measured yet".to_owned(),
        })
    });
    registry.register_fn("STATUS", |ctx: &CommandContext<'_>, _: &str| Ok(ctx.status()));
    registry.register("LAGCHECK", LagCheck);
}

/// Sends a probe; the result shows up in `LAG` and on the bus.
struct LagCheck;

#[async_trait]
impl BotCommand for LagCheck {
    async fn run(&self, ctx: &CommandContext<'_>, _args: &str) -> anyhow::Result<String> {
        ctx.lag_probe().await?;
        Ok(String::new())
    }
}
