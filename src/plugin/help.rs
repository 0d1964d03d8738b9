use crate::{event::*, plugin::*};
use anyhow::Result;

pub struct Help;

#[serenity::async_trait]
impl Plugin for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} [command] - show this help message, or details about one command",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let reply = match args.first() {
            Some(command) => detailed_help(ctx, command).await,
            None => overview(ctx).await,
        };

        msg.reply(ctx.cache_http, &reply).await?;
        Ok(EventHandled::Yes)
    }
}

async fn overview(ctx: &Context<'_>) -> String {
    let mut reply = String::new();
    reply.push_str("```\n");
    reply.push_str("Commands:\n");
    for plugin in crate::plugin::plugins() {
        if let Some(usage) = plugin.usage(ctx).await {
            reply.push_str(&usage);
            reply.push('\n');
        }
    }
    reply.push_str("```\n");
    reply
}

async fn detailed_help(ctx: &Context<'_>, command: &str) -> String {
    let prefix = ctx.cfg.read().await.general.command_prefix.clone();
    let command = command.strip_prefix(prefix.as_str()).unwrap_or(command);

    let Some(plugin) = crate::plugin::plugins()
        .into_iter()
        .find(|plugin| plugin.name() == command)
    else {
        return format!("No such command: `{}`", command);
    };

    let details = match plugin.help(ctx).await {
        Some(details) => Some(details),
        None => plugin.usage(ctx).await,
    };

    match details {
        Some(details) => format!("```\n{}\n```", details),
        None => format!("No help available for `{}`", command),
    }
}
