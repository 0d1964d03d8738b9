use crate::{event::*, log_debug, logging, logging::LogName, plugin::*};
use anyhow::Result;

/// Logs a summary of each incoming event at debug level
pub struct Debug;

#[serenity::async_trait]
impl Plugin for Debug {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        // Names below are looked up over HTTP
        if !logging::enabled(logging::Level::Debug) {
            return Ok(EventHandled::No);
        }

        match event {
            Event::Ready(ready) => {
                log_debug!(
                    "Connected to {} server(s) as {}",
                    ready.guilds.len(),
                    ready.user.name,
                );
            }
            Event::Message(msg) => {
                log_debug!(
                    "{} > {} > {}: {}",
                    msg.guild_id.log_name(ctx.http).await,
                    msg.channel_id.log_name(ctx.http).await,
                    msg.author.name,
                    msg.content,
                );
            }
            Event::VoiceStateUpdate { old, new } => match (old, new.channel_id) {
                (Some(old), Some(new_id)) if old.channel_id == Some(new_id) => {
                    // State change within same channel, e.g. mute/unmute
                    // Not currently debug logging this
                }
                (Some(old), Some(_)) => log_debug!(
                    "{} moved VC channel from \"{}\" to \"{}\"",
                    new.user_id.log_name(ctx.http).await,
                    old.channel_id.log_name(ctx.http).await,
                    new.channel_id.log_name(ctx.http).await,
                ),
                (Some(old), None) => log_debug!(
                    "{} left VC channel \"{}\"",
                    new.user_id.log_name(ctx.http).await,
                    old.channel_id.log_name(ctx.http).await,
                ),
                (None, Some(_)) => log_debug!(
                    "{} joined VC channel \"{}\"",
                    new.user_id.log_name(ctx.http).await,
                    new.channel_id.log_name(ctx.http).await,
                ),
                (None, None) => log_debug!("Unknown voice state update"),
            },
            Event::MemberJoin(member) => {
                log_debug!(
                    "{} joined server \"{}\"",
                    member.user.name,
                    Some(member.guild_id).log_name(ctx.http).await,
                );
            }
            Event::MemberLeave { guild_id, user, .. } => {
                log_debug!(
                    "{} left server \"{}\"",
                    user.name,
                    Some(*guild_id).log_name(ctx.http).await,
                );
            }
        }

        Ok(EventHandled::No)
    }
}
