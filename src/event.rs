//! The Serenity crate we're using for the Discord API is designed around callbacks to handle
//! events.  However, this does not mesh well with our plugin framework here.  To resolve this,
//! the handler translates the callbacks into a distinct Event enum.

use crate::{context::Context, log_error};
use serenity::all::{GuildId, Member, Message, Ready, User, VoiceState};

/// A Discord event
pub enum Event {
    Ready(Ready),
    Message(Message),
    VoiceStateUpdate {
        old: Option<VoiceState>,
        new: VoiceState,
    },
    MemberJoin(Member),
    MemberLeave {
        guild_id: GuildId,
        user: User,
        /// Only present if the member was cached
        member: Option<Member>,
    },
}

impl Event {
    // When an event occurs, iterate over all the plugins to see if any can/should handle it.
    pub async fn handle(self, ctx: Context<'_>) {
        for plugin in crate::plugin::plugins() {
            match plugin.handle(&ctx, &self).await {
                Ok(EventHandled::Yes) => return,
                Ok(EventHandled::No) => continue,
                Err(err) => log_error!("Error in plugin {}: {:#}", plugin.name(), err),
            }
        }
    }

    // Check if a message should be interpreted as a special bot command.
    //
    // These are prefixed with the configured command prefix, e. g. `;cmd foo bar baz`.  Returns
    // the message along with the words following the command.
    pub async fn is_bot_cmd<'a>(
        &'a self,
        ctx: &Context<'_>,
        cmd: &str,
    ) -> Option<(&'a Message, Vec<&'a str>)> {
        let Event::Message(msg) = self else {
            return None;
        };

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        split_command(&msg.content, &prefix, cmd).map(|args| (msg, args))
    }
}

/// Splits `<prefix><cmd> args...` into its arguments.  `None` if the content is a different
/// command or not a command at all.
pub fn split_command<'a>(content: &'a str, prefix: &str, cmd: &str) -> Option<Vec<&'a str>> {
    let mut words = content.split_whitespace();
    let first = words.next()?;

    if first.strip_prefix(prefix)? != cmd {
        return None;
    }
    Some(words.collect())
}

pub enum EventHandled {
    Yes,
    No,
}
