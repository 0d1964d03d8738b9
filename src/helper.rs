//! Miscellaneous convenience methods

use crate::{context::Context, log_debug};
use serenity::all::ReactionType;

const CHECKMARK: &str = "\u{2611}"; // ballot box with check
const CROSS: &str = "\u{274C}"; // cross mark

#[serenity::async_trait]
pub trait MessageHelper {
    /// Acknowledge the message with a reaction.  Returns false if the reaction could not be added.
    async fn checkmark(&self, ctx: &Context) -> bool;
    /// Reject the message with a reaction, falling back to replying with `reason` as text.
    async fn refuse(&self, ctx: &Context, reason: &str);
    /// Post `text` to the message's channel, ignoring failures.
    async fn say_best_effort(&self, ctx: &Context, text: &str);
}

#[serenity::async_trait]
impl MessageHelper for serenity::all::Message {
    async fn checkmark(&self, ctx: &Context) -> bool {
        let reaction = ReactionType::Unicode(CHECKMARK.to_owned());
        match self.react(ctx.cache_http, reaction).await {
            Ok(_) => true,
            Err(e) => {
                log_debug!("Couldn't add reaction (insufficient permissions?): {}", e);
                false
            }
        }
    }

    async fn refuse(&self, ctx: &Context, reason: &str) {
        let reaction = ReactionType::Unicode(CROSS.to_owned());
        if self.react(ctx.cache_http, reaction).await.is_err() {
            self.say_best_effort(ctx, reason).await;
        }
    }

    async fn say_best_effort(&self, ctx: &Context, text: &str) {
        if let Err(e) = self.channel_id.say(ctx.cache_http, text).await {
            log_debug!("Couldn't send message to channel {}: {}", self.channel_id, e);
        }
    }
}
