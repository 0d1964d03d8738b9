use crate::event::{Event, EventHandled};
use anyhow::Result;

pub use crate::context::Context;

mod debug;
mod help;
mod ignore_bots;
mod member_log;
pub mod music;

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  Also the command the plugin answers to, if any
    fn name(&self) -> &'static str;
    /// Help message line.  None if no help message
    async fn usage(&self, ctx: &Context) -> Option<String>;
    /// Detailed help shown by `help <name>`.  None if the usage line says it all
    async fn help(&self, _ctx: &Context) -> Option<String> {
        None
    }
    /// Potentially handle event.  Returns:
    /// - Ok(EventHandled::Yes) if the event has been handled and no other plugin should attempt to
    /// handle it
    /// - Ok(EventHandled::No) if another plugin should attempt to handle the event
    /// - Err if an error occurred
    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled>;
}

/// Ordered list of available plugins
pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        // Core bot operations
        Box::new(debug::Debug),
        Box::new(ignore_bots::IgnoreBots),
        Box::new(help::Help),
        // Server membership
        Box::new(member_log::MemberLog),
        // Voice chat
        Box::new(music::Music),
    ]
}
