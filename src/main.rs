mod config;
mod context;
mod event;
mod handler;
mod helper;
mod logging;
mod plugin;
mod volatile_state;

use serenity::{all::GatewayIntents, Client};
use songbird::SerenityInit;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = crate::config::Config::load().await?;
    crate::logging::init(cfg.logging.clone());
    log_info!("Starting jukebot");

    let token = cfg.general.discord_token.clone();
    let vstate = crate::volatile_state::VolatileState::new(&cfg);
    let handler = handler::Handler::new(cfg, vstate);

    // Things we want discord to tell us about.
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::MESSAGE_CONTENT;

    let result = Client::builder(&token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?
        .start()
        .await;

    if let Err(e) = &result {
        log_fatal!("Discord client stopped: {}", e);
    }
    result.map_err(Into::into)
}
