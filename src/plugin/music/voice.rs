//! songbird and serenity implementations of the playback driver's collaborators

use super::driver::{Announcer, Playback};
use super::embeds::{song_embed, SongHeading};
use super::error::{MusicError, MusicResult};
use super::queue::QueueStore;
use super::song::ResolvedSong;
use crate::log_warn;
use chrono::Utc;
use serenity::all::{ChannelId, CreateMessage, GuildId, Http};
use songbird::input::HttpRequest;
use songbird::tracks::PlayMode;
use songbird::Songbird;
use std::sync::Arc;

/// Streams songs into the guild's songbird call
pub struct SongbirdPlayback {
    pub manager: Arc<Songbird>,
    pub guild_id: GuildId,
    pub store: Arc<QueueStore>,
    pub http_client: reqwest::Client,
}

#[serenity::async_trait]
impl Playback for SongbirdPlayback {
    async fn is_connected(&self) -> bool {
        self.manager.get(self.guild_id).is_some()
    }

    async fn start(&self, song: &ResolvedSong, volume: f32) -> MusicResult<()> {
        let call = self
            .manager
            .get(self.guild_id)
            .ok_or(MusicError::NotConnected)?;

        let input = HttpRequest::new(self.http_client.clone(), song.stream_url.clone());
        let track = call.lock().await.play_input(input.into());

        track
            .set_volume(volume)
            .map_err(|e| MusicError::Playback(format!("could not set volume: {}", e)))?;

        self.store.set_track(self.guild_id, track).await;
        Ok(())
    }

    async fn is_finished(&self) -> MusicResult<bool> {
        let Some(track) = self.store.track(self.guild_id).await else {
            return Ok(true);
        };

        // Tracks that already left the mixer can no longer be queried
        let Ok(info) = track.get_info().await else {
            return Ok(true);
        };

        match info.playing {
            PlayMode::Play | PlayMode::Pause => Ok(false),
            PlayMode::Errored(e) => Err(MusicError::Playback(format!("{:?}", e))),
            _ => Ok(true),
        }
    }

    async fn disconnect(&self) {
        if let Some(track) = self.store.take_track(self.guild_id).await {
            let _ = track.stop();
        }
        if let Err(e) = self.manager.remove(self.guild_id).await {
            log_warn!("Could not leave voice in guild {}: {}", self.guild_id, e);
        }
    }
}

/// Posts playback progress to a text channel
pub struct ChannelAnnouncer {
    pub http: Arc<Http>,
    pub channel_id: ChannelId,
}

#[serenity::async_trait]
impl Announcer for ChannelAnnouncer {
    async fn now_playing(&self, song: &ResolvedSong) {
        let embed = song_embed(&song.clone().into(), SongHeading::NowPlaying, Utc::now());
        if let Err(e) = self
            .channel_id
            .send_message(&self.http, CreateMessage::new().embed(embed))
            .await
        {
            log_warn!("Could not announce song in channel {}: {}", self.channel_id, e);
        }
    }

    async fn say(&self, text: &str) {
        if let Err(e) = self.channel_id.say(&self.http, text).await {
            log_warn!("Could not post to channel {}: {}", self.channel_id, e);
        }
    }
}
