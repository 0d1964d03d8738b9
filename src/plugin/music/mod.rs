//! `music` command: per-guild song queues streamed into voice channels

pub mod command;
pub mod driver;
pub mod embeds;
pub mod error;
pub mod media;
pub mod playlist;
pub mod queue;
pub mod resolver;
pub mod song;
pub mod voice;

use self::command::{MusicCommand, Randomize, RemoveTarget};
use self::driver::Driver;
use self::embeds::{queue_embed, song_embed, SongHeading};
use self::error::MusicError;
use self::media::MediaResolver;
use self::queue::QueueStore;
use self::resolver::{ActiveConnection, CacheDirectory, JoinPlan, VoiceTarget};
use self::song::Song;
use self::voice::{ChannelAnnouncer, SongbirdPlayback};
use crate::logging::Level;
use crate::{config, event::*, helper::MessageHelper, log_at, log_warn, plugin::*};
use anyhow::{anyhow, Result};
use chrono::Utc;
use serenity::all::{CreateMessage, GuildId, Mentionable, Message};
use songbird::tracks::PlayMode;
use songbird::Songbird;
use std::sync::Arc;
use std::time::Duration;

const GATED: &str =
    "Sorry, but this command has been temporarily removed as it is currently being rewritten.";
const NO_VOICE: &str =
    "Sorry, but the voice library required for music is not available. Music will not work, sorry.";
const NOT_IN_GUILD: &str = "cannot use music commands outside of a server";
const REFUSED: &str = "command refused: you are not in the target voice channel";
const NOTHING_TO_PAUSE: &str = "cannot pause music: no song is currently playing";
const JOIN_FAILED: &str = "cannot join channel: could not connect to the voice channel";

fn help_text(prefix: &str, guard: &str) -> String {
    format!(
        "Usage:\n\
         |  {prefix}music <subcommand> [args...]{guard}\n\
         Arguments:\n\
         |  subcommand - what to do, one of the subcommands below\n\
         |  args - arguments for the subcommand\n\
         Description:\n\
         |  Queue songs and play them in the voice channel you are in.  Songs are looked up\n\
         |  with yt-dlp, so any page or search term it understands can be added.\n\
         Subcommands:\n\
         |  join [channel-id] - join the voice channel you are in, or the given one\n\
         |  add <reference> - look up a song and add it to the end of the queue\n\
         |  play - start playing the queue\n\
         |  skip - skip the current song\n\
         |  pause - pause or resume the current song\n\
         |  volume <float> - set the volume, from 0.0 to 2.0\n\
         |  queue - show the next songs in the queue\n\
         |  info [index] - show a queued song, or the current song without an index\n\
         |  playing - show the current song\n\
         |  stop|exit|quit [--no-clear-queue|-n] - leave the voice channel\n\
         |  load <playlist> [--force-randomize|--no-force-randomize] - queue a saved playlist\n\
         |  remove <index|-c|--clear|--clear-all> - remove a song, or clear the queue"
    )
}

#[derive(Debug, PartialEq)]
enum PauseStep {
    Pause,
    Resume,
    NothingPlaying,
}

/// `None` when the track handle no longer answers, e.g. between songs
fn pause_step(mode: Option<&PlayMode>) -> PauseStep {
    match mode {
        Some(PlayMode::Play) => PauseStep::Pause,
        Some(PlayMode::Pause) => PauseStep::Resume,
        _ => PauseStep::NothingPlaying,
    }
}

/// Log level, log line and reply for a playlist that could not be loaded
fn load_failure(name: &str, err: &MusicError) -> (Level, String, String) {
    match err {
        MusicError::PlaylistNotFound(_) => (
            Level::Warn,
            format!("Playlist `{}` requested but not found", name),
            "cannot load playlist: no such playlist exists".to_owned(),
        ),
        e => (
            Level::Error,
            format!("Error loading playlist `{}`: {}", name, e),
            format!(
                "cannot load playlist: unexpected exception loading playlist: {}\n\n\
                 This exception has been logged.",
                e
            ),
        ),
    }
}

pub struct Music;

#[serenity::async_trait]
impl Plugin for Music {
    fn name(&self) -> &'static str {
        "music"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} <subcommand> [args...] - play music in voice channels (`{}help {}` for details)",
            prefix,
            self.name(),
            prefix,
            self.name()
        ))
    }

    async fn help(&self, ctx: &Context) -> Option<String> {
        let cfg = ctx.cfg.read().await;
        let prefix = &cfg.general.command_prefix;
        let guard = if cfg.music.require_guard_flag {
            format!(" {}", cfg.music.guard_flag)
        } else {
            String::new()
        };

        Some(help_text(prefix, &guard))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let settings = ctx.cfg.read().await.music.clone();

        let Some(args) =
            command::strip_guard(&args, &settings.guard_flag, settings.require_guard_flag)
        else {
            msg.channel_id.say(ctx.cache_http, GATED).await?;
            return Ok(EventHandled::Yes);
        };

        let Some(guild_id) = msg.guild_id else {
            msg.channel_id.say(ctx.cache_http, NOT_IN_GUILD).await?;
            return Ok(EventHandled::Yes);
        };

        let command = match MusicCommand::parse(&args) {
            Ok(command) => command,
            Err(e) => {
                let reply = command::parse_failure_reply(args.first().copied(), &e);
                msg.channel_id.say(ctx.cache_http, reply).await?;
                return Ok(EventHandled::Yes);
            }
        };

        let Some(manager) = songbird::get(ctx.cache_http).await else {
            log_warn!("Voice manager not registered; music will not work");
            msg.channel_id.say(ctx.cache_http, NO_VOICE).await?;
            return Ok(EventHandled::Yes);
        };

        let (store, media, http_client) = {
            let vstate = ctx.vstate.read().await;
            (
                vstate.music.clone(),
                vstate.media.clone(),
                vstate.http_client.clone(),
            )
        };

        let request = Request {
            ctx,
            msg,
            guild_id,
            manager,
            settings,
            store,
            media,
            http_client,
        };
        request.run(command).await?;

        Ok(EventHandled::Yes)
    }
}

/// One `music` command being carried out
struct Request<'a> {
    ctx: &'a Context<'a>,
    msg: &'a Message,
    guild_id: GuildId,
    manager: Arc<Songbird>,
    settings: config::Music,
    store: Arc<QueueStore>,
    media: Arc<dyn MediaResolver>,
    http_client: reqwest::Client,
}

impl Request<'_> {
    async fn run(&self, command: MusicCommand) -> Result<()> {
        match command {
            MusicCommand::Join(id) => self.join(id).await,
            MusicCommand::Add(reference) => self.add(reference).await,
            MusicCommand::Play => self.play().await,
            MusicCommand::Skip => self.skip().await,
            MusicCommand::Pause => self.pause().await,
            MusicCommand::Volume(volume) => self.volume(volume).await,
            MusicCommand::Queue => self.queue().await,
            MusicCommand::Info(index) => self.info(index).await,
            MusicCommand::Playing => self.playing().await,
            MusicCommand::Stop { clear_queue } => self.stop(clear_queue).await,
            MusicCommand::Load { name, randomize } => self.load(name, randomize).await,
            MusicCommand::Remove(target) => self.remove(target).await,
        }
    }

    fn directory(&self) -> CacheDirectory<'_> {
        CacheDirectory {
            cache: self.ctx.cache,
            bot_id: self.ctx.cache.current_user().id,
        }
    }

    async fn say(&self, text: impl Into<String>) -> Result<()> {
        self.msg.channel_id.say(self.ctx.cache_http, text).await?;
        Ok(())
    }

    async fn send_song(
        &self,
        content: Option<&str>,
        song: &Song,
        heading: SongHeading,
    ) -> Result<()> {
        let mut message = CreateMessage::new().embed(song_embed(song, heading, Utc::now()));
        if let Some(content) = content {
            message = message.content(content);
        }
        self.msg
            .channel_id
            .send_message(self.ctx.cache_http, message)
            .await?;
        Ok(())
    }

    /// The bot's voice connection in this guild, provided the caller shares it.  Otherwise replies
    /// to the caller and returns `None`.
    async fn connection_with_caller(
        &self,
        not_connected: &str,
        refused: &str,
    ) -> Result<Option<ActiveConnection>> {
        let outcome = {
            let directory = self.directory();
            resolver::resolve(&directory, VoiceTarget::Guild(self.guild_id)).map(|connection| {
                let present = resolver::caller_in(&directory, &connection, self.msg.author.id);
                (connection, present)
            })
        };

        match outcome {
            Err(_) => {
                self.say(not_connected).await?;
                Ok(None)
            }
            Ok((_, false)) => {
                self.msg.refuse(self.ctx, refused).await;
                Ok(None)
            }
            Ok((connection, true)) => Ok(Some(connection)),
        }
    }

    async fn join(&self, id: Option<u64>) -> Result<()> {
        let plan = match id {
            Some(id) => resolver::plan_join_id(&self.directory(), self.guild_id, id),
            None => resolver::plan_join(&self.directory(), self.guild_id, self.msg.author.id),
        };

        match plan {
            JoinPlan::Ambiguous => {
                self.say("ambiguous/unknown target channel: please join the target voice channel")
                    .await
            }
            JoinPlan::AlreadyConnectedElsewhere => {
                self.say(
                    "already in a channel (also, next time please join the channel you are \
                     referring to first)",
                )
                .await
            }
            JoinPlan::Busy => {
                self.say("cannot join channel: already in another channel in this server")
                    .await
            }
            JoinPlan::AlreadyHere => self.say("Already in this channel with you").await,
            JoinPlan::Connect(channel_id) => {
                if let Err(e) = self.manager.join(self.guild_id, channel_id).await {
                    log_warn!("Could not join voice channel {}: {}", channel_id, e);
                    return self.say(JOIN_FAILED).await;
                }
                self.store
                    .set_notify_channel(self.guild_id, self.msg.channel_id)
                    .await;

                if !self.msg.checkmark(self.ctx).await {
                    self.msg.say_best_effort(self.ctx, "Joined the channel").await;
                }
                Ok(())
            }
        }
    }

    async fn add(&self, reference: String) -> Result<()> {
        let requester = self.msg.author.mention().to_string();
        let song = match Song::unresolved(reference.clone(), requester)
            .resolve(&*self.media)
            .await
        {
            Ok(song) => Song::from(song),
            Err(e) => {
                log_warn!("Unable to add song `{}`: {}", reference, e);
                return self
                    .say("error getting song information; song not added to playlist")
                    .await;
            }
        };

        let position = self
            .store
            .enqueue(self.guild_id, song.clone(), self.msg.channel_id)
            .await;

        self.send_song(
            Some("Song added to end of queue:"),
            &song,
            SongHeading::Info {
                position: Some(position),
            },
        )
        .await
    }

    async fn play(&self) -> Result<()> {
        let connection = self
            .connection_with_caller(
                "cannot play music: not connected to any voice channel",
                "command refused: you are not in the target channel",
            )
            .await?;
        if connection.is_none() {
            return Ok(());
        }

        if self.store.len(self.guild_id).await == 0 {
            return self.say("queue empty: nothing to play").await;
        }

        if !self.store.try_begin_playback(self.guild_id).await {
            return self.say("Already playing music.").await;
        }

        let announce_to = self
            .store
            .notify_channel(self.guild_id)
            .await
            .unwrap_or(self.msg.channel_id);

        let driver = Driver {
            guild_id: self.guild_id,
            store: self.store.clone(),
            media: self.media.clone(),
            playback: SongbirdPlayback {
                manager: self.manager.clone(),
                guild_id: self.guild_id,
                store: self.store.clone(),
                http_client: self.http_client.clone(),
            },
            announcer: ChannelAnnouncer {
                http: self.ctx.http.clone(),
                channel_id: announce_to,
            },
            poll_interval: Duration::from_millis(self.settings.poll_interval_ms),
        };
        tokio::spawn(driver.run());

        Ok(())
    }

    async fn skip(&self) -> Result<()> {
        let connection = self
            .connection_with_caller(
                "cannot skip song: not currently connected to any voice channel",
                REFUSED,
            )
            .await?;
        if connection.is_none() {
            return Ok(());
        }

        if let Some(track) = self.store.track(self.guild_id).await {
            // The driver notices the stopped track and moves on
            let _ = track.stop();
        }
        self.msg.checkmark(self.ctx).await;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let connection = self
            .connection_with_caller(
                "cannot pause music: not currently connected to any voice channel",
                REFUSED,
            )
            .await?;
        if connection.is_none() {
            return Ok(());
        }

        let Some(track) = self.store.track(self.guild_id).await else {
            return self.say(NOTHING_TO_PAUSE).await;
        };

        let mode = track.get_info().await.ok().map(|info| info.playing);
        let toggled = match pause_step(mode.as_ref()) {
            PauseStep::Pause => track.pause(),
            PauseStep::Resume => track.play(),
            PauseStep::NothingPlaying => return self.say(NOTHING_TO_PAUSE).await,
        };
        if let Err(e) = toggled {
            log_warn!("Could not pause or resume music in guild {}: {}", self.guild_id, e);
            return self.say(NOTHING_TO_PAUSE).await;
        }

        self.msg.checkmark(self.ctx).await;
        Ok(())
    }

    async fn volume(&self, volume: f32) -> Result<()> {
        let connection = self
            .connection_with_caller(
                "cannot change volume: not currently connected to any voice channel",
                REFUSED,
            )
            .await?;
        if connection.is_none() {
            return Ok(());
        }

        self.store.set_volume(self.guild_id, volume).await;
        self.msg.checkmark(self.ctx).await;
        Ok(())
    }

    async fn queue(&self) -> Result<()> {
        let queue = self.store.snapshot(self.guild_id).await;
        let now_playing = self.store.now_playing(self.guild_id).await;

        let embed = queue_embed(&queue, now_playing.as_ref(), Utc::now());
        self.msg
            .channel_id
            .send_message(self.ctx.cache_http, CreateMessage::new().embed(embed))
            .await?;
        Ok(())
    }

    async fn info(&self, index: Option<usize>) -> Result<()> {
        let Some(index) = index else {
            return match self.store.now_playing(self.guild_id).await {
                Some(song) => self.send_song(None, &song, SongHeading::NowPlaying).await,
                None => {
                    self.say(
                        "cannot get song information: no song is currently playing and no queue \
                         index specified",
                    )
                    .await
                }
            };
        };

        let song = match self.store.peek(self.guild_id, index).await {
            Ok(song) => song,
            Err(_) => {
                return self
                    .say(
                        "cannot get song info: invalid queue index (queue is shorter than index \
                         provided?)",
                    )
                    .await
            }
        };

        let song = if song.is_resolved() {
            song
        } else {
            match song.clone().resolve(&*self.media).await {
                Ok(resolved) => {
                    let resolved = Song::from(resolved);
                    self.store
                        .replace_resolved(self.guild_id, index, resolved.clone())
                        .await;
                    resolved
                }
                Err(e) => {
                    log_warn!("Unable to load song `{}`: {}", song.reference(), e);
                    song
                }
            }
        };

        self.send_song(
            None,
            &song,
            SongHeading::Info {
                position: Some(index),
            },
        )
        .await
    }

    async fn playing(&self) -> Result<()> {
        match self.store.now_playing(self.guild_id).await {
            Some(song) => self.send_song(None, &song, SongHeading::NowPlaying).await,
            None => {
                self.say("cannot get song information: no song is currently playing")
                    .await
            }
        }
    }

    async fn stop(&self, clear_queue: bool) -> Result<()> {
        let connection = self
            .connection_with_caller(
                "cannot disconnect from voice channel: not connected to any voice channel to \
                 disconnect from",
                REFUSED,
            )
            .await?;
        if connection.is_none() {
            return Ok(());
        }

        if let Some(track) = self.store.take_track(self.guild_id).await {
            let _ = track.stop();
        }
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| anyhow!("Could not leave voice channel: {}", e))?;

        if clear_queue {
            self.store.clear(self.guild_id).await;
            self.store.clear_now_playing(self.guild_id).await;
        }

        self.msg.checkmark(self.ctx).await;
        Ok(())
    }

    async fn load(&self, name: String, randomize: Randomize) -> Result<()> {
        let mention = self.msg.author.mention().to_string();
        let loaded = playlist::load(
            &self.settings.playlist_dir,
            &name,
            randomize,
            self.settings.max_playlist_len,
            &mention,
        )
        .await;

        let songs = match loaded {
            Ok(songs) => songs,
            Err(e) => {
                let (level, line, reply) = load_failure(&name, &e);
                log_at!(level, "{}", line);
                return self.say(reply).await;
            }
        };

        let count = songs.len();
        self.store
            .enqueue_all(self.guild_id, songs, self.msg.channel_id)
            .await;

        self.say(format!(
            "Loaded {} songs from playlist \"{}.json\" into the queue",
            count, name
        ))
        .await
    }

    async fn remove(&self, target: RemoveTarget) -> Result<()> {
        match target {
            RemoveTarget::All => self.store.clear(self.guild_id).await,
            RemoveTarget::Index(index) => {
                if let Err(MusicError::IndexOutOfRange { len, .. }) =
                    self.store.remove(self.guild_id, index).await
                {
                    return self
                        .say(format!(
                            "cannot remove song from queue: invalid queue index (queue has {} \
                             items)",
                            len
                        ))
                        .await;
                }
            }
        }

        self.msg.checkmark(self.ctx).await;
        Ok(())
    }
}
