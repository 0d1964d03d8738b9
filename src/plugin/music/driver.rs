//! Per-guild playback loop.  One driver task runs per guild while music is playing; it owns the
//! sequencing from queue to voice connection and exits once the queue is exhausted or the bot
//! leaves the channel.

use super::error::{MusicError, MusicResult};
use super::media::MediaResolver;
use super::queue::QueueStore;
use super::song::ResolvedSong;
use crate::{log_error, log_info};
use serenity::all::GuildId;
use std::sync::Arc;
use std::time::Duration;

pub const QUEUE_EXHAUSTED: &str = "queue exhausted: stopping music playback";
pub const PLAYBACK_FAILED: &str = "Sorry, there was an unexpected error while playing music.";

/// The voice connection a driver plays into
#[serenity::async_trait]
pub trait Playback: Send + Sync {
    async fn is_connected(&self) -> bool;
    async fn start(&self, song: &ResolvedSong, volume: f32) -> MusicResult<()>;
    /// True once the most recently started track has stopped for good.  A track that stopped
    /// because of an error reports that error instead.
    async fn is_finished(&self) -> MusicResult<bool>;
    async fn disconnect(&self);
}

/// Where a driver reports progress.  Delivery is best-effort.
#[serenity::async_trait]
pub trait Announcer: Send + Sync {
    async fn now_playing(&self, song: &ResolvedSong);
    async fn say(&self, text: &str);
}

pub struct Driver<P, A> {
    pub guild_id: GuildId,
    pub store: Arc<QueueStore>,
    pub media: Arc<dyn MediaResolver>,
    pub playback: P,
    pub announcer: A,
    pub poll_interval: Duration,
}

impl<P: Playback, A: Announcer> Driver<P, A> {
    /// Plays until done.  The caller must have claimed the guild with
    /// [`QueueStore::try_begin_playback`]; the claim is released on return.
    pub async fn run(self) {
        log_info!("Starting music playback in guild {}", self.guild_id);

        match self.play_queue().await {
            // Stopped or moved out of the channel while a track was being set up
            Ok(()) | Err(MusicError::NotConnected) => {}
            Err(e) => {
                log_error!(
                    "Music playback in guild {} failed: {:?}: {}",
                    self.guild_id,
                    e,
                    e
                );
                self.announcer.say(PLAYBACK_FAILED).await;
                self.playback.disconnect().await;
            }
        }

        self.store.clear_now_playing(self.guild_id).await;
        self.store.end_playback(self.guild_id).await;
        log_info!("Music playback in guild {} ended", self.guild_id);
    }

    async fn play_queue(&self) -> MusicResult<()> {
        loop {
            // The queue belongs to the user again once the bot has left
            if !self.playback.is_connected().await {
                return Ok(());
            }

            let song = match self.store.dequeue_next(self.guild_id).await {
                Ok(song) => song,
                Err(MusicError::QueueEmpty) => {
                    self.announcer.say(QUEUE_EXHAUSTED).await;
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            let song = song.resolve(&*self.media).await?;
            self.store
                .set_now_playing(self.guild_id, song.clone().into())
                .await;

            self.announcer.now_playing(&song).await;

            let volume = self.store.volume(self.guild_id).await;
            self.playback.start(&song, volume).await?;

            loop {
                tokio::time::sleep(self.poll_interval).await;
                if !self.playback.is_connected().await {
                    return Ok(());
                }
                if self.playback.is_finished().await? {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::music::media::tests::FakeMedia;
    use crate::plugin::music::song::Song;
    use pretty_assertions::assert_eq;
    use serenity::all::ChannelId;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, OnceLock};

    const GUILD: GuildId = GuildId::new(1);
    const CHANNEL: ChannelId = ChannelId::new(2);

    /// What the store showed when a track started: now playing, then the queue
    type Observed = (Option<String>, Vec<String>);

    /// Tracks finish as soon as they start
    #[derive(Default)]
    struct FakePlayback {
        connected: AtomicBool,
        disconnect_after_first: bool,
        /// Leaves the channel while reporting the track finished, like `stop` racing a poll
        disconnect_when_finished: bool,
        /// The connection drops just as a track is handed to it
        refuse_start: bool,
        store: OnceLock<Arc<QueueStore>>,
        observed: Mutex<Vec<Observed>>,
        started: Mutex<Vec<(String, f32)>>,
        disconnects: Mutex<usize>,
    }

    impl FakePlayback {
        fn connected() -> Self {
            Self {
                connected: AtomicBool::new(true),
                ..Default::default()
            }
        }
    }

    #[serenity::async_trait]
    impl Playback for Arc<FakePlayback> {
        async fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn start(&self, song: &ResolvedSong, volume: f32) -> MusicResult<()> {
            if self.refuse_start || !self.connected.load(Ordering::SeqCst) {
                return Err(MusicError::NotConnected);
            }
            if let Some(store) = self.store.get() {
                let now_playing = store
                    .now_playing(GUILD)
                    .await
                    .map(|song| song.title().to_owned());
                let queue = store
                    .snapshot(GUILD)
                    .await
                    .iter()
                    .map(|song| song.reference().to_owned())
                    .collect();
                self.observed.lock().unwrap().push((now_playing, queue));
            }
            self.started
                .lock()
                .unwrap()
                .push((song.reference.clone(), volume));
            if self.disconnect_after_first {
                self.connected.store(false, Ordering::SeqCst);
            }
            Ok(())
        }

        async fn is_finished(&self) -> MusicResult<bool> {
            if self.disconnect_when_finished {
                self.connected.store(false, Ordering::SeqCst);
            }
            Ok(true)
        }

        async fn disconnect(&self) {
            self.connected.store(false, Ordering::SeqCst);
            *self.disconnects.lock().unwrap() += 1;
        }
    }

    #[derive(Default)]
    struct FakeAnnouncer {
        said: Mutex<Vec<String>>,
    }

    #[serenity::async_trait]
    impl Announcer for Arc<FakeAnnouncer> {
        async fn now_playing(&self, song: &ResolvedSong) {
            self.said
                .lock()
                .unwrap()
                .push(format!("Now Playing: {}", song.title));
        }

        async fn say(&self, text: &str) {
            self.said.lock().unwrap().push(text.to_owned());
        }
    }

    struct Harness {
        store: Arc<QueueStore>,
        playback: Arc<FakePlayback>,
        announcer: Arc<FakeAnnouncer>,
    }

    async fn run_with(queue: &[&str], playback: FakePlayback) -> Harness {
        let media = FakeMedia::default()
            .with("a", Some("Song A"), Some(100))
            .with("b", Some("Song B"), None);
        let store = Arc::new(QueueStore::new(0.5));
        for reference in queue {
            store
                .enqueue(GUILD, Song::unresolved(*reference, "<@1>"), CHANNEL)
                .await;
        }
        store.set_volume(GUILD, 0.8).await;
        assert!(store.try_begin_playback(GUILD).await);
        let _ = playback.store.set(store.clone());

        let harness = Harness {
            store: store.clone(),
            playback: Arc::new(playback),
            announcer: Arc::new(FakeAnnouncer::default()),
        };

        Driver {
            guild_id: GUILD,
            store,
            media: Arc::new(media),
            playback: harness.playback.clone(),
            announcer: harness.announcer.clone(),
            poll_interval: Duration::from_millis(1),
        }
        .run()
        .await;

        harness
    }

    #[tokio::test]
    async fn plays_queue_in_order_then_announces_exhaustion() {
        let harness = run_with(&["a", "b"], FakePlayback::connected()).await;

        assert_eq!(
            *harness.playback.started.lock().unwrap(),
            vec![("a".to_owned(), 0.8), ("b".to_owned(), 0.8)]
        );
        assert_eq!(
            *harness.announcer.said.lock().unwrap(),
            vec!["Now Playing: Song A", "Now Playing: Song B", QUEUE_EXHAUSTED]
        );
        assert_eq!(
            *harness.playback.observed.lock().unwrap(),
            vec![
                (Some("Song A".to_owned()), vec!["b".to_owned()]),
                (Some("Song B".to_owned()), vec![]),
            ]
        );
        assert_eq!(harness.store.now_playing(GUILD).await, None);
        assert_eq!(harness.store.len(GUILD).await, 0);
        assert!(harness.store.try_begin_playback(GUILD).await);
    }

    #[tokio::test]
    async fn resolution_failure_disconnects_and_keeps_rest_of_queue() {
        let harness = run_with(&["missing", "b"], FakePlayback::connected()).await;

        assert!(harness.playback.started.lock().unwrap().is_empty());
        assert_eq!(*harness.announcer.said.lock().unwrap(), vec![PLAYBACK_FAILED]);
        assert_eq!(*harness.playback.disconnects.lock().unwrap(), 1);
        assert_eq!(harness.store.len(GUILD).await, 1);
        assert_eq!(harness.store.now_playing(GUILD).await, None);
        assert!(harness.store.try_begin_playback(GUILD).await);
    }

    #[tokio::test]
    async fn leaving_the_channel_ends_playback_quietly() {
        let playback = FakePlayback {
            disconnect_after_first: true,
            ..FakePlayback::connected()
        };

        let harness = run_with(&["a", "b"], playback).await;

        assert_eq!(harness.playback.started.lock().unwrap().len(), 1);
        assert_eq!(
            *harness.announcer.said.lock().unwrap(),
            vec!["Now Playing: Song A"]
        );
        assert_eq!(harness.store.len(GUILD).await, 1);
        assert_eq!(harness.store.now_playing(GUILD).await, None);
        assert!(harness.store.try_begin_playback(GUILD).await);
    }

    #[tokio::test]
    async fn stop_between_polls_keeps_the_rest_of_the_queue() {
        let playback = FakePlayback {
            disconnect_when_finished: true,
            ..FakePlayback::connected()
        };

        let harness = run_with(&["a", "b"], playback).await;

        assert_eq!(harness.playback.started.lock().unwrap().len(), 1);
        assert_eq!(
            *harness.announcer.said.lock().unwrap(),
            vec!["Now Playing: Song A"]
        );
        assert_eq!(*harness.playback.disconnects.lock().unwrap(), 0);
        assert_eq!(
            harness
                .store
                .snapshot(GUILD)
                .await
                .iter()
                .map(Song::reference)
                .collect::<Vec<_>>(),
            vec!["b"]
        );
        assert_eq!(harness.store.now_playing(GUILD).await, None);
        assert!(harness.store.try_begin_playback(GUILD).await);
    }

    #[tokio::test]
    async fn leaving_while_a_track_starts_is_not_a_failure() {
        let playback = FakePlayback {
            refuse_start: true,
            ..FakePlayback::connected()
        };

        let harness = run_with(&["a", "b"], playback).await;

        assert_eq!(
            *harness.announcer.said.lock().unwrap(),
            vec!["Now Playing: Song A"]
        );
        assert_eq!(*harness.playback.disconnects.lock().unwrap(), 0);
        assert_eq!(harness.store.len(GUILD).await, 1);
        assert_eq!(harness.store.now_playing(GUILD).await, None);
        assert!(harness.store.try_begin_playback(GUILD).await);
    }

    #[tokio::test]
    async fn empty_queue_while_disconnected_exits_silently() {
        let harness = run_with(&[], FakePlayback::default()).await;

        assert!(harness.announcer.said.lock().unwrap().is_empty());
        assert!(harness.store.try_begin_playback(GUILD).await);
    }
}
