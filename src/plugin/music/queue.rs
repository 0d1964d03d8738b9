use super::error::{MusicError, MusicResult};
use super::song::Song;
use serenity::all::{ChannelId, GuildId};
use songbird::tracks::TrackHandle;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Music state for one guild.  Created on first use and kept for the lifetime of the process.
#[derive(Default)]
pub struct GuildMusicState {
    /// Where playback announcements go
    pub notify_channel: Option<ChannelId>,
    /// Position 1 (index 0) plays next
    pub queue: VecDeque<Song>,
    pub now_playing: Option<Song>,
    /// Unset until someone changes the volume; reads fall back to the configured default.
    pub volume: Option<f32>,
    pub track: Option<TrackHandle>,
    /// A playback driver is running for this guild
    pub driving: bool,
}

/// Registry of per-guild music state.  Every operation holds the lock only briefly, so readers may
/// observe a queue that playback is about to change.
pub struct QueueStore {
    guilds: RwLock<HashMap<GuildId, GuildMusicState>>,
    default_volume: f32,
}

impl QueueStore {
    pub fn new(default_volume: f32) -> Self {
        Self {
            guilds: RwLock::new(HashMap::new()),
            default_volume,
        }
    }

    /// Appends `song` and makes `channel` the guild's notification channel.  Returns the song's
    /// 1-based queue position.
    pub async fn enqueue(&self, guild_id: GuildId, song: Song, channel: ChannelId) -> usize {
        let mut guilds = self.guilds.write().await;
        let state = guilds.entry(guild_id).or_default();
        state.queue.push_back(song);
        state.notify_channel = Some(channel);
        state.queue.len()
    }

    pub async fn enqueue_all(
        &self,
        guild_id: GuildId,
        songs: Vec<Song>,
        channel: ChannelId,
    ) -> usize {
        let mut guilds = self.guilds.write().await;
        let state = guilds.entry(guild_id).or_default();
        state.queue.extend(songs);
        state.notify_channel = Some(channel);
        state.queue.len()
    }

    /// Pops position 1 into the now-playing slot and returns a copy of it.
    pub async fn dequeue_next(&self, guild_id: GuildId) -> MusicResult<Song> {
        let mut guilds = self.guilds.write().await;
        let state = guilds.entry(guild_id).or_default();
        let song = state.queue.pop_front().ok_or(MusicError::QueueEmpty)?;
        state.now_playing = Some(song.clone());
        Ok(song)
    }

    /// 1-based lookup
    pub async fn peek(&self, guild_id: GuildId, index: usize) -> MusicResult<Song> {
        let guilds = self.guilds.read().await;
        let queue = guilds.get(&guild_id).map(|state| &state.queue);
        let len = queue.map_or(0, VecDeque::len);

        index
            .checked_sub(1)
            .and_then(|i| queue?.get(i).cloned())
            .ok_or(MusicError::IndexOutOfRange { index, len })
    }

    /// 1-based removal.  Out of range indexes leave the queue untouched.
    pub async fn remove(&self, guild_id: GuildId, index: usize) -> MusicResult<Song> {
        let mut guilds = self.guilds.write().await;
        let state = guilds.entry(guild_id).or_default();
        let len = state.queue.len();

        index
            .checked_sub(1)
            .and_then(|i| state.queue.remove(i))
            .ok_or(MusicError::IndexOutOfRange { index, len })
    }

    pub async fn clear(&self, guild_id: GuildId) {
        if let Some(state) = self.guilds.write().await.get_mut(&guild_id) {
            state.queue.clear();
        }
    }

    /// Stores a lazily resolved song back into its slot, provided the slot still holds the same
    /// reference.
    pub async fn replace_resolved(&self, guild_id: GuildId, index: usize, song: Song) -> bool {
        let mut guilds = self.guilds.write().await;
        let Some(slot) = guilds
            .get_mut(&guild_id)
            .and_then(|state| state.queue.get_mut(index.checked_sub(1)?))
        else {
            return false;
        };

        if slot.reference() != song.reference() {
            return false;
        }
        *slot = song;
        true
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> Vec<Song> {
        self.guilds
            .read()
            .await
            .get(&guild_id)
            .map(|state| state.queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn len(&self, guild_id: GuildId) -> usize {
        self.guilds
            .read()
            .await
            .get(&guild_id)
            .map_or(0, |state| state.queue.len())
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<Song> {
        self.guilds
            .read()
            .await
            .get(&guild_id)
            .and_then(|state| state.now_playing.clone())
    }

    pub async fn set_now_playing(&self, guild_id: GuildId, song: Song) {
        self.guilds.write().await.entry(guild_id).or_default().now_playing = Some(song);
    }

    pub async fn clear_now_playing(&self, guild_id: GuildId) {
        if let Some(state) = self.guilds.write().await.get_mut(&guild_id) {
            state.now_playing = None;
        }
    }

    pub async fn notify_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.guilds
            .read()
            .await
            .get(&guild_id)
            .and_then(|state| state.notify_channel)
    }

    pub async fn set_notify_channel(&self, guild_id: GuildId, channel: ChannelId) {
        self.guilds.write().await.entry(guild_id).or_default().notify_channel = Some(channel);
    }

    pub async fn volume(&self, guild_id: GuildId) -> f32 {
        self.guilds
            .read()
            .await
            .get(&guild_id)
            .and_then(|state| state.volume)
            .unwrap_or(self.default_volume)
    }

    /// Persists the guild volume and applies it to the current track, if any.  Applying is
    /// best-effort; a track that already ended simply ignores it.
    pub async fn set_volume(&self, guild_id: GuildId, volume: f32) {
        let mut guilds = self.guilds.write().await;
        let state = guilds.entry(guild_id).or_default();
        state.volume = Some(volume);
        if let Some(track) = &state.track {
            let _ = track.set_volume(volume);
        }
    }

    pub async fn track(&self, guild_id: GuildId) -> Option<TrackHandle> {
        self.guilds
            .read()
            .await
            .get(&guild_id)
            .and_then(|state| state.track.clone())
    }

    pub async fn set_track(&self, guild_id: GuildId, track: TrackHandle) {
        self.guilds.write().await.entry(guild_id).or_default().track = Some(track);
    }

    pub async fn take_track(&self, guild_id: GuildId) -> Option<TrackHandle> {
        self.guilds
            .write()
            .await
            .get_mut(&guild_id)
            .and_then(|state| state.track.take())
    }

    /// Claims the guild for a playback driver.  Returns false if one is already running.
    pub async fn try_begin_playback(&self, guild_id: GuildId) -> bool {
        let mut guilds = self.guilds.write().await;
        let state = guilds.entry(guild_id).or_default();
        if state.driving {
            return false;
        }
        state.driving = true;
        true
    }

    pub async fn end_playback(&self, guild_id: GuildId) {
        if let Some(state) = self.guilds.write().await.get_mut(&guild_id) {
            state.driving = false;
            state.track = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GUILD: GuildId = GuildId::new(10);
    const OTHER_GUILD: GuildId = GuildId::new(11);
    const CHANNEL: ChannelId = ChannelId::new(20);

    fn song(reference: &str) -> Song {
        Song::unresolved(reference, "<@1>")
    }

    async fn store_with(references: &[&str]) -> QueueStore {
        let store = QueueStore::new(0.5);
        for reference in references {
            store.enqueue(GUILD, song(reference), CHANNEL).await;
        }
        store
    }

    fn references(songs: &[Song]) -> Vec<&str> {
        songs.iter().map(Song::reference).collect()
    }

    #[tokio::test]
    async fn enqueue_keeps_fifo_order_and_records_channel() {
        let store = QueueStore::new(0.5);

        assert_eq!(store.enqueue(GUILD, song("a"), CHANNEL).await, 1);
        assert_eq!(store.enqueue(GUILD, song("b"), CHANNEL).await, 2);

        assert_eq!(references(&store.snapshot(GUILD).await), vec!["a", "b"]);
        assert_eq!(store.notify_channel(GUILD).await, Some(CHANNEL));
    }

    #[tokio::test]
    async fn dequeue_pops_front_into_now_playing() {
        let store = store_with(&["a", "b", "c"]).await;

        let first = store.dequeue_next(GUILD).await.unwrap();

        assert_eq!(first.reference(), "a");
        assert_eq!(store.now_playing(GUILD).await, Some(song("a")));
        assert_eq!(references(&store.snapshot(GUILD).await), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn dequeue_from_empty_queue_fails() {
        let store = QueueStore::new(0.5);

        assert_eq!(store.dequeue_next(GUILD).await, Err(MusicError::QueueEmpty));
        assert_eq!(store.now_playing(GUILD).await, None);
    }

    #[tokio::test]
    async fn peek_is_one_based() {
        let store = store_with(&["a", "b"]).await;

        assert_eq!(store.peek(GUILD, 2).await.unwrap().reference(), "b");
        assert_eq!(
            store.peek(GUILD, 3).await,
            Err(MusicError::IndexOutOfRange { index: 3, len: 2 })
        );
        assert_eq!(
            store.peek(GUILD, 0).await,
            Err(MusicError::IndexOutOfRange { index: 0, len: 2 })
        );
    }

    #[tokio::test]
    async fn out_of_range_remove_leaves_queue_untouched() {
        let store = store_with(&["a", "b", "c"]).await;

        assert_eq!(
            store.remove(GUILD, 4).await,
            Err(MusicError::IndexOutOfRange { index: 4, len: 3 })
        );
        assert_eq!(references(&store.snapshot(GUILD).await), vec!["a", "b", "c"]);

        assert_eq!(store.remove(GUILD, 2).await.unwrap().reference(), "b");
        assert_eq!(references(&store.snapshot(GUILD).await), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn clear_empties_whole_queue() {
        let store = store_with(&["a", "b", "c", "d", "e"]).await;

        store.clear(GUILD).await;

        assert_eq!(store.len(GUILD).await, 0);
    }

    #[tokio::test]
    async fn volume_defaults_until_set_and_is_guild_scoped() {
        let store = QueueStore::new(0.5);
        assert_eq!(store.volume(GUILD).await, 0.5);

        store.set_volume(GUILD, 1.25).await;

        assert_eq!(store.volume(GUILD).await, 1.25);
        assert_eq!(store.volume(OTHER_GUILD).await, 0.5);
    }

    #[tokio::test]
    async fn replace_resolved_checks_reference() {
        let store = store_with(&["a", "b"]).await;

        assert!(!store.replace_resolved(GUILD, 1, song("zzz")).await);
        assert!(store.replace_resolved(GUILD, 2, song("b")).await);
        assert!(!store.replace_resolved(GUILD, 5, song("b")).await);
    }

    #[tokio::test]
    async fn only_one_driver_per_guild() {
        let store = QueueStore::new(0.5);

        assert!(store.try_begin_playback(GUILD).await);
        assert!(!store.try_begin_playback(GUILD).await);
        assert!(store.try_begin_playback(OTHER_GUILD).await);

        store.end_playback(GUILD).await;

        assert!(store.try_begin_playback(GUILD).await);
    }
}
