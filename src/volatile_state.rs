use crate::{
    config::Config,
    plugin::music::{
        media::{MediaResolver, YtDlp},
        queue::QueueStore,
    },
};
use std::sync::Arc;

/// State which is lost across sessions
pub struct VolatileState {
    /// Per-guild queues, shared with running playback drivers
    pub music: Arc<QueueStore>,
    pub media: Arc<dyn MediaResolver>,
    /// Fetches audio streams for songbird
    pub http_client: reqwest::Client,
}

impl VolatileState {
    pub fn new(cfg: &Config) -> Self {
        Self {
            music: Arc::new(QueueStore::new(cfg.music.default_volume)),
            media: Arc::new(YtDlp::new(cfg.music.ytdlp_program.clone())),
            http_client: reqwest::Client::new(),
        }
    }
}
