use super::error::MusicResult;
use super::media::MediaResolver;

pub const UNLOADED_TITLE: &str = "<song data not loaded>";
pub const UNKNOWN_TITLE: &str = "<no title>";

/// A queued reference.  Playlist entries start out unresolved and are resolved right before they
/// are displayed in detail or played.
#[derive(Clone, Debug, PartialEq)]
pub enum Song {
    Unresolved { reference: String, requester: String },
    Resolved(ResolvedSong),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedSong {
    pub reference: String,
    pub requester: String,
    pub title: String,
    /// Zero when the media did not report a duration.
    pub duration_secs: u64,
    pub stream_url: String,
}

impl Song {
    pub fn unresolved(reference: impl Into<String>, requester: impl Into<String>) -> Self {
        Song::Unresolved {
            reference: reference.into(),
            requester: requester.into(),
        }
    }

    pub fn reference(&self) -> &str {
        match self {
            Song::Unresolved { reference, .. } => reference,
            Song::Resolved(song) => &song.reference,
        }
    }

    pub fn requester(&self) -> &str {
        match self {
            Song::Unresolved { requester, .. } => requester,
            Song::Resolved(song) => &song.requester,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Song::Unresolved { .. } => UNLOADED_TITLE,
            Song::Resolved(song) => &song.title,
        }
    }

    pub fn duration_secs(&self) -> u64 {
        match self {
            Song::Unresolved { .. } => 0,
            Song::Resolved(song) => song.duration_secs,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Song::Resolved(_))
    }

    /// Resolves the song through `media`.  Already resolved songs are returned unchanged.
    pub async fn resolve<M: MediaResolver + ?Sized>(self, media: &M) -> MusicResult<ResolvedSong> {
        match self {
            Song::Resolved(song) => Ok(song),
            Song::Unresolved {
                reference,
                requester,
            } => {
                let found = media.resolve(&reference).await?;
                Ok(ResolvedSong {
                    title: found.title.unwrap_or_else(|| UNKNOWN_TITLE.to_owned()),
                    duration_secs: found.duration_secs.unwrap_or(0),
                    stream_url: found.stream_url,
                    reference,
                    requester,
                })
            }
        }
    }
}

impl From<ResolvedSong> for Song {
    fn from(song: ResolvedSong) -> Self {
        Song::Resolved(song)
    }
}

/// `3m7s`, or `None` for an unknown (zero) duration.
pub fn format_duration(duration_secs: u64) -> Option<String> {
    if duration_secs == 0 {
        return None;
    }
    Some(format!("{}m{}s", duration_secs / 60, duration_secs % 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::music::media::tests::FakeMedia;
    use pretty_assertions::assert_eq;

    #[test]
    fn unresolved_song_reports_placeholders() {
        let song = Song::unresolved("https://example.com/a", "<@1>");

        assert_eq!(song.title(), UNLOADED_TITLE);
        assert_eq!(song.duration_secs(), 0);
        assert_eq!(song.reference(), "https://example.com/a");
        assert!(!song.is_resolved());
    }

    #[tokio::test]
    async fn resolution_fills_metadata_and_keeps_requester() {
        let media = FakeMedia::default().with("ref-a", Some("Song A"), Some(187));

        let song = Song::unresolved("ref-a", "<@1>").resolve(&media).await.unwrap();

        assert_eq!(song.title, "Song A");
        assert_eq!(song.duration_secs, 187);
        assert_eq!(song.requester, "<@1>");
        assert_eq!(song.stream_url, "https://stream.example/ref-a");
    }

    #[tokio::test]
    async fn missing_metadata_falls_back_to_unknowns() {
        let media = FakeMedia::default().with("ref-b", None, None);

        let song = Song::unresolved("ref-b", "<@1>").resolve(&media).await.unwrap();

        assert_eq!(song.title, UNKNOWN_TITLE);
        assert_eq!(format_duration(song.duration_secs), None);
    }

    #[tokio::test]
    async fn unknown_reference_fails_resolution() {
        let media = FakeMedia::default();

        assert!(Song::unresolved("nope", "<@1>").resolve(&media).await.is_err());
    }

    #[test]
    fn durations_render_as_minutes_and_seconds() {
        assert_eq!(format_duration(187).as_deref(), Some("3m7s"));
        assert_eq!(format_duration(59).as_deref(), Some("0m59s"));
    }
}
