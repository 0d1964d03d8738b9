//! Playlist files: `<playlist_dir>/<name>.json`

use super::command::Randomize;
use super::error::{MusicError, MusicResult};
use super::song::Song;
use rand::seq::SliceRandom;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, serde::Deserialize)]
pub struct Playlist {
    pub playlist: Vec<String>,
    /// Each iteration doubles the list by appending it to itself
    #[serde(default)]
    pub exponential_extend_iter: u32,
    #[serde(default)]
    pub randomize: bool,
}

impl Playlist {
    /// Repeats the references as configured.  Fails if the result would exceed `max_len`.
    pub fn expand(&self, max_len: usize) -> Result<Vec<String>, String> {
        let len = match self.playlist.len() {
            0 => Some(0),
            n => 1usize
                .checked_shl(self.exponential_extend_iter)
                .and_then(|factor| n.checked_mul(factor)),
        };

        match len {
            Some(len) if len <= max_len => {}
            _ => {
                return Err(format!(
                    "playlist expands past the {} entry limit",
                    max_len
                ))
            }
        }

        let mut references = self.playlist.clone();
        if references.is_empty() {
            return Ok(references);
        }
        for _ in 0..self.exponential_extend_iter {
            references.extend_from_within(..);
        }
        Ok(references)
    }
}

/// Playlist names are plain file stems
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

pub async fn read(dir: &Path, name: &str) -> MusicResult<Playlist> {
    if !is_valid_name(name) {
        return Err(MusicError::PlaylistNotFound(name.to_owned()));
    }

    let path = dir.join(format!("{}.json", name));
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(MusicError::PlaylistNotFound(name.to_owned()))
        }
        Err(e) => {
            return Err(MusicError::PlaylistMalformed {
                name: name.to_owned(),
                reason: e.to_string(),
            })
        }
    };

    serde_json::from_str(&contents).map_err(|e| MusicError::PlaylistMalformed {
        name: name.to_owned(),
        reason: e.to_string(),
    })
}

/// Reads, expands and optionally shuffles a playlist into unresolved songs requested by
/// `mention`.
pub async fn load(
    dir: &Path,
    name: &str,
    randomize: Randomize,
    max_len: usize,
    mention: &str,
) -> MusicResult<Vec<Song>> {
    let playlist = read(dir, name).await?;

    let mut references = playlist
        .expand(max_len)
        .map_err(|reason| MusicError::PlaylistMalformed {
            name: name.to_owned(),
            reason,
        })?;

    if randomize.apply(playlist.randomize) {
        references.shuffle(&mut rand::thread_rng());
    }

    let requester = format!("{} from playlist \"{}.json\"", mention, name);
    Ok(references
        .into_iter()
        .map(|reference| Song::unresolved(reference, requester.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn playlist(entries: &[&str], iterations: u32) -> Playlist {
        Playlist {
            playlist: entries.iter().map(|e| e.to_string()).collect(),
            exponential_extend_iter: iterations,
            randomize: false,
        }
    }

    async fn write_playlist(dir: &Path, name: &str, contents: &str) {
        tokio::fs::write(dir.join(format!("{}.json", name)), contents)
            .await
            .unwrap();
    }

    #[test]
    fn each_iteration_doubles_the_list() {
        let expanded = playlist(&["a", "b", "c"], 2).expand(4096).unwrap();

        assert_eq!(expanded.len(), 12);
        assert_eq!(&expanded[..6], &["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn oversized_expansion_is_rejected() {
        assert!(playlist(&["a", "b", "c"], 2).expand(11).is_err());
        assert!(playlist(&["a"], 200).expand(4096).is_err());
        assert_eq!(playlist(&[], 200).expand(4096), Ok(vec![]));
    }

    #[test]
    fn path_like_names_are_invalid() {
        assert!(is_valid_name("chill"));
        assert!(!is_valid_name("../secrets"));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name(""));
    }

    #[tokio::test]
    async fn loads_unresolved_songs_with_playlist_requester() {
        let dir = tempfile::tempdir().unwrap();
        write_playlist(
            dir.path(),
            "chill",
            r#"{"playlist": ["r1", "r2", "r3"], "exponential_extend_iter": 2, "randomize": false}"#,
        )
        .await;

        let songs = load(dir.path(), "chill", Randomize::AsStored, 4096, "<@7>")
            .await
            .unwrap();

        assert_eq!(songs.len(), 12);
        assert!(songs.iter().all(|song| !song.is_resolved()));
        assert_eq!(songs[3].reference(), "r1");
        assert_eq!(songs[0].requester(), "<@7> from playlist \"chill.json\"");
    }

    #[tokio::test]
    async fn shuffling_keeps_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_playlist(
            dir.path(),
            "mix",
            r#"{
                "playlist": ["a", "b", "c", "d"],
                "exponential_extend_iter": 1,
                "randomize": true
            }"#,
        )
        .await;

        let songs = load(dir.path(), "mix", Randomize::AsStored, 4096, "<@7>")
            .await
            .unwrap();
        let mut references: Vec<&str> = songs.iter().map(Song::reference).collect();
        references.sort_unstable();

        assert_eq!(references, vec!["a", "a", "b", "b", "c", "c", "d", "d"]);
    }

    #[tokio::test]
    async fn missing_and_malformed_playlists() {
        let dir = tempfile::tempdir().unwrap();
        write_playlist(dir.path(), "broken", r#"{"playlist": "#).await;

        assert_eq!(
            load(dir.path(), "absent", Randomize::AsStored, 4096, "<@7>").await,
            Err(MusicError::PlaylistNotFound("absent".to_owned()))
        );
        assert_eq!(
            load(dir.path(), "../broken", Randomize::AsStored, 4096, "<@7>").await,
            Err(MusicError::PlaylistNotFound("../broken".to_owned()))
        );
        assert!(matches!(
            load(dir.path(), "broken", Randomize::AsStored, 4096, "<@7>").await,
            Err(MusicError::PlaylistMalformed { .. })
        ));
    }
}
