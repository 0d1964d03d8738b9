//! Resolves submitted references (page URLs, search terms) to playable streams through `yt-dlp`.

use super::error::{MusicError, MusicResult};
use crate::log_debug;

/// What the extraction tool reported about a reference
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedMedia {
    pub title: Option<String>,
    pub duration_secs: Option<u64>,
    pub stream_url: String,
}

#[serenity::async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> MusicResult<ResolvedMedia>;
}

#[derive(serde::Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    duration: Option<f64>,
    url: Option<String>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(serde::Deserialize)]
struct YtDlpFormat {
    url: Option<String>,
}

/// Runs `yt-dlp -j` for each reference.  No timeout is applied; a hung extraction only stalls the
/// guild that asked for it.
pub struct YtDlp {
    program: String,
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Picks the first usable stream from the tool's ranked candidates: the selected format's
    /// `url`, then each entry of `formats` in order.
    pub fn parse_info(json: &str) -> MusicResult<ResolvedMedia> {
        let info: YtDlpInfo = serde_json::from_str(json)
            .map_err(|e| MusicError::Resolution(format!("unreadable yt-dlp output: {}", e)))?;

        let stream_url = info
            .url
            .into_iter()
            .chain(info.formats.into_iter().filter_map(|format| format.url))
            .find(|url| !url.is_empty())
            .ok_or_else(|| MusicError::Resolution("no playable stream found".to_owned()))?;

        Ok(ResolvedMedia {
            title: info.title,
            duration_secs: info
                .duration
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(|d| d.round() as u64),
            stream_url,
        })
    }
}

#[serenity::async_trait]
impl MediaResolver for YtDlp {
    async fn resolve(&self, reference: &str) -> MusicResult<ResolvedMedia> {
        log_debug!("Resolving `{}` with {}", reference, self.program);

        let output = tokio::process::Command::new(&self.program)
            .args(["-j", "--no-playlist", "-f", "bestaudio", "--", reference])
            .output()
            .await
            .map_err(|e| MusicError::Resolution(format!("could not run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(MusicError::Resolution(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let first_line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| MusicError::Resolution("yt-dlp returned nothing".to_owned()))?;

        Self::parse_info(first_line)
    }
}
