use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/jukebot/config.toml";

/// Bot configuration
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub music: Music,
    pub member_log: Option<MemberLog>,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct General {
    pub discord_token: String,
    pub command_prefix: String,
}

/// Verbosity thresholds run from 0 (fatal only) to 5 (debug).
#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Logging {
    pub directory: PathBuf,
    pub file_name: String,
    pub file_level: u8,
    pub console_level: u8,
    pub errors_to_stderr: bool,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Music {
    /// While set, `music` only runs when the guard flag is part of the command.
    pub require_guard_flag: bool,
    pub guard_flag: String,
    pub default_volume: f32,
    pub playlist_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub max_playlist_len: usize,
    pub ytdlp_program: String,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct MemberLog {
    pub guild_id: u64,
    pub notify_channel_id: u64,
    pub members_log: PathBuf,
    pub autoban_pattern: Option<String>,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "jukebot.log".to_owned(),
            file_level: 4,
            console_level: 4,
            errors_to_stderr: true,
        }
    }
}

impl Default for Music {
    fn default() -> Self {
        Self {
            require_guard_flag: true,
            guard_flag: "--bypass".to_owned(),
            default_volume: 0.5,
            playlist_dir: PathBuf::from("playlists"),
            poll_interval_ms: 1000,
            max_playlist_len: 4096,
            ytdlp_program: "yt-dlp".to_owned(),
        }
    }
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        Self::parse(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.general.command_prefix.is_empty() {
            bail!("general.command_prefix must not be empty");
        }
        if self.logging.file_level > 5 || self.logging.console_level > 5 {
            bail!(
                "logging levels run from 0 to 5, got file_level {} and console_level {}",
                self.logging.file_level,
                self.logging.console_level
            );
        }
        if !(0.0..=2.0).contains(&self.music.default_volume) {
            bail!(
                "music.default_volume must be between 0.0 and 2.0, got {}",
                self.music.default_volume
            );
        }
        if self.music.poll_interval_ms == 0 {
            bail!("music.poll_interval_ms must be greater than 0");
        }
        if self.music.guard_flag.trim().is_empty() {
            bail!("music.guard_flag must not be empty");
        }
        Ok(())
    }
}
