//! Settings and credentials, read from a TOML file.
//!
//! The file is looked up at `$BSKY_RELAY_CONFIG`, falling back to
//! `bsky-relay.toml` in the working directory.  Everything outside the
//! `[reddit]` and `[bluesky]` credential tables has a default.
//!
//! ```toml
//! [reddit]
//! client_id = "..."
//! client_secret = "..."
//! username = "..."
//! password = "..."
//! subreddit = "PodcastSharing"
//! bot_hoster = "..."
//!
//! [bluesky]
//! handle = "shareapod.bsky.social"
//! password = "..."
//!
//! [post]
//! hashtags = ["ShareAPodcast"]
//! catchup_limit = 0
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::retry::Backoff;

pub const CONFIG_ENV: &str = "BSKY_RELAY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "bsky-relay.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub reddit: RedditConfig,
    pub bluesky: BlueskyConfig,
    #[serde(default)]
    pub post: PostConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_subreddit")]
    pub subreddit: String,
    /// Reddit account of whoever runs the bot, for the user agent.
    #[serde(default)]
    pub bot_hoster: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlueskyConfig {
    pub handle: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostConfig {
    /// Primary post text.  See [`crate::compose`] for placeholders.
    pub text_template: String,
    /// Hashtag templates, without the leading `#`.
    pub hashtags: Vec<String>,
    /// Between the primary text and the hashtags.
    pub separator: String,
    /// Titles not matching this are skipped.
    pub title_regex: String,
    /// How many of the most recent posts to backfill at startup.  Negative
    /// values mean none.
    pub catchup_limit: i64,
    pub check_every_minutes: u64,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            text_template: "({flair}) {title}".into(),
            hashtags: vec!["ShareAPodcast".into()],
            separator: "\n\n".into(),
            title_regex: r"^\[.+?\]".into(),
            catchup_limit: 0,
            check_every_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub multiplier_secs: u64,
    pub max_sleep_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            multiplier_secs: 5,
            max_sleep_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `tracing` filter directive for the log file.
    pub level: String,
    pub dir: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "debug".into(),
            dir: PathBuf::from("logs"),
        }
    }
}

fn default_subreddit() -> String {
    "PodcastSharing".into()
}

impl Config {
    /// Where to look for the config file.
    pub fn path_from_env() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("reddit.client_id", &self.reddit.client_id),
            ("reddit.client_secret", &self.reddit.client_secret),
            ("reddit.username", &self.reddit.username),
            ("reddit.password", &self.reddit.password),
            ("reddit.subreddit", &self.reddit.subreddit),
            ("bluesky.handle", &self.bluesky.handle),
            ("bluesky.password", &self.bluesky.password),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key,
                    message: "must not be empty".into(),
                });
            }
        }
        self.title_pattern()?;
        if self.post.check_every_minutes == 0 {
            return Err(ConfigError::Invalid {
                key: "post.check_every_minutes",
                message: "must be at least 1".into(),
            });
        }
        if self.retry.multiplier_secs == 0 || self.retry.max_sleep_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "retry",
                message: "sleep durations must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn title_pattern(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.post.title_regex).map_err(|e| ConfigError::Invalid {
            key: "post.title_regex",
            message: e.to_string(),
        })
    }

    pub fn catchup_limit(&self) -> usize {
        usize::try_from(self.post.catchup_limit.max(0)).unwrap_or(usize::MAX)
    }

    pub fn check_every(&self) -> Duration {
        Duration::from_secs(self.post.check_every_minutes.saturating_mul(60))
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_secs(self.retry.multiplier_secs),
            Duration::from_secs(self.retry.max_sleep_secs),
        )
    }
}
