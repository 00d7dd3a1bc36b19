use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, anyhow};

/// Runtime settings, read from the environment after `.env` is loaded.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: String,
    /// Origin used for OAuth redirect urls and public upload urls.
    pub public_url: String,
    pub client_secret_path: Option<PathBuf>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub heartbeat: Duration,
    /// A profile is considered gone after this many missed heartbeats.
    pub stale_beats: u32,
    pub session_idle_minutes: i64,
    pub feed_capacity: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "sqlite://pairchat.db?mode=rwc".to_owned(),
            db_max_connections: 16,
            bind_addr: "0.0.0.0:8080".to_owned(),
            public_url: "http://localhost:8080".to_owned(),
            client_secret_path: None,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 25 * 1024 * 1024,
            heartbeat: Duration::from_secs(25),
            stale_beats: 3,
            session_idle_minutes: 30,
            feed_capacity: 256,
            log_level: "info".to_owned(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let defaults = Config::default();

        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
        where
            T::Err: std::fmt::Display,
        {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|err| anyhow!("{err}"))
                    .with_context(|| format!("invalid {key}={raw:?}")),
                None => Ok(default),
            }
        }

        let heartbeat_secs: u64 = parsed(&lookup, "HEARTBEAT_SECS", defaults.heartbeat.as_secs())?;
        if heartbeat_secs == 0 {
            return Err(anyhow!("invalid HEARTBEAT_SECS=0"));
        }

        Ok(Config {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            db_max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            public_url: lookup("PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_owned())
                .unwrap_or(defaults.public_url),
            client_secret_path: lookup("CLIENT_SECRET_PATH").map(PathBuf::from),
            upload_dir: lookup("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            max_upload_bytes: parsed(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            heartbeat: Duration::from_secs(heartbeat_secs),
            stale_beats: parsed(&lookup, "PRESENCE_STALE_BEATS", defaults.stale_beats)?,
            session_idle_minutes: parsed(&lookup, "SESSION_IDLE_MINUTES", defaults.session_idle_minutes)?,
            feed_capacity: parsed(&lookup, "FEED_CAPACITY", defaults.feed_capacity)?,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }

    /// How long a profile may go without a presence write before the sweep marks it offline.
    pub fn stale_after(&self) -> Duration {
        self.heartbeat * self.stale_beats.max(1)
    }
}
