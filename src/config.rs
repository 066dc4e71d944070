use std::path::PathBuf;
use std::time::Duration;

use log::warn;

use crate::network::peer::DEFAULT_PEER_TIMEOUT;

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    /// Listening port; doubles as the node id in data file names.
    pub port: u16,
    pub data_dir: PathBuf,
    pub peer_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            data_dir: PathBuf::from("."),
            peer_timeout: DEFAULT_PEER_TIMEOUT,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(host) = lookup("HOST") {
            cfg.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PORT") {
            cfg.port = port;
        }
        if let Some(dir) = lookup("DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "PEER_TIMEOUT_MS") {
            cfg.peer_timeout = Duration::from_millis(ms);
        }
        cfg
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(format!("blockchain-{}.txt", self.port))
    }

    pub fn wallet_path(&self) -> PathBuf {
        self.data_dir.join(format!("wallet-{}.txt", self.port))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("CONFIG - ignoring invalid {key}={raw:?}, using default");
            None
        }
    }
}
