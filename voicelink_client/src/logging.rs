use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "VOICELINK_LOG";

static TRACING_INIT: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub path: PathBuf,
    /// Raises the default level to `debug` when `VOICELINK_LOG` is unset.
    pub debug: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: env::temp_dir().join("voicelink.log"),
            debug: false,
        }
    }
}

/// Installs the global subscriber once. If the log file cannot be opened,
/// logging stays off.
pub fn init(config: &LogConfig) {
    let _ = TRACING_INIT.get_or_init(|| {
        let file = match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
        {
            Ok(file) => file,
            Err(_) => return,
        };
        let default_level = if config.debug { "debug" } else { "info" };
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(default_level));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
