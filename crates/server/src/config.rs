use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use marquee_engine::DispatcherConfig;

/// Runtime configuration, parsed from CLI flags with environment fallbacks.
///
/// | Flag                  | Env                 | Default   |
/// |-----------------------|---------------------|-----------|
/// | `--host`              | `HOST`              | `0.0.0.0` |
/// | `--port`, `-p`        | `PORT`              | `3003`    |
/// | `--width`, `-W`       | `WIDTH`             | `32`      |
/// | `--height`, `-H`      | `HEIGHT`            | `32`      |
/// | `--assets-dir`        | `ASSETS_DIR`        | `assets`  |
/// | `--queue-depth`       | `QUEUE_DEPTH`       | `50`      |
/// | `--stop-timeout-secs` | `STOP_TIMEOUT_SECS` | `5`       |
/// | `--log`, `-l`         | `LOG_FILE`          | --        |
/// | `--dry-run`, `-n`     | --                  | off       |
#[derive(Debug, Clone, Parser)]
#[command(
    name = "marquee-server",
    version,
    about = "WebSocket job server for an LED matrix display"
)]
pub struct ServerConfig {
    /// Bind address.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port.
    #[arg(short = 'p', long, env = "PORT", default_value_t = 3003)]
    pub port: u16,

    /// Width of the matrix in pixels.
    #[arg(short = 'W', long, env = "WIDTH", default_value_t = 32)]
    pub width: u32,

    /// Height of the matrix in pixels.
    #[arg(short = 'H', long, env = "HEIGHT", default_value_t = 32)]
    pub height: u32,

    /// Root directory for fonts, animations and images.
    #[arg(long, env = "ASSETS_DIR", default_value = "assets", value_name = "DIR")]
    pub assets_dir: PathBuf,

    /// Maximum number of pending jobs before the oldest is evicted.
    #[arg(long, env = "QUEUE_DEPTH", default_value_t = marquee_core::DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,

    /// Grace period for a job to honour a cooperative stop, in seconds.
    #[arg(long, env = "STOP_TIMEOUT_SECS", default_value_t = 5)]
    pub stop_timeout_secs: u64,

    /// Redirect logs to a file instead of stdout.
    #[arg(short = 'l', long = "log", env = "LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Drive the display with random jobs instead of waiting for clients.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

impl ServerConfig {
    /// Dispatcher tuning derived from the queue and stop-timeout flags.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_queue_depth: self.queue_depth,
            stop_timeout: Duration::from_secs(self.stop_timeout_secs),
        }
    }
}
