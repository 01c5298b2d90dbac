//! Host launcher.
//!
//! Resolves (or assigns) the host's bridge port, creates the host process
//! suspended, injects the hook library, resumes the host, and polls the
//! freshly started bridge's `/ready` until it answers.

pub mod config;

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::hook::{self, HookError};

pub use config::{get_or_add, HostEntry};

pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_HOST_EXE: &str = "host.exe";
pub const HOOK_DLL_NAME: &str = "talkbridge_hook.dll";
pub const CONFIG_FILE_NAME: &str = "talkbridge.json";

/// Default wait for the injected bridge to come up.
pub const READY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no free port left for {0}")]
    NoFreePort(String),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("bridge did not answer /ready within {0:?}")]
    ReadyTimeout(Duration),
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub host_exe: PathBuf,
    pub hook_dll: PathBuf,
    pub config_path: PathBuf,
    pub default_port: u16,
    pub ready_timeout: Duration,
}

/// Spawn, inject and wait; returns the port the bridge answers on.
pub async fn launch(options: &LaunchOptions) -> Result<u16, LauncherError> {
    let entry = config::get_or_add(&options.config_path, &options.host_exe, options.default_port)?;
    info!(
        host = %options.host_exe.display(),
        port = entry.port,
        "launching host"
    );

    let host = hook::spawn_suspended(&options.host_exe)?;
    host.inject_dll(&options.hook_dll)?;
    host.resume()?;
    info!(pid = host.pid(), "host resumed");

    if !wait_until_ready(entry.port, options.ready_timeout).await {
        return Err(LauncherError::ReadyTimeout(options.ready_timeout));
    }
    Ok(entry.port)
}

/// Poll `http://127.0.0.1:{port}/ready` until it answers `"1"`.
pub async fn wait_until_ready(port: u16, timeout: Duration) -> bool {
    let url = format!("http://127.0.0.1:{port}/ready");
    let client = reqwest::Client::new();
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if let Ok(response) = client.get(&url).send().await {
            if let Ok(body) = response.text().await {
                if body == "1" {
                    return true;
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}
