use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use talkbridge::launcher::{
    self, LaunchOptions, CONFIG_FILE_NAME, DEFAULT_HOST_EXE, DEFAULT_PORT, HOOK_DLL_NAME,
    READY_TIMEOUT,
};

/// TalkBridge launcher - attach the bridge to a TTS host
#[derive(Parser, Debug)]
#[command(name = "talkbridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the host executable (defaults to host.exe beside the launcher)
    host_exe: Option<PathBuf>,
}

/// Exit code carries the chosen port on success, -1 on failure.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let launcher_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    let options = LaunchOptions {
        host_exe: cli
            .host_exe
            .unwrap_or_else(|| launcher_dir.join(DEFAULT_HOST_EXE)),
        hook_dll: launcher_dir.join(HOOK_DLL_NAME),
        config_path: launcher_dir.join(CONFIG_FILE_NAME),
        default_port: DEFAULT_PORT,
        ready_timeout: READY_TIMEOUT,
    };

    match launcher::launch(&options).await {
        Ok(port) => {
            info!(port, "bridge is ready");
            println!("{port}");
            // The port doubles as the exit status so callers without a pipe
            // can still discover it.
            std::process::exit(port as i32);
        }
        Err(e) => {
            error!(error = %e, "launch failed");
            std::process::exit(-1);
        }
    }
}
