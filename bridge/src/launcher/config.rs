//! Per-host port registry.
//!
//! A JSON file mapping absolute executable paths to their assigned bridge
//! port. Entries are created on first launch with the first free port at
//! or above the host's default and never mutated afterwards, so a host
//! keeps its port across launches.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::LauncherError;

/// Lowest port the registry will assign.
pub const MIN_PORT: u16 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    pub port: u16,
}

pub type HostConfig = BTreeMap<String, HostEntry>;

pub fn load(path: &Path) -> Result<HostConfig, LauncherError> {
    if !path.exists() {
        return Ok(HostConfig::new());
    }
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn store(path: &Path, config: &HostConfig) -> Result<(), LauncherError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}

fn host_key(host_exe: &Path) -> String {
    std::path::absolute(host_exe)
        .unwrap_or_else(|_| host_exe.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Look up `host_exe`'s entry, creating one with the first free port at or
/// above `default_port` when missing.
pub fn get_or_add(
    config_path: &Path,
    host_exe: &Path,
    default_port: u16,
) -> Result<HostEntry, LauncherError> {
    let mut config = load(config_path)?;
    let key = host_key(host_exe);

    if let Some(entry) = config.get(&key) {
        return Ok(*entry);
    }

    let used: Vec<u16> = config.values().map(|e| e.port).collect();
    let mut port = default_port.max(MIN_PORT);
    while used.contains(&port) {
        if port == u16::MAX {
            return Err(LauncherError::NoFreePort(key));
        }
        port += 1;
    }

    let entry = HostEntry { port };
    config.insert(key, entry);
    store(config_path, &config)?;
    Ok(entry)
}
