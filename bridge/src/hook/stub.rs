//! Non-Windows stub.
//!
//! The hook kit has no meaningful equivalent outside the Win32 process
//! model; every operation refuses with [`HookError::Unsupported`] so a
//! bridge built for another platform fails attachment cleanly instead of
//! pretending.

use std::path::Path;

use super::HookError;

/// Placeholder for a host spawned suspended.
pub struct SpawnedHost;

impl SpawnedHost {
    pub fn pid(&self) -> u32 {
        0
    }

    pub fn inject_dll(&self, _dll_path: &Path) -> Result<(), HookError> {
        Err(HookError::Unsupported)
    }

    pub fn resume(&self) -> Result<(), HookError> {
        Err(HookError::Unsupported)
    }
}

pub fn spawn_suspended(_exe_path: &Path) -> Result<SpawnedHost, HookError> {
    Err(HookError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_to_spawn() {
        assert!(matches!(
            spawn_suspended(Path::new("host.exe")),
            Err(HookError::Unsupported)
        ));
    }
}
