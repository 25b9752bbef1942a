//! License file loading and periodic reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Result, TollgateError};

use super::record::LicenseFile;
use super::snapshot::{LicenseSnapshot, SharedSnapshot};

/// Load and compile the license file.
///
/// A missing or malformed file is fatal at startup: the gateway must not
/// admit traffic without a complete license set.
pub fn load_snapshot(path: &Path) -> Result<LicenseSnapshot> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        TollgateError::License(format!("license file {}: {e}", path.display()))
    })?;
    let file: LicenseFile = serde_json::from_str(&contents).map_err(|e| {
        TollgateError::License(format!("license file {}: {e}", path.display()))
    })?;
    LicenseSnapshot::compile(&file)
}

/// Periodically re-read the license file and swap the shared snapshot.
///
/// A failed reload keeps the previous snapshot; readers always see either
/// the old or the new license set, never a partial one.
pub fn spawn_reload_task(
    path: PathBuf,
    interval: Duration,
    handle: SharedSnapshot,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; the file was just loaded.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match load_snapshot(&path) {
                Ok(snapshot) => {
                    info!(
                        path = %path.display(),
                        clients = snapshot.client_count(),
                        "License snapshot reloaded"
                    );
                    handle.store(Arc::new(snapshot));
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "License reload failed, keeping previous snapshot"
                    );
                }
            }
        }
    })
}
