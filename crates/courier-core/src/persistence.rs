//! Snapshot file IO.
//!
//! Loading never fails startup: a missing, unreadable, or corrupt snapshot
//! file yields `None` and the engine begins with empty state.

use std::io;
use std::path::Path;

use courier_store::Snapshot;
use tracing::{debug, warn};

/// Load a snapshot from disk, tolerating every failure mode.
pub(crate) async fn load(path: &Path) -> Option<Snapshot> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No snapshot file, starting fresh");
            return None;
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "Could not read snapshot, starting fresh");
            return None;
        }
    };
    Snapshot::parse(&bytes)
}

/// Write a snapshot to disk.
pub(crate) async fn save(path: &Path, snapshot: &Snapshot) -> io::Result<()> {
    let bytes = snapshot
        .to_json()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, bytes).await
}
