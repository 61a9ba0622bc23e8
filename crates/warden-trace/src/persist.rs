//! Reading and writing the persisted trace JSON form.

use std::{fs, path::Path};

use tracing::debug;

use warden_contracts::{error::WardenResult, trace::Trace};

/// Write `trace` as pretty JSON to `path`, creating parent directories.
pub fn save_trace(path: &Path, trace: &Trace) -> WardenResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, trace.to_json_pretty()?)?;
    debug!(path = %path.display(), trace_id = %trace.trace_id, "trace saved");
    Ok(())
}

/// Load a trace previously written by `save_trace` (or any compatible producer).
pub fn load_trace(path: &Path) -> WardenResult<Trace> {
    let json = fs::read_to_string(path)?;
    Trace::from_json(&json)
}
