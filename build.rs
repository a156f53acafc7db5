//! Bakes the cluster tool directory into the binary when one is given at
//! build time. Without it the runtime falls back to `/usr/sbin`.

use std::env;
use std::path::{Path, PathBuf};

const SBIN_DIR_VAR: &str = "CIBTEMPLATE_SBIN_DIR";

fn main() {
    println!("cargo:rerun-if-env-changed={SBIN_DIR_VAR}");
    if let Some(dir) = sbin_dir_from_env() {
        println!("cargo:rustc-env=CIBTEMPLATE_SBIN_HINT={}", dir.display());
    }
}

/// The configured directory, resolved through symlinks when it exists.
/// Unset or blank values are ignored.
fn sbin_dir_from_env() -> Option<PathBuf> {
    let raw = env::var_os(SBIN_DIR_VAR)?;
    let dir = Path::new(&raw);
    if dir.as_os_str().is_empty() {
        return None;
    }
    Some(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()))
}
