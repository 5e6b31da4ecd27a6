//! Parsing and lookup for the server's export table.
//!
//! Grounded in unfs3's `Config/exports` handling (`exports_opts`,
//! `export_point()`, `get_squash_ids()`): each entry names a path this
//! server makes available to MOUNT/NFS clients, together with a handful of
//! export-wide options. Unlike unfs3's line-oriented `/etc/exports`
//! grammar, entries are expressed as TOML, matching the configuration
//! style the rest of this crate's ambient stack already uses.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Deserialize;

/// A single exported directory and its export-wide options.
#[derive(Debug, Clone, Deserialize)]
pub struct Export {
    /// Path on the local filesystem this export serves, and the path
    /// clients name in MOUNT requests.
    pub path: PathBuf,
    /// Corresponds to unfs3's `OPT_REMOVABLE`: when the backing directory
    /// is absent, READDIR/READDIRPLUS on this export's root return an
    /// empty, EOF'd directory instead of an error.
    #[serde(default)]
    pub removable: bool,
    /// Anonymous uid applied when the caller's credentials are squashed.
    #[serde(default = "default_squash_id")]
    pub squash_uid: u32,
    /// Anonymous gid applied when the caller's credentials are squashed.
    #[serde(default = "default_squash_id")]
    pub squash_gid: u32,
}

fn default_squash_id() -> u32 {
    65534
}

#[derive(Debug, Default, Deserialize)]
struct ExportsFile {
    #[serde(rename = "export", default)]
    exports: Vec<Export>,
}

/// The server's live export table.
///
/// Entries can be replaced wholesale via [`ExportTable::reload`], which is
/// how SIGHUP-triggered export reloads become visible to subsequent
/// MNT/EXPORT/DUMP calls without restarting the server.
pub struct ExportTable {
    exports: RwLock<Vec<Export>>,
}

impl ExportTable {
    /// Parses an exports file from disk.
    pub fn parse(path: &Path) -> anyhow::Result<Self> {
        let exports = Self::load(path)?;
        Ok(Self { exports: RwLock::new(exports) })
    }

    /// An empty export table, useful for tests and embedding scenarios
    /// that configure exports programmatically instead of via a file.
    pub fn empty() -> Self {
        Self { exports: RwLock::new(Vec::new()) }
    }

    fn load(path: &Path) -> anyhow::Result<Vec<Export>> {
        let text = fs::read_to_string(path)?;
        let parsed: ExportsFile = toml::from_str(&text)?;
        Ok(parsed.exports)
    }

    /// Re-reads the exports file in place. On parse failure the existing
    /// table is left untouched and the error is returned to the caller
    /// (the SIGHUP handler logs it and continues running).
    pub fn reload(&self, path: &Path) -> anyhow::Result<()> {
        let exports = Self::load(path)?;
        *self.exports.write().expect("exports lock poisoned") = exports;
        Ok(())
    }

    /// Finds the export whose path is a prefix of `requested`, returning
    /// the export and the path relative to its root (empty for the export
    /// root itself).
    pub fn resolve(&self, requested: &str) -> Option<(Export, String)> {
        let requested = requested.trim_end_matches('/');
        let exports = self.exports.read().expect("exports lock poisoned");
        exports.iter().find_map(|export| {
            let export_path = export.path.to_string_lossy();
            let export_path = export_path.trim_end_matches('/');
            if requested == export_path {
                Some((export.clone(), String::new()))
            } else if let Some(rest) = requested.strip_prefix(export_path) {
                rest.strip_prefix('/').map(|rest| (export.clone(), rest.to_string()))
            } else {
                None
            }
        })
    }

    /// Returns the export rooted exactly at `path`, if any.
    pub fn by_path(&self, path: &Path) -> Option<Export> {
        let exports = self.exports.read().expect("exports lock poisoned");
        exports.iter().find(|e| e.path == path).cloned()
    }

    /// All currently configured exports, for EXPORT/DUMP.
    pub fn all(&self) -> Vec<Export> {
        self.exports.read().expect("exports lock poisoned").clone()
    }
}
