//! Temporary configuration files

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An env file in its own temporary directory, removed on drop
pub struct EnvFixture {
    dir: TempDir,
    path: PathBuf,
}

impl EnvFixture {
    /// Write `KEY=value` lines for `vars`
    pub fn new(vars: &[(&str, &str)]) -> std::io::Result<Self> {
        let contents: String = vars.iter().map(|(k, v)| format!("{k}={v}\n")).collect();
        Self::with_contents(&contents)
    }

    pub fn with_contents(contents: &str) -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(".env");
        std::fs::write(&path, contents)?;
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the file, for placing artifacts next to it
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}
