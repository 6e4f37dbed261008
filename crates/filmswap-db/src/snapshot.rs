use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;
use tracing::info;

use crate::Database;

/// Writes point-in-time copies of the database into a backup directory.
///
/// Uses `VACUUM INTO`, so the copy is consistent even while WAL is enabled.
pub struct SqliteBackup {
    dir: PathBuf,
}

impl SqliteBackup {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating backup directory {}", dir.display()))?;
        info!("Backup directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Copy the database to `<dir>/<timestamp>.sqlite` and return the path.
    pub fn write(&self, db: &Database) -> Result<PathBuf> {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
        let path = self.dir.join(format!("{stamp}.sqlite"));
        let target = path
            .to_str()
            .ok_or_else(|| anyhow!("Backup path is not valid UTF-8: {}", path.display()))?
            .to_string();

        db.with_conn(|conn| -> Result<()> {
            conn.execute("VACUUM INTO ?1", [&target])?;
            Ok(())
        })?;

        info!("Wrote database snapshot to {}", path.display());
        Ok(path)
    }
}
