use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::Context;
use tracing::*;

static SEQUENCE: AtomicUsize = AtomicUsize::new(0);

/// A uniquely named directory under the system temp directory, removed with
/// everything in it when dropped.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    pub fn create(prefix: &str) -> anyhow::Result<Self> {
        let name = format!(
            "{prefix}-{}-{}-{}",
            chrono::Local::now().format("%FT%H-%M-%S"),
            std::process::id(),
            SEQUENCE.fetch_add(1, Ordering::Relaxed),
        );

        let path = std::env::temp_dir().join(name);

        std::fs::create_dir_all(&path)
            .with_context(|| format!("could not create working directory {}", path.display()))?;

        debug!("created working directory {}", path.display());

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_dir_all(&self.path) {
            warn!(
                "failed to remove working directory {}: {err}",
                self.path.display()
            );
        }
    }
}
