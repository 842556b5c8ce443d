use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use image::RgbImage;
use log::{info, warn};

/// Hands copies of the in-progress image to background writer threads.
/// Each capture owns its copy, so writers never race the placement loop;
/// `finish` (also run on drop) waits for every outstanding writer.
pub struct SnapshotWriter {
    dir: PathBuf,
    next: usize,
    workers: Vec<JoinHandle<()>>,
}

impl SnapshotWriter {
    pub fn create(dir: &Path) -> Result<SnapshotWriter> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating snapshot directory {}", dir.display()))?;
        Ok(SnapshotWriter { dir: dir.to_path_buf(), next: 0, workers: Vec::new() })
    }

    pub fn capture(&mut self, image: &RgbImage) {
        let path = self.dir.join(format!("snapshot-{}.png", self.next));
        self.next += 1;

        let copy = image.clone();
        self.workers.push(thread::spawn(move || match copy.save(&path) {
            Ok(()) => info!("snapshot saved: {}", path.display()),
            Err(err) => warn!("snapshot write failed: {}: {err}", path.display()),
        }));
    }

    /// Snapshots handed out so far.
    pub fn captured(&self) -> usize {
        self.next
    }

    pub fn finish(&mut self) {
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("snapshot worker panicked");
            }
        }
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        self.finish();
    }
}
