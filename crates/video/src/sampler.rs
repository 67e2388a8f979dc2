use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use ds_scheduler::{Handler, Tick};
use ds_types::{sequence_number, DecodedFrame};
use thiserror::Error;
use tracing::*;

use crate::FrameSlot;

#[derive(Error, Debug)]
pub enum SampleError {
    #[error("could not list decoded frames in {}", dir.display())]
    List {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What a single sampling tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sample {
    /// The decoder had not produced anything since the last tick.
    Empty,
    /// `path` was read and handed to the inference worker; all `observed`
    /// files were deleted.
    Dispatched { path: PathBuf, observed: usize },
    /// `path` was chosen but could not be read; all `observed` files were
    /// still deleted.
    Unreadable { path: PathBuf, observed: usize },
}

/// On every tick, picks the earliest decoded frame, hands it to the inference
/// worker through a [`FrameSlot`], and deletes every frame it saw so the
/// backlog never grows past one tick's worth.
pub struct FrameSampler {
    dir: PathBuf,
    slot: FrameSlot,
}

impl FrameSampler {
    pub fn new(dir: impl Into<PathBuf>, slot: FrameSlot) -> Self {
        Self {
            dir: dir.into(),
            slot,
        }
    }

    pub async fn sample(&self) -> Result<Sample, SampleError> {
        let frames = list_frames(&self.dir)
            .await
            .map_err(|source| SampleError::List {
                dir: self.dir.clone(),
                source,
            })?;

        Ok(self.take(frames).await)
    }

    /// Samples from a directory listing. Entries may have vanished since the
    /// listing was taken.
    async fn take(&self, frames: Vec<PathBuf>) -> Sample {
        let earliest = frames
            .iter()
            .min_by(|a, b| frame_order(a).cmp(&frame_order(b)));

        let chosen = match earliest {
            Some(chosen) => chosen.clone(),
            None => {
                trace!("no decoded frames");
                return Sample::Empty;
            }
        };

        // read before deleting, so the upload never races the cleanup below
        let data = tokio::fs::read(&chosen).await;

        for path in &frames {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!("failed to delete decoded frame {}: {err}", path.display()),
            }
        }

        let observed = frames.len();

        match data {
            Ok(data) => {
                debug!(
                    "sampled {} ({observed} frames observed)",
                    chosen.display()
                );

                if let Some(superseded) = self.slot.offer(DecodedFrame::new(&chosen, data)) {
                    debug!(
                        "inference still busy, dropping unprocessed frame {}",
                        superseded.path.display()
                    );
                }

                Sample::Dispatched {
                    path: chosen,
                    observed,
                }
            }
            Err(err) => {
                warn!("failed to read sampled frame {}: {err}", chosen.display());

                Sample::Unreadable {
                    path: chosen,
                    observed,
                }
            }
        }
    }
}

#[async_trait]
impl Handler<Tick> for FrameSampler {
    async fn handle(&mut self, _: Tick) -> anyhow::Result<()> {
        self.sample().await?;
        Ok(())
    }
}

async fn list_frames(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut frames = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            frames.push(entry.path());
        }
    }

    Ok(frames)
}

/// Orders frames by the sequence number in their name; names without one
/// come last, by name.
fn frame_order(path: &Path) -> (bool, Option<u64>, Option<&std::ffi::OsStr>) {
    let name = path.file_name();
    let sequence = name.and_then(|name| name.to_str()).and_then(sequence_number);

    (sequence.is_none(), sequence, name)
}

#[cfg(test)]
mod tests {
    use crate::WorkDir;

    use super::*;

    fn write_frames(dir: &WorkDir, names: &[&str]) {
        for name in names {
            std::fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }
    }

    fn remaining(dir: &WorkDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[tokio::test]
    async fn dispatches_one_frame_and_clears_the_rest() {
        let dir = WorkDir::create("ds-sampler").unwrap();
        let slot = FrameSlot::new();
        let sampler = FrameSampler::new(dir.path(), slot.clone());

        write_frames(&dir, &["output_0001.png", "output_0002.png", "output_0003.png"]);

        let sample = sampler.sample().await.unwrap();
        assert_eq!(
            sample,
            Sample::Dispatched {
                path: dir.path().join("output_0001.png"),
                observed: 3,
            }
        );
        assert_eq!(remaining(&dir), 0);

        let frame = slot.try_take().unwrap();
        assert_eq!(frame.sequence, Some(1));
        assert_eq!(&frame.data[..], b"output_0001.png");
        assert!(slot.try_take().is_none());
    }

    #[tokio::test]
    async fn empty_directory_is_a_no_op() {
        let dir = WorkDir::create("ds-sampler").unwrap();
        let slot = FrameSlot::new();
        let sampler = FrameSampler::new(dir.path(), slot.clone());

        assert_eq!(sampler.sample().await.unwrap(), Sample::Empty);
        assert!(slot.is_empty());
    }

    #[tokio::test]
    async fn picks_lowest_sequence_number_not_lowest_name() {
        let dir = WorkDir::create("ds-sampler").unwrap();
        let slot = FrameSlot::new();
        let sampler = FrameSampler::new(dir.path(), slot.clone());

        write_frames(&dir, &["output_10.png", "output_9.png", "snapshot.png"]);

        sampler.sample().await.unwrap();
        assert_eq!(slot.try_take().unwrap().sequence, Some(9));
        assert_eq!(remaining(&dir), 0);
    }

    #[tokio::test]
    async fn unnumbered_frames_are_still_sampled() {
        let dir = WorkDir::create("ds-sampler").unwrap();
        let slot = FrameSlot::new();
        let sampler = FrameSampler::new(dir.path(), slot.clone());

        write_frames(&dir, &["b.png", "a.png"]);

        sampler.sample().await.unwrap();
        assert_eq!(slot.try_take().unwrap().path, dir.path().join("a.png"));
    }

    #[tokio::test]
    async fn later_tick_supersedes_unprocessed_frame() {
        let dir = WorkDir::create("ds-sampler").unwrap();
        let slot = FrameSlot::new();
        let sampler = FrameSampler::new(dir.path(), slot.clone());

        write_frames(&dir, &["output_0001.png"]);
        sampler.sample().await.unwrap();
        write_frames(&dir, &["output_0002.png"]);
        sampler.sample().await.unwrap();

        assert_eq!(slot.try_take().unwrap().sequence, Some(2));
        assert!(slot.is_empty());
    }

    #[tokio::test]
    async fn subdirectories_are_left_alone() {
        let dir = WorkDir::create("ds-sampler").unwrap();
        let slot = FrameSlot::new();
        let sampler = FrameSampler::new(dir.path(), slot.clone());

        std::fs::create_dir(dir.path().join("nested")).unwrap();

        assert_eq!(sampler.sample().await.unwrap(), Sample::Empty);
        assert!(dir.path().join("nested").is_dir());
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = WorkDir::create("ds-sampler").unwrap();
        let sampler = FrameSampler::new(dir.path().join("gone"), FrameSlot::new());

        assert!(matches!(
            sampler.sample().await,
            Err(SampleError::List { .. })
        ));
    }

    #[tokio::test]
    async fn vanished_frame_is_skipped_and_directory_still_cleared() {
        let dir = WorkDir::create("ds-sampler").unwrap();
        let slot = FrameSlot::new();
        let sampler = FrameSampler::new(dir.path(), slot.clone());

        write_frames(&dir, &["output_0002.png", "output_0003.png"]);

        // listed, then removed before the sampler got to read it
        let listing = vec![
            dir.path().join("output_0001.png"),
            dir.path().join("output_0002.png"),
            dir.path().join("output_0003.png"),
        ];

        assert_eq!(
            sampler.take(listing).await,
            Sample::Unreadable {
                path: dir.path().join("output_0001.png"),
                observed: 3,
            }
        );
        assert_eq!(remaining(&dir), 0);
        assert!(slot.is_empty());
    }
}
