use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use recap_core::{Timeline, TimelineFormat};
use tokio::fs;
use tracing::{debug, info};

/// A file written to a `.tmp` sibling of its destination and moved into
/// place by [`commit`](Self::commit)
#[derive(Debug)]
pub struct PendingWrite {
    temp_path: PathBuf,
    path: PathBuf,
}

impl PendingWrite {
    pub async fn stage(path: &Path, bytes: &[u8]) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        debug!("Staged {} bytes for {}", bytes.len(), path.display());

        Ok(Self {
            temp_path,
            path: path.to_path_buf(),
        })
    }

    pub async fn commit(self) -> Result<()> {
        if let Err(e) = fs::rename(&self.temp_path, &self.path).await {
            let _ = fs::remove_file(&self.temp_path).await;
            return Err(e).with_context(|| format!("Failed to move output into {}", self.path.display()));
        }
        Ok(())
    }

    pub async fn discard(self) {
        let _ = fs::remove_file(&self.temp_path).await;
    }
}

/// Commit every staged file, in order
pub async fn commit_all(pending: Vec<PendingWrite>) -> Result<()> {
    for write in pending {
        write.commit().await?;
    }
    Ok(())
}

pub async fn discard_all(pending: Vec<PendingWrite>) {
    for write in pending {
        write.discard().await;
    }
}

/// Validate and serialize a timeline into a [`PendingWrite`]
pub async fn stage_timeline(timeline: &Timeline, path: &Path, format: TimelineFormat) -> Result<PendingWrite> {
    timeline.validate()?;
    let json = timeline.to_json(format)?;
    PendingWrite::stage(path, json.as_bytes()).await
}

/// Write a timeline so readers see either the previous file or the new one
pub async fn save_timeline(timeline: &Timeline, path: &Path, format: TimelineFormat) -> Result<()> {
    stage_timeline(timeline, path, format).await?.commit().await?;
    info!("💾 Saved {:?} timeline to {}", format, path.display());
    Ok(())
}

pub async fn load_timeline(path: &Path) -> Result<Timeline> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read timeline {}", path.display()))?;
    let timeline = Timeline::from_json(&content).with_context(|| format!("Failed to parse timeline {}", path.display()))?;
    Ok(timeline)
}
