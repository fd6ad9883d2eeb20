use crate::error::Result;
use rand::Rng;
use serde::Serialize;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Write `bytes` to `target` atomically: ensure the parent directory exists,
/// write to a uniquely-named temp file beside it, then rename over `target`.
/// On any error the temp file is unlinked so no partial artifact is left
/// behind.
///
/// The temp name includes a timestamp, the process id, and a random suffix
/// so concurrent writers from the same process never collide.
pub async fn atomic_write(target: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path_for(target);
    let result: Result<()> = async {
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, target).await?;
        Ok(())
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

/// Serialize `value` as pretty-printed, trailing-newline-terminated JSON and
/// write it atomically.
pub async fn atomic_write_json_pretty<T: Serialize>(target: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    atomic_write(target, json.as_bytes()).await
}

fn temp_path_for(target: &Path) -> std::path::PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let pid = std::process::id();
    let rand_suffix: u64 = rand::thread_rng().gen();
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "artifact".to_string());
    let tmp_name = format!("{file_name}.tmp.{timestamp}.{pid}.{rand_suffix:x}");
    target
        .parent()
        .map(|p| p.join(&tmp_name))
        .unwrap_or_else(|| std::path::PathBuf::from(tmp_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[tokio::test]
    async fn writes_and_renames_into_place() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("artifact.json");
        atomic_write(&target, b"hello").await.unwrap();

        let content = tokio::fs::read_to_string(&target).await.unwrap();
        assert_eq!(content, "hello");

        // No leftover temp files.
        let mut entries = tokio::fs::read_dir(target.parent().unwrap())
            .await
            .unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["artifact.json".to_string()]);
    }

    #[tokio::test]
    async fn json_round_trips_with_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("config.json");
        let sample = Sample { value: 42 };
        atomic_write_json_pretty(&target, &sample).await.unwrap();

        let content = tokio::fs::read_to_string(&target).await.unwrap();
        assert!(content.ends_with('\n'));
        let parsed: Sample = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, sample);
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_collide_on_temp_name() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("shared.json");

        let mut handles = Vec::new();
        for i in 0..8 {
            let target = target.clone();
            handles.push(tokio::spawn(async move {
                atomic_write(&target, format!("{i}").as_bytes())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // One of the writers won; the file exists and has valid content.
        let content = tokio::fs::read_to_string(&target).await.unwrap();
        assert!(content.parse::<u32>().is_ok());
    }
}
