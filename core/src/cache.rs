use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{BuildError, BuildResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    path: PathBuf,
    modified: SystemTime,
    len: u64,
}

impl Artifact {
    pub fn load(path: &Path) -> BuildResult<Self> {
        let metadata = std::fs::metadata(path).map_err(|source| BuildError::ArtifactLoad {
            path: path.to_path_buf(),
            source,
        })?;

        if !metadata.is_file() || metadata.len() == 0 {
            return Err(BuildError::ArtifactLoad {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, "artifact is empty"),
            });
        }

        let modified = metadata
            .modified()
            .map_err(|source| BuildError::ArtifactLoad {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            modified,
            len: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh(Artifact),
    MissingArtifact,
    MissingSource,
    OlderThanSource,
    SourceChanged,
}

impl CacheStatus {
    pub fn is_fresh(&self) -> bool {
        matches!(self, CacheStatus::Fresh(_))
    }
}

// An artifact is reusable when it is at least as new as its source and
// the source on disk still holds `expected_source`.
pub fn check(source: &Path, artifact: &Path, expected_source: &str) -> CacheStatus {
    let Some(artifact_time) = mtime(artifact) else {
        return CacheStatus::MissingArtifact;
    };
    let Some(source_time) = mtime(source) else {
        return CacheStatus::MissingSource;
    };

    if artifact_time < source_time {
        return CacheStatus::OlderThanSource;
    }

    match std::fs::read_to_string(source) {
        Ok(on_disk) if on_disk == expected_source => {}
        _ => return CacheStatus::SourceChanged,
    }

    match Artifact::load(artifact) {
        Ok(loaded) => CacheStatus::Fresh(loaded),
        Err(_) => CacheStatus::MissingArtifact,
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_newer_artifact_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("ztmpa.tex");
        let artifact = dir.path().join("ztmpa.pdf");
        std::fs::write(&source, "body").unwrap();
        std::fs::write(&artifact, "%PDF").unwrap();

        let now = SystemTime::now();
        set_mtime(&source, now - Duration::from_secs(60));
        set_mtime(&artifact, now);

        let status = check(&source, &artifact, "body");
        assert!(status.is_fresh());
        if let CacheStatus::Fresh(loaded) = status {
            assert_eq!(loaded.len(), 4);
        }
    }

    #[test]
    fn test_equal_mtime_counts_as_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.tex");
        let artifact = dir.path().join("a.pdf");
        std::fs::write(&source, "body").unwrap();
        std::fs::write(&artifact, "%PDF").unwrap();

        let now = SystemTime::now();
        set_mtime(&source, now);
        set_mtime(&artifact, now);

        assert!(check(&source, &artifact, "body").is_fresh());
    }

    #[test]
    fn test_older_artifact_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.tex");
        let artifact = dir.path().join("a.pdf");
        std::fs::write(&source, "body").unwrap();
        std::fs::write(&artifact, "%PDF").unwrap();

        let now = SystemTime::now();
        set_mtime(&artifact, now - Duration::from_secs(60));
        set_mtime(&source, now);

        assert_eq!(check(&source, &artifact, "body"), CacheStatus::OlderThanSource);
    }

    #[test]
    fn test_missing_files_and_changed_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.tex");
        let artifact = dir.path().join("a.pdf");

        assert_eq!(check(&source, &artifact, "body"), CacheStatus::MissingArtifact);

        std::fs::write(&artifact, "%PDF").unwrap();
        assert_eq!(check(&source, &artifact, "body"), CacheStatus::MissingSource);

        std::fs::write(&source, "old body").unwrap();
        let now = SystemTime::now();
        set_mtime(&source, now - Duration::from_secs(60));
        set_mtime(&artifact, now);
        assert_eq!(check(&source, &artifact, "body"), CacheStatus::SourceChanged);
    }

    #[test]
    fn test_load_rejects_empty_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("a.pdf");
        std::fs::write(&artifact, "").unwrap();

        assert!(matches!(
            Artifact::load(&artifact),
            Err(BuildError::ArtifactLoad { .. })
        ));
    }
}
