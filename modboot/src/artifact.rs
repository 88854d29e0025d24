//! Module artifact resolution and loading.
//!
//! Artifact locations are resolved relative to the loader's base directory
//! (the directory holding the configuration file) unless absolute.

use crate::error::InstantiationError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Raw bytes of a binary module together with where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleArtifact {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl ModuleArtifact {
    /// Wrap bytes already in memory. `path` is only used for reporting.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    /// Resolve `location` against `base_dir` and read the artifact.
    ///
    /// # Errors
    ///
    /// - `InstantiationError::ArtifactNotFound` if the file does not exist
    /// - `InstantiationError::ArtifactRead` for any other IO failure
    pub async fn load(base_dir: &Path, location: &Path) -> Result<Self, InstantiationError> {
        let path = resolve_path(base_dir, location);
        debug!("Loading module artifact from {}", path.display());

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("Read {} bytes from {}", bytes.len(), path.display());
                Ok(Self { path, bytes })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(InstantiationError::ArtifactNotFound { path })
            }
            Err(source) => Err(InstantiationError::ArtifactRead { path, source }),
        }
    }

    /// Resolved location of the artifact.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Module bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size of the module in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the artifact holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Resolve a possibly relative path against a base directory.
pub fn resolve_path(base_dir: &Path, location: &Path) -> PathBuf {
    if location.is_absolute() {
        location.to_path_buf()
    } else {
        base_dir.join(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolve_relative_and_absolute() {
        let base = Path::new("/opt/app");
        assert_eq!(
            resolve_path(base, Path::new("pkg/app_bg.wasm")),
            PathBuf::from("/opt/app/pkg/app_bg.wasm")
        );
        assert_eq!(
            resolve_path(base, Path::new("/srv/app.wasm")),
            PathBuf::from("/srv/app.wasm")
        );
    }

    #[tokio::test]
    async fn load_reads_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("mod.wasm")).unwrap();
        file.write_all(b"\0asm\x01\0\0\0").unwrap();

        let artifact = ModuleArtifact::load(dir.path(), Path::new("mod.wasm"))
            .await
            .unwrap();
        assert_eq!(artifact.len(), 8);
        assert_eq!(artifact.path(), dir.path().join("mod.wasm"));
    }

    #[tokio::test]
    async fn load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = ModuleArtifact::load(dir.path(), Path::new("missing.wasm")).await;
        assert!(matches!(
            result,
            Err(InstantiationError::ArtifactNotFound { .. })
        ));
    }
}
