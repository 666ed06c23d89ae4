pub mod archive;

use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;

/// A fully materialized image: the root filesystem extracted to a
/// temporary directory, plus the config metadata the analyzers need.
/// The extracted tree is removed when the image is dropped.
#[derive(Debug)]
pub struct Image {
    /// The reference the user asked for (archive path).
    pub source: String,
    /// `created_by` line of each non-empty-layer config history entry,
    /// in order.
    pub history: Vec<String>,
    rootfs: TempDir,
}

impl Image {
    /// Load an image from a `docker save` or OCI-layout tar archive.
    pub fn load(source: &str) -> Result<Image> {
        if !looks_like_archive(source) {
            anyhow::bail!(
                "{source} is not a tar archive; export the image first (e.g. `docker save -o image.tar {source}`)"
            );
        }
        archive::extract_image(Path::new(source), source)
    }

    /// Root of the extracted filesystem.
    pub fn root(&self) -> &Path {
        self.rootfs.path()
    }

    pub(crate) fn from_parts(source: String, history: Vec<String>, rootfs: TempDir) -> Image {
        Image {
            source,
            history,
            rootfs,
        }
    }
}

/// Whether an image reference points at a tar archive on disk.
pub fn looks_like_archive(image: &str) -> bool {
    let path = Path::new(image);
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("tar" | "gz" | "tgz")
    ) || image.ends_with(".tar.gz")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_detection() {
        assert!(looks_like_archive("image.tar"));
        assert!(looks_like_archive("image.tar.gz"));
        assert!(looks_like_archive("dir/image.tgz"));
        assert!(!looks_like_archive("ubuntu:latest"));
        assert!(!looks_like_archive("registry:5000/foo"));
    }
}
