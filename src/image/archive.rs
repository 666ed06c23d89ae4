//! Image extraction from tar archives.
//!
//! Auto-detects `docker save` (manifest.json) vs OCI-layout (index.json)
//! archives, unpacks each layer in order into a temporary root filesystem,
//! applies whiteouts, and collects the config history.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use serde::Deserialize;
use tempfile::TempDir;

use super::Image;

// ---- Docker-format archive structs (manifest.json) ----

#[derive(Deserialize)]
struct DockerManifestEntry {
    #[serde(rename = "Config")]
    config: String,
    #[serde(rename = "Layers")]
    layers: Vec<String>,
}

// ---- OCI-layout archive structs (index.json) ----

#[derive(Deserialize)]
struct OciIndex {
    manifests: Vec<OciDescriptor>,
}

#[derive(Deserialize)]
struct OciDescriptor {
    digest: String,
}

#[derive(Deserialize)]
struct OciManifest {
    config: OciDescriptor,
    layers: Vec<OciDescriptor>,
}

// ---- Shared config struct (used by both formats) ----

#[derive(Deserialize)]
struct ImageConfig {
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

#[derive(Deserialize)]
struct HistoryEntry {
    created_by: Option<String>,
    #[serde(default)]
    empty_layer: bool,
}

#[derive(Debug)]
enum ArchiveFormat {
    Docker,
    Oci,
}

/// Extract the image in the archive at `path` into a fresh temp directory.
pub(crate) fn extract_image(path: &Path, source: &str) -> Result<Image> {
    let format = detect_format(path)?;
    let (layers, config) = match format {
        ArchiveFormat::Docker => read_docker_format(path)?,
        ArchiveFormat::Oci => read_oci_format(path)?,
    };

    let rootfs = TempDir::with_prefix("pare-").context("creating rootfs directory")?;
    for (i, layer) in layers.iter().enumerate() {
        apply_layer(rootfs.path(), layer)
            .with_context(|| format!("applying layer {} of {source}", i + 1))?;
    }

    // Empty layers (ENV, LABEL, ...) contribute no filesystem content;
    // only instructions that produced a layer count as history here.
    let history = config
        .history
        .iter()
        .filter(|entry| !entry.empty_layer)
        .filter_map(|entry| entry.created_by.as_deref())
        .map(|line| line.trim().to_string())
        .collect();

    Ok(Image::from_parts(source.to_string(), history, rootfs))
}

fn detect_format(path: &Path) -> Result<ArchiveFormat> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut archive = tar::Archive::new(file);

    for entry_result in archive.entries().context("reading tar entries")? {
        let entry = entry_result.context("reading tar entry")?;
        let entry_path = entry.path()?.to_string_lossy().to_string();
        if entry_path == "manifest.json" {
            return Ok(ArchiveFormat::Docker);
        }
        if entry_path == "index.json" {
            return Ok(ArchiveFormat::Oci);
        }
    }

    anyhow::bail!("unrecognized archive format: no manifest.json or index.json found")
}

/// Read a docker-save archive: layer blobs in manifest order plus the
/// parsed image config.
fn read_docker_format(path: &Path) -> Result<(Vec<Vec<u8>>, ImageConfig)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut archive = tar::Archive::new(file);

    let mut manifest_data: Option<Vec<DockerManifestEntry>> = None;
    let mut blobs: HashMap<String, Vec<u8>> = HashMap::new();

    for entry_result in archive.entries().context("reading tar entries")? {
        let mut entry = entry_result.context("reading tar entry")?;
        let entry_path = entry.path()?.to_string_lossy().to_string();

        if entry_path == "manifest.json" {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            manifest_data =
                Some(serde_json::from_str(&content).context("parsing manifest.json")?);
        } else if entry.header().entry_type().is_file() {
            // Layers can be <id>/layer.tar or blobs/sha256/<hash> (docker
            // v25+), and the config is a top-level .json; keep them all.
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            blobs.insert(entry_path, data);
        }
    }

    let manifest = manifest_data
        .context("manifest.json not found in archive")?
        .into_iter()
        .next()
        .context("empty manifest in archive")?;

    let config_data = blobs
        .get(&manifest.config)
        .with_context(|| format!("config {} not found in archive", manifest.config))?;
    let config: ImageConfig =
        serde_json::from_slice(config_data).context("parsing image config")?;

    let mut layers = Vec::with_capacity(manifest.layers.len());
    for layer_path in &manifest.layers {
        let data = blobs
            .remove(layer_path)
            .with_context(|| format!("layer {layer_path} not found in archive"))?;
        layers.push(data);
    }

    Ok((layers, config))
}

/// Read an OCI-layout archive: resolve index -> manifest -> config, then
/// collect the layer blobs in manifest order.
fn read_oci_format(path: &Path) -> Result<(Vec<Vec<u8>>, ImageConfig)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut archive = tar::Archive::new(file);

    let mut index_data: Option<Vec<u8>> = None;
    let mut blobs: HashMap<String, Vec<u8>> = HashMap::new();

    for entry_result in archive.entries().context("reading tar entries")? {
        let mut entry = entry_result.context("reading tar entry")?;
        let entry_path = entry.path()?.to_string_lossy().to_string();

        if entry_path == "index.json" {
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            index_data = Some(data);
        } else if let Some(hash) = entry_path.strip_prefix("blobs/sha256/") {
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            blobs.insert(format!("sha256:{hash}"), data);
        }
    }

    let index: OciIndex = serde_json::from_slice(
        index_data
            .as_ref()
            .context("index.json not found in OCI archive")?,
    )
    .context("parsing index.json")?;

    let manifest_desc = index.manifests.first().context("no manifests in index.json")?;
    let manifest: OciManifest = serde_json::from_slice(
        blobs
            .get(&manifest_desc.digest)
            .with_context(|| format!("manifest blob {} not found", manifest_desc.digest))?,
    )
    .context("parsing OCI manifest")?;

    let config: ImageConfig = serde_json::from_slice(
        blobs
            .get(&manifest.config.digest)
            .with_context(|| format!("config blob {} not found", manifest.config.digest))?,
    )
    .context("parsing OCI image config")?;

    let mut layers = Vec::with_capacity(manifest.layers.len());
    for descriptor in &manifest.layers {
        let data = blobs
            .remove(&descriptor.digest)
            .with_context(|| format!("layer blob {} not found", descriptor.digest))?;
        layers.push(data);
    }

    Ok((layers, config))
}

/// Unpack one layer tar (auto-detecting gzip) onto the rootfs, honoring
/// whiteout markers from the overlay format.
fn apply_layer(rootfs: &Path, data: &[u8]) -> Result<()> {
    let is_gzip = data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b;
    let cursor = Cursor::new(data);

    if is_gzip {
        unpack_layer_tar(rootfs, flate2::read::GzDecoder::new(cursor))
    } else {
        unpack_layer_tar(rootfs, cursor)
    }
}

fn unpack_layer_tar<R: Read>(rootfs: &Path, reader: R) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(false);

    for entry_result in archive.entries().context("reading layer entries")? {
        let mut entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                warn_entry("<unreadable>", &err.to_string());
                continue;
            }
        };

        let entry_path = match entry.path() {
            Ok(path) => path.to_path_buf(),
            Err(_) => continue,
        };
        let name = entry_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if let Some(target) = name.strip_prefix(".wh.") {
            apply_whiteout(rootfs, &entry_path, target);
            continue;
        }

        if let Err(err) = entry.unpack_in(rootfs) {
            warn_entry(&entry_path.display().to_string(), &err.to_string());
        }
    }

    Ok(())
}

/// Remove whatever a whiteout marker hides. `.wh..wh..opq` clears the
/// containing directory; `.wh.<name>` removes that sibling.
fn apply_whiteout(rootfs: &Path, marker: &Path, target: &str) {
    let parent = rootfs.join(marker.parent().unwrap_or(Path::new("")));

    if target == ".wh..opq" {
        let entries = match fs::read_dir(&parent) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let _ = remove_any(&entry.path());
        }
        return;
    }

    let _ = remove_any(&parent.join(target));
}

fn remove_any(path: &Path) -> std::io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) => Err(err),
    }
}

fn warn_entry(name: &str, reason: &str) {
    eprintln!("{} Skipping layer entry {name}: {reason}", "!".yellow().bold());
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn docker_archive(config: &str, layers: &[&[u8]]) -> tempfile::NamedTempFile {
        let layer_paths: Vec<String> = (0..layers.len())
            .map(|i| format!("layer{i}/layer.tar"))
            .collect();
        let manifest = format!(
            r#"[{{"Config":"cfg.json","Layers":[{}],"RepoTags":["test:latest"]}}]"#,
            layer_paths
                .iter()
                .map(|p| format!("\"{p}\""))
                .collect::<Vec<_>>()
                .join(",")
        );

        let mut files: Vec<(&str, &[u8])> = vec![
            ("manifest.json", manifest.as_bytes()),
            ("cfg.json", config.as_bytes()),
        ];
        for (path, data) in layer_paths.iter().zip(layers) {
            files.push((path.as_str(), *data));
        }

        let mut out = tempfile::Builder::new().suffix(".tar").tempfile().unwrap();
        out.write_all(&tar_bytes(&files)).unwrap();
        out.flush().unwrap();
        out
    }

    const CONFIG: &str = r#"{
        "architecture": "amd64",
        "history": [
            {"created_by": "ADD rootfs.tar /"},
            {"created_by": "RUN apt-get update"}
        ],
        "rootfs": {"diff_ids": ["sha256:aaa", "sha256:bbb"]}
    }"#;

    #[test]
    fn extracts_layers_and_applies_whiteouts() {
        let layer1 = tar_bytes(&[("etc/keep", b"keep"), ("etc/gone", b"bye")]);
        let layer2 = gzip(&tar_bytes(&[("etc/.wh.gone", b""), ("opt/new", b"new")]));
        let archive = docker_archive(CONFIG, &[&layer1, &layer2]);

        let image = extract_image(archive.path(), "test.tar").unwrap();

        assert_eq!(
            fs::read(image.root().join("etc/keep")).unwrap(),
            b"keep".to_vec()
        );
        assert_eq!(
            fs::read(image.root().join("opt/new")).unwrap(),
            b"new".to_vec()
        );
        assert!(!image.root().join("etc/gone").exists());
        assert_eq!(
            image.history,
            vec!["ADD rootfs.tar /".to_string(), "RUN apt-get update".to_string()]
        );
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let layer1 = tar_bytes(&[("etc/conf", b"old")]);
        let layer2 = tar_bytes(&[("etc/conf", b"new-contents")]);
        let archive = docker_archive(CONFIG, &[&layer1, &layer2]);

        let image = extract_image(archive.path(), "test.tar").unwrap();
        assert_eq!(
            fs::read(image.root().join("etc/conf")).unwrap(),
            b"new-contents".to_vec()
        );
    }

    #[test]
    fn opaque_whiteout_clears_the_directory() {
        let layer1 = tar_bytes(&[("data/a", b"a"), ("data/b", b"b")]);
        let layer2 = tar_bytes(&[("data/.wh..wh..opq", b""), ("data/c", b"c")]);
        let archive = docker_archive(CONFIG, &[&layer1, &layer2]);

        let image = extract_image(archive.path(), "test.tar").unwrap();
        assert!(!image.root().join("data/a").exists());
        assert!(!image.root().join("data/b").exists());
        assert_eq!(fs::read(image.root().join("data/c")).unwrap(), b"c".to_vec());
    }

    #[test]
    fn empty_layer_history_lines_are_filtered() {
        let config = r#"{
            "history": [
                {"created_by": "ADD rootfs.tar /"},
                {"created_by": "ENV PATH=/usr/bin", "empty_layer": true},
                {"empty_layer": false}
            ],
            "rootfs": {"diff_ids": ["sha256:aaa"]}
        }"#;
        let layer = tar_bytes(&[("etc/conf", b"data")]);
        let archive = docker_archive(config, &[&layer]);

        let image = extract_image(archive.path(), "test.tar").unwrap();
        assert_eq!(image.history, vec!["ADD rootfs.tar /".to_string()]);
    }

    #[test]
    fn unknown_format_is_an_error() {
        let mut out = tempfile::Builder::new().suffix(".tar").tempfile().unwrap();
        out.write_all(&tar_bytes(&[("random.txt", b"nope")])).unwrap();
        out.flush().unwrap();
        let err = extract_image(out.path(), "bad.tar").unwrap_err();
        assert!(err.to_string().contains("unrecognized archive format"));
    }
}
