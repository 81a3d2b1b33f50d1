//! OCI layer extraction utilities.
//!
//! Layers are tar streams, either gzip-compressed or plain. They are applied
//! bottom to top onto a target directory, honoring OCI whiteout markers.

use declcfg_core::error::{CatalogError, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const WHITEOUT_PREFIX: &str = ".wh.";
const OPAQUE_WHITEOUT: &str = ".wh..wh..opq";

/// Extract a single layer (tar or tar.gz) into `target_dir`.
pub fn extract_layer(layer_path: &Path, target_dir: &Path) -> Result<()> {
    if !layer_path.exists() {
        return Err(CatalogError::Other(format!(
            "Layer file not found: {}",
            layer_path.display()
        )));
    }

    std::fs::create_dir_all(target_dir).map_err(|e| {
        CatalogError::Other(format!(
            "Failed to create target directory {}: {}",
            target_dir.display(),
            e
        ))
    })?;

    let mut reader = BufReader::new(File::open(layer_path).map_err(|e| {
        CatalogError::Other(format!(
            "Failed to open layer file {}: {}",
            layer_path.display(),
            e
        ))
    })?);

    let mut magic = [0u8; 2];
    let read = read_prefix(&mut reader, &mut magic)?;
    let prefix = std::io::Cursor::new(magic[..read].to_vec());
    let stream = prefix.chain(reader);

    let applied = if read == 2 && magic == GZIP_MAGIC {
        apply_archive(Archive::new(GzDecoder::new(stream)), target_dir)
    } else {
        apply_archive(Archive::new(stream), target_dir)
    };
    applied.map_err(|e| {
        CatalogError::Other(format!(
            "Failed to extract layer {} to {}: {}",
            layer_path.display(),
            target_dir.display(),
            e
        ))
    })?;

    tracing::debug!(
        layer = %layer_path.display(),
        target = %target_dir.display(),
        "Extracted layer"
    );

    Ok(())
}

/// Extract `layers` in order (bottom to top) into `target_dir`.
pub fn extract_layers(layers: &[PathBuf], target_dir: &Path) -> Result<()> {
    for layer in layers {
        extract_layer(layer, target_dir)?;
    }
    Ok(())
}

fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn apply_archive<R: Read>(mut archive: Archive<R>, target_dir: &Path) -> std::io::Result<()> {
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        if !is_contained(&path) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("entry {} escapes the target directory", path.display()),
            ));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if file_name == OPAQUE_WHITEOUT || file_name.starts_with(WHITEOUT_PREFIX) {
            let parent = path.parent().unwrap_or_else(|| Path::new(""));
            let Some(dir) = resolve_dir(target_dir, parent)? else {
                tracing::debug!(
                    entry = %path.display(),
                    "Skipping whiteout outside a plain directory"
                );
                continue;
            };
            if file_name == OPAQUE_WHITEOUT {
                clear_dir(&dir)?;
            } else {
                let hidden = &file_name[WHITEOUT_PREFIX.len()..];
                if !matches!(hidden, "" | "." | "..") {
                    remove_path(&dir.join(hidden))?;
                }
            }
            continue;
        }

        entry.unpack_in(target_dir)?;
    }

    Ok(())
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Walk `relative` below `root` without following symlinks.
///
/// Returns `None` when a component is missing, is not a directory, or is a
/// symlink.
fn resolve_dir(root: &Path, relative: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut dir = root.to_path_buf();
    for component in relative.components() {
        let Component::Normal(name) = component else {
            continue;
        };
        dir.push(name);
        match std::fs::symlink_metadata(&dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        }
    }
    Ok(Some(dir))
}

fn clear_dir(dir: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        remove_path(&entry?.path())?;
    }
    Ok(())
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
