//! Per-package config files.
//!
//! `<folder>/<package>.json` is a concatenation of pretty-printed JSON
//! documents: the `olm.package` record once, then one `olm.bundle` record
//! per added bundle. Each document is followed by a newline.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use declcfg_core::declcfg::{BundleRecord, PackageRecord};
use declcfg_core::error::{CatalogError, Result};
use serde::Serialize;

/// Indent of one nesting level.
const INDENT: &[u8] = b"   ";

/// Prefix of every line after the first.
const LINE_PREFIX: &str = " ";

/// Serialize `value` in the layout existing catalogs use.
///
/// Three-space indentation, a one-space prefix on every line but the first,
/// and `<`, `>`, `&` escaped as `\u003c`, `\u003e`, `\u0026`.
pub fn to_catalog_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;

    let text = String::from_utf8(buf)
        .map_err(|e| CatalogError::SerializationError(e.to_string()))?;

    // Strings never hold raw newlines, and the unicode escapes are valid
    // wherever these characters appear.
    Ok(text
        .replace('\n', &format!("\n{}", LINE_PREFIX))
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

/// Whether `package` can name a config file directly inside its folder.
pub(crate) fn is_plain_file_name(package: &str) -> bool {
    let mut components = Path::new(package).components();
    matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
        && !package.contains(&['/', '\\'][..])
}

/// Exclusive advisory lock held for the lifetime of the guard.
#[cfg(unix)]
struct FileLock<'a> {
    file: &'a File,
}

#[cfg(unix)]
impl<'a> FileLock<'a> {
    fn acquire(file: &'a File) -> std::io::Result<Self> {
        use std::os::unix::io::AsRawFd;

        // SAFETY: the descriptor is owned by `file`, which outlives the guard.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(Self { file })
    }
}

#[cfg(unix)]
impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;

        // SAFETY: see `acquire`.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

/// Writes synthesized records into per-package config files.
pub struct ConfigWriter;

impl ConfigWriter {
    /// Path of the config file for `package` under `folder`.
    pub fn config_path(folder: &Path, package: &str) -> PathBuf {
        folder.join(format!("{}.json", package))
    }

    /// Merge `bundle` into the config file of `package`.
    ///
    /// A new file gets the package record followed by the bundle record; an
    /// existing file only gets the bundle record appended. Returns the path
    /// written to.
    pub fn merge(folder: &Path, package: &PackageRecord, bundle: &BundleRecord) -> Result<PathBuf> {
        let path = Self::config_path(folder, &package.name);
        if !is_plain_file_name(&package.name) {
            return Err(CatalogError::write(
                &path,
                format!("package name {:?} is not a plain file name", package.name),
            ));
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CatalogError::write(&path, e))?;

        #[cfg(unix)]
        let _lock = FileLock::acquire(&file).map_err(|e| CatalogError::write(&path, e))?;

        // Checked under the lock so that only one writer emits the package.
        let is_new = file
            .metadata()
            .map_err(|e| CatalogError::write(&path, e))?
            .len()
            == 0;

        let mut out = String::new();
        if is_new {
            out.push_str(&to_catalog_json(package)?);
            out.push('\n');
        }
        out.push_str(&to_catalog_json(bundle)?);
        out.push('\n');

        let mut handle = &file;
        handle
            .write_all(out.as_bytes())
            .and_then(|_| handle.flush())
            .map_err(|e| CatalogError::write(&path, e))?;

        tracing::debug!(
            path = %path.display(),
            package = %package.name,
            bundle = %bundle.name,
            new_file = is_new,
            "Merged bundle into config"
        );
        Ok(path)
    }

    /// Parse a config file back into its JSON documents, in file order.
    pub fn read_documents(path: &Path) -> Result<Vec<serde_json::Value>> {
        let text = std::fs::read_to_string(path)?;
        let documents = serde_json::Deserializer::from_str(&text)
            .into_iter::<serde_json::Value>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(documents)
    }
}
