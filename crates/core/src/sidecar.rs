//! Reading and writing the `metadata.json` sidecar.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the sidecar file inside an output folder.
pub const METADATA_FILE: &str = "metadata.json";

/// Create `folder` (and parents) if it does not exist yet.
pub fn ensure_folder(folder: &Path) -> Result<()> {
    if !folder.exists() {
        log::debug!("Creating output folder {}", folder.display());
        fs::create_dir_all(folder)?;
    }
    Ok(())
}

/// Path of the sidecar file for an output folder.
pub fn metadata_path(folder: &Path) -> PathBuf {
    folder.join(METADATA_FILE)
}

/// Write `metadata` as pretty JSON (4-space indent) into `folder`.
pub fn save_metadata<T: Serialize>(metadata: &T, folder: &Path) -> Result<PathBuf> {
    ensure_folder(folder)?;

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    metadata.serialize(&mut ser)?;

    let path = metadata_path(folder);
    fs::write(&path, buf)?;
    log::debug!("Wrote sidecar {}", path.display());
    Ok(path)
}

/// Load the sidecar stored in `folder`.
pub fn load_metadata<T: DeserializeOwned>(folder: &Path) -> Result<T> {
    let path = metadata_path(folder);
    if !path.is_file() {
        return Err(Error::MissingInput(format!(
            "no {} in {}",
            METADATA_FILE,
            folder.display()
        )));
    }
    let content = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Resolve an image path recorded in a sidecar.
///
/// Sidecars store paths as they were written at extraction time, which may be
/// relative to a different working directory. When the recorded path does
/// not exist, the file name is looked up inside the sidecar folder instead.
pub fn resolve_asset(folder: &Path, recorded: &str) -> Result<PathBuf> {
    let direct = PathBuf::from(recorded);
    if direct.is_file() {
        return Ok(direct);
    }
    if let Some(name) = direct.file_name() {
        let local = folder.join(name);
        if local.is_file() {
            return Ok(local);
        }
    }
    Err(Error::MissingInput(format!("image not found: {}", recorded)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocxMetadata, Paragraph, Run};

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("nested").join("out");

        let mut meta = DocxMetadata::default();
        meta.paragraphs
            .push(Paragraph::from_runs(Some(1), vec![Run::new("Hello")]));

        let path = save_metadata(&meta, &folder).unwrap();
        assert!(path.ends_with(METADATA_FILE));

        let loaded: DocxMetadata = load_metadata(&folder).unwrap();
        assert_eq!(loaded, meta);
    }

    #[test]
    fn test_sidecar_uses_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        save_metadata(&DocxMetadata::default(), dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join(METADATA_FILE)).unwrap();
        assert!(text.contains("\n    \"paragraphs\""));
    }

    #[test]
    fn test_load_missing_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_metadata::<DocxMetadata>(dir.path()).unwrap_err();
        assert!(matches!(err, Error::MissingInput(_)));
    }

    #[test]
    fn test_resolve_asset_falls_back_to_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("image_1.png"), b"png").unwrap();

        let found = resolve_asset(dir.path(), "somewhere/else/image_1.png").unwrap();
        assert_eq!(found, dir.path().join("image_1.png"));
        assert!(resolve_asset(dir.path(), "missing.png").is_err());
    }
}
