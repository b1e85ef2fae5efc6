use std::{path::{Path, PathBuf}, time::{SystemTime, UNIX_EPOCH}};

use lazy_static::lazy_static;
use nanoid::nanoid;

lazy_static! {
    static ref SUPPORTED_EXTENSIONS: Vec<&'static str> =
        vec!["jpg", "jpeg", "png", "webp", "bmp", "tif", "tiff", "gif"];
}

/// True for files the decoder can ingest, by extension backed by a mime
/// sanity check.
pub fn is_supported_image(path: &Path) -> bool {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match extension {
        Some(extension) if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) => {
            mime_guess::from_path(path)
                .first()
                .map(|mime| mime.type_() == mime_guess::mime::IMAGE)
                .unwrap_or(false)
        }
        _ => false,
    }
}

/// Hidden unique temp name in the same directory as `target`, so the final
/// rename stays on one filesystem.
pub fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    target.with_file_name(format!(".{}.{}.tmp", name, nanoid!()))
}

/// Write-to-temp then rename. The target either keeps its previous content
/// or holds the full new content, never a truncated mix.
pub fn atomic_write(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp = temp_sibling(target);
    std::fs::write(&temp, bytes)?;
    match std::fs::rename(&temp, target) {
        Ok(()) => Ok(()),
        Err(error) => {
            let _ = std::fs::remove_file(&temp);
            Err(error)
        }
    }
}

pub fn system_time_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as i64,
        Err(_) => 0,
    }
}

pub fn modified_millis(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(system_time_millis)
        .unwrap_or(0)
}
