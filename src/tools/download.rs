use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::{error::{Error, Result}, tools::{file_tools::temp_sibling, log::{log_info, LogServiceType}}};

/// One-shot fetch of the landmark model: streamed to a hidden temp file,
/// renamed into place on success so a failed download leaves nothing behind.
pub async fn download_model(url: &str, target: &Path) -> Result<()> {
    log_info(LogServiceType::Setup, format!("Downloading landmark model from {}", url));
    let temp = temp_sibling(target);
    if let Err(error) = fetch_to_file(url, &temp).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(error);
    }
    if let Err(error) = tokio::fs::rename(&temp, target).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(error.into());
    }
    log_info(LogServiceType::Setup, format!("Landmark model saved to {:?}", target));
    Ok(())
}

async fn fetch_to_file(url: &str, path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut response = reqwest::get(url)
        .await?
        .error_for_status()
        .map_err(|e| Error::ModelDownloadFailed(e.to_string()))?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}
