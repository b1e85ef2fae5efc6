pub use self::error::{Error, Result};

use std::{process::ExitCode, sync::Arc};

use crate::{
    pipeline::Pipeline,
    tools::{
        download::download_model,
        log::{log_error, log_info, LogServiceType},
        prediction::OnnxFaceDetector,
    },
};

mod domain;
mod error;
mod pipeline;
mod settings;
mod tools;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log_error(LogServiceType::Other, format!("Fatal: {}", error));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let settings = settings::initialize().await?;
    log_info(
        LogServiceType::Setup,
        format!("Input folder: {}", settings.input.to_string_lossy()),
    );
    log_info(
        LogServiceType::Setup,
        format!(
            "Output: {} ({}x{} at {} fps)",
            settings.output.to_string_lossy(),
            settings.width,
            settings.height,
            settings.fps
        ),
    );

    let model_path = settings.model_path().await?;
    if !model_path.exists() {
        match &settings.model_url {
            Some(url) => download_model(url, &model_path).await?,
            None => return Err(Error::ModelNotFound(model_path.to_string_lossy().to_string())),
        }
    }
    let detector = OnnxFaceDetector::load(&model_path)?;
    log_info(
        LogServiceType::Setup,
        format!("Landmark model ready: {}", model_path.to_string_lossy()),
    );

    let pipeline = Pipeline::new(Arc::new(settings), Arc::new(detector));
    let report = pipeline.run().await?;

    for (kind, count) in report.failure_counts() {
        log_info(LogServiceType::Other, format!("Dropped {} photo(s): {}", count, kind));
    }
    log_info(
        LogServiceType::Other,
        format!(
            "Done: {} of {} photos assembled into {}",
            report.assembled,
            report.discovered,
            report.output.to_string_lossy()
        ),
    );
    Ok(())
}
