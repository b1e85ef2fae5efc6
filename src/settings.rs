use std::{env, path::PathBuf, time::Duration};

use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::fs::{create_dir_all, read_to_string};

use crate::error::{Error, Result};

const ENV_MODEL: &str = "FACELAPSE_MODEL";
const ENV_MODEL_URL: &str = "FACELAPSE_MODEL_URL";

pub const DEFAULT_MODEL_FILENAME: &str = "face_detector.onnx";

/// Everything the pipeline needs, composed once at startup and passed down
/// explicitly. Values come from the optional JSON settings file, overridden
/// by environment variables, overridden by command line flags.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Folder scanned (non recursively) for source photographs.
    pub input: PathBuf,
    /// Path of the animated GIF to produce.
    pub output: PathBuf,
    /// Cache folder for aligned, normalized frames.
    pub processed: PathBuf,
    /// Landmark model file (.onnx). Defaults to the local app folder.
    pub model: Option<PathBuf>,
    /// Where to fetch the model from when the file is absent.
    pub model_url: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Vertical position of the eye line, as a fraction of the height.
    pub eye_y_ratio: f32,
    /// Horizontal positions of the eye centers, as fractions of the width.
    pub eye_x_ratio_left: f32,
    pub eye_x_ratio_right: f32,
    pub fps: u16,
    /// GIF repeat count, 0 meaning loop forever.
    pub loop_count: u16,
    /// Reuse cached frames from previous runs.
    pub skip_existing: bool,
    /// Parallel image workers, 0 meaning one per available core.
    pub workers: usize,
    pub frame_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/input"),
            output: PathBuf::from("output/timelapse.gif"),
            processed: PathBuf::from("data/processed"),
            model: None,
            model_url: None,
            width: 1024,
            height: 1024,
            eye_y_ratio: 0.35,
            eye_x_ratio_left: 0.35,
            eye_x_ratio_right: 0.65,
            fps: 10,
            loop_count: 0,
            skip_existing: true,
            workers: 0,
            frame_timeout_secs: 120,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Folder holding the source photographs
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Path of the animated GIF to produce
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Cache folder for aligned frames
    #[arg(short, long)]
    processed: Option<PathBuf>,

    /// Landmark model file (.onnx)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// JSON settings file; flags given here win over its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    fps: Option<u16>,

    #[arg(long)]
    workers: Option<usize>,

    /// Recompute every frame even when a cached copy exists
    #[arg(short = 'f', long)]
    force: bool,
}

pub async fn initialize() -> Result<Settings> {
    let args = Args::parse();
    initialize_from(args).await
}

async fn initialize_from(args: Args) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => {
            let data = read_to_string(path).await?;
            let Ok(settings) = serde_json::from_str::<Settings>(&data) else {
                return Err(Error::MalformatedSettingsFile);
            };
            settings
        }
        None => Settings::default(),
    };
    apply_env(&mut settings);
    apply_args(&mut settings, &args);
    settings.validate()?;
    Ok(settings)
}

fn apply_env(settings: &mut Settings) {
    if let Ok(val) = env::var(ENV_MODEL) {
        settings.model = Some(PathBuf::from(val));
    }
    if let Ok(val) = env::var(ENV_MODEL_URL) {
        settings.model_url = Some(val);
    }
}

fn apply_args(settings: &mut Settings, args: &Args) {
    if let Some(input) = &args.input {
        settings.input = input.clone();
    }
    if let Some(output) = &args.output {
        settings.output = output.clone();
    }
    if let Some(processed) = &args.processed {
        settings.processed = processed.clone();
    }
    if let Some(model) = &args.model {
        settings.model = Some(model.clone());
    }
    if let Some(width) = args.width {
        settings.width = width;
    }
    if let Some(height) = args.height {
        settings.height = height;
    }
    if let Some(fps) = args.fps {
        settings.fps = fps;
    }
    if let Some(workers) = args.workers {
        settings.workers = workers;
    }
    if args.force {
        settings.skip_existing = false;
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidSettings("output size must be at least 1x1".to_string()));
        }
        if self.width > u16::MAX as u32 || self.height > u16::MAX as u32 {
            return Err(Error::InvalidSettings("GIF frames are limited to 65535px per side".to_string()));
        }
        if self.fps == 0 {
            return Err(Error::InvalidSettings("frame rate must be at least 1".to_string()));
        }
        if !(self.eye_y_ratio > 0.0 && self.eye_y_ratio < 1.0) {
            return Err(Error::InvalidSettings("eye line ratio must be strictly inside (0, 1)".to_string()));
        }
        if !(self.eye_x_ratio_left > 0.0
            && self.eye_x_ratio_left < self.eye_x_ratio_right
            && self.eye_x_ratio_right < 1.0)
        {
            return Err(Error::InvalidSettings(
                "eye column ratios must satisfy 0 < left < right < 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map(|c| c.get()).unwrap_or(1)
        }
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_secs(self.frame_timeout_secs.max(1))
    }

    /// Resolved model location: explicit setting, or the per-user app
    /// folder (created on demand).
    pub async fn model_path(&self) -> Result<PathBuf> {
        if let Some(model) = &self.model {
            return Ok(model.clone());
        }
        let Some(mut dir_path) = dirs::config_local_dir() else {
            return Err(Error::ModelNotFound("no local settings folder available".to_string()));
        };
        dir_path.push("facelapse");
        dir_path.push("models");
        create_dir_all(&dir_path).await?;
        dir_path.push(DEFAULT_MODEL_FILENAME);
        Ok(dir_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.width, 1024);
        assert_eq!(settings.eye_y_ratio, 0.35);
        assert_eq!(settings.fps, 10);
        assert!(settings.skip_existing);
    }

    #[test]
    fn test_args_override_defaults() {
        let args = Args::parse_from([
            "facelapse", "-i", "/photos", "-o", "/tmp/out.gif", "--fps", "12", "--force",
        ]);
        let mut settings = Settings::default();
        apply_args(&mut settings, &args);
        assert_eq!(settings.input, PathBuf::from("/photos"));
        assert_eq!(settings.output, PathBuf::from("/tmp/out.gif"));
        assert_eq!(settings.fps, 12);
        assert!(!settings.skip_existing);
    }

    #[test]
    fn test_validation_rejects_bad_ratios() {
        let mut settings = Settings::default();
        settings.eye_x_ratio_left = 0.7;
        settings.eye_x_ratio_right = 0.3;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.eye_y_ratio = 1.2;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.fps = 0;
        assert!(settings.validate().is_err());

        assert!(Settings::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_settings_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut on_disk = Settings::default();
        on_disk.fps = 24;
        on_disk.width = 512;
        std::fs::write(&path, serde_json::to_string(&on_disk).unwrap()).unwrap();

        let args = Args::parse_from([
            "facelapse",
            "-c",
            path.to_str().unwrap(),
            "--height",
            "256",
        ]);
        let settings = initialize_from(args).await.unwrap();
        assert_eq!(settings.fps, 24);
        assert_eq!(settings.width, 512);
        assert_eq!(settings.height, 256);
    }
}
