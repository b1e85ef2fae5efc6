pub mod aligner;
pub mod assembler;
pub mod normalizer;
pub mod sorter;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use image::RgbImage;
use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet, time::timeout};
use tokio_util::sync::CancellationToken;

use crate::{
    domain::photo::SourcePhoto,
    error::{Error, Result},
    settings::Settings,
    tools::{
        file_tools::atomic_write,
        image_tools::{decode_image, frame_to_webp, webp_to_frame},
        log::{log_info, log_warn, LogServiceType},
        prediction::{select_primary_face, FaceDetector, MIN_FACE_CONFIDENCE},
    },
};

use self::{
    aligner::{align_face, TargetGeometry},
    assembler::{assemble_gif, AssembleOptions},
    normalizer::{normalize_frame, ClaheParams},
};

/// Why one photograph dropped out of the sequence. None of these abort the
/// run on their own; `Crashed` is the exception, reported by the scheduler
/// as a fatal worker panic once every in-flight image has settled.
#[derive(Debug, Clone, Serialize, strum_macros::AsRefStr)]
#[serde(tag = "type", content = "data")]
pub enum FrameFailure {
    Unreadable(String),
    Detector(String),
    NoFace,
    LowConfidence,
    DegenerateLandmarks,
    Timeout,
    Cache(String),
    Cancelled,
    Crashed(String),
}

impl core::fmt::Display for FrameFailure {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

enum FrameOutcome {
    Ready { frame: RgbImage, cached: bool },
    Failed(FrameFailure),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub discovered: usize,
    pub assembled: usize,
    pub from_cache: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<(String, FrameFailure)>,
    pub output: PathBuf,
    pub output_bytes: u64,
}

impl PipelineReport {
    /// Failure tallies per kind, in order of first appearance.
    pub fn failure_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for (_, failure) in &self.failures {
            let kind = failure.as_ref().to_string();
            match counts.iter_mut().find(|(name, _)| *name == kind) {
                Some((_, count)) => *count += 1,
                None => counts.push((kind, 1)),
            }
        }
        counts
    }
}

pub struct Pipeline {
    settings: Arc<Settings>,
    detector: Arc<dyn FaceDetector>,
}

impl Pipeline {
    pub fn new(settings: Arc<Settings>, detector: Arc<dyn FaceDetector>) -> Self {
        Self { settings, detector }
    }

    /// Runs the whole chain: scan and order the input folder, turn every
    /// photograph into a canonical frame (in parallel, cache-aware), then
    /// assemble the surviving frames into the animated GIF.
    pub async fn run(&self) -> Result<PipelineReport> {
        let photos = sorter::scan_input(&self.settings.input).await?;
        if photos.is_empty() {
            return Err(Error::NoInputImages(self.settings.input.to_string_lossy().to_string()));
        }
        let photos = sorter::order_sequence(photos);
        log_info(LogServiceType::Scan, format!("{} photos queued", photos.len()));
        sorter::log_date_range(&photos);

        tokio::fs::create_dir_all(&self.settings.processed).await?;

        let outcomes = self.process_all(&photos).await?;

        let mut frames: Vec<RgbImage> = Vec::new();
        let mut from_cache = 0;
        let mut failures: Vec<(String, FrameFailure)> = Vec::new();
        for (photo, outcome) in photos.iter().zip(outcomes) {
            match outcome {
                FrameOutcome::Ready { frame, cached } => {
                    if cached {
                        from_cache += 1;
                    }
                    log_info(
                        LogServiceType::Frame,
                        format!("{}: frame ready{}", photo.name, if cached { " (cached)" } else { "" }),
                    );
                    frames.push(frame);
                }
                FrameOutcome::Failed(failure) => {
                    log_warn(LogServiceType::Frame, format!("{}: dropped ({})", photo.name, failure));
                    failures.push((photo.name.clone(), failure));
                }
            }
        }

        if frames.is_empty() {
            return Err(Error::EmptySequence);
        }
        let assembled = frames.len();

        log_info(
            LogServiceType::Assemble,
            format!("Encoding {} frames at {} fps", assembled, self.settings.fps),
        );
        let options = AssembleOptions::from_settings(&self.settings);
        let output = self.settings.output.clone();
        let output_bytes = tokio::task::spawn_blocking(move || assemble_gif(frames, &options, &output))
            .await
            .map_err(|e| Error::WorkerPanic(e.to_string()))??;
        log_info(
            LogServiceType::Assemble,
            format!(
                "Wrote {} ({:.2} MB)",
                self.settings.output.to_string_lossy(),
                output_bytes as f64 / (1024.0 * 1024.0)
            ),
        );

        Ok(PipelineReport {
            discovered: photos.len(),
            assembled,
            from_cache,
            failures,
            output: self.settings.output.clone(),
            output_bytes,
        })
    }

    /// Fans the photos out over a bounded worker pool. Results come back
    /// indexed so the sequence order never depends on completion order. A
    /// panicking worker cancels the token; queued tasks then stand down
    /// before touching their image.
    async fn process_all(&self, photos: &[SourcePhoto]) -> Result<Vec<FrameOutcome>> {
        let worker_count = self.settings.worker_count();
        log_info(
            LogServiceType::Frame,
            format!("Processing {} photos with {} workers", photos.len(), worker_count),
        );
        let semaphore = Arc::new(Semaphore::new(worker_count));
        let cancel = CancellationToken::new();
        let frame_timeout = self.settings.frame_timeout();

        let mut tasks: JoinSet<(usize, FrameOutcome)> = JoinSet::new();
        for (index, photo) in photos.iter().enumerate() {
            let settings = self.settings.clone();
            let detector = self.detector.clone();
            let photo = photo.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let permit = tokio::select! {
                    _ = cancel.cancelled() => {
                        return (index, FrameOutcome::Failed(FrameFailure::Cancelled))
                    }
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return (index, FrameOutcome::Failed(FrameFailure::Cancelled)),
                    },
                };
                if cancel.is_cancelled() {
                    return (index, FrameOutcome::Failed(FrameFailure::Cancelled));
                }
                let work = tokio::task::spawn_blocking(move || {
                    process_photo(&settings, detector.as_ref(), &photo)
                });
                let outcome = match timeout(frame_timeout, work).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(join_error)) => {
                        cancel.cancel();
                        FrameOutcome::Failed(FrameFailure::Crashed(join_error.to_string()))
                    }
                    // An elapsed timeout abandons the blocking thread, it
                    // cannot be interrupted. The permit is released while
                    // the thread runs on, so one wedged image can push the
                    // pool past the bound and hold up runtime shutdown.
                    Err(_) => FrameOutcome::Failed(FrameFailure::Timeout),
                };
                drop(permit);
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<FrameOutcome>> = photos.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = joined.map_err(|e| Error::WorkerPanic(e.to_string()))?;
            slots[index] = Some(outcome);
        }

        let mut outcomes = Vec::with_capacity(slots.len());
        for slot in slots {
            let outcome = slot.unwrap_or(FrameOutcome::Failed(FrameFailure::Cancelled));
            if let FrameOutcome::Failed(FrameFailure::Crashed(message)) = &outcome {
                return Err(Error::WorkerPanic(message.clone()));
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

/// Blocking per-photo stage chain: read, cache lookup, decode, detect,
/// align, normalize, persist. Every step folds its own problems into a
/// `FrameFailure` so one bad photograph never takes the run down.
fn process_photo(settings: &Settings, detector: &dyn FaceDetector, photo: &SourcePhoto) -> FrameOutcome {
    let bytes = match std::fs::read(&photo.path) {
        Ok(bytes) => bytes,
        Err(error) => return FrameOutcome::Failed(FrameFailure::Unreadable(error.to_string())),
    };
    let params = ClaheParams::default();
    let key = cache_key(&bytes, settings, &params);
    let cache_path = settings.processed.join(format!("{}.webp", key));

    if settings.skip_existing {
        if let Some(frame) = load_cached_frame(&cache_path, settings.width, settings.height) {
            return FrameOutcome::Ready { frame, cached: true };
        }
    }

    let image = match decode_image(&bytes) {
        Ok(image) => image.into_rgb8(),
        Err(error) => return FrameOutcome::Failed(FrameFailure::Unreadable(error.to_string())),
    };

    let faces = match detector.detect_faces(&image) {
        Ok(faces) => faces,
        Err(error) => return FrameOutcome::Failed(FrameFailure::Detector(error.to_string())),
    };
    if faces.is_empty() {
        return FrameOutcome::Failed(FrameFailure::NoFace);
    }
    let usable: Vec<_> = faces
        .into_iter()
        .filter(|face| face.confidence >= MIN_FACE_CONFIDENCE)
        .collect();
    let Some(primary) = select_primary_face(&usable) else {
        return FrameOutcome::Failed(FrameFailure::LowConfidence);
    };

    let target = TargetGeometry::from_settings(settings);
    let Some(aligned) = align_face(&image, &primary.landmarks, &target) else {
        return FrameOutcome::Failed(FrameFailure::DegenerateLandmarks);
    };
    let frame = normalize_frame(&aligned, &params);

    match store_cached_frame(&cache_path, &frame) {
        Ok(()) => FrameOutcome::Ready { frame, cached: false },
        Err(failure) => FrameOutcome::Failed(failure),
    }
}

/// Cache name for a photo: the source bytes hashed together with every
/// setting the cached pixels depend on. A geometry or equalization change
/// gets fresh keys instead of resurrecting frames computed under the old
/// parameters; unchanged sources and settings keep their keys across runs.
fn cache_key(bytes: &[u8], settings: &Settings, params: &ClaheParams) -> String {
    sha256::digest(format!(
        "{}:{}x{}:{}:{}:{}:{}:{}",
        sha256::digest(bytes),
        settings.width,
        settings.height,
        settings.eye_y_ratio,
        settings.eye_x_ratio_left,
        settings.eye_x_ratio_right,
        params.clip_limit,
        params.tile_grid,
    ))
}

/// A cached frame is only reused when it decodes and still matches the
/// configured canonical size; anything else counts as a miss.
fn load_cached_frame(path: &Path, width: u32, height: u32) -> Option<RgbImage> {
    let bytes = std::fs::read(path).ok()?;
    let frame = webp_to_frame(&bytes).ok()?;
    if frame.dimensions() == (width, height) {
        Some(frame)
    } else {
        None
    }
}

fn store_cached_frame(path: &Path, frame: &RgbImage) -> core::result::Result<(), FrameFailure> {
    let encoded = frame_to_webp(frame).map_err(|e| FrameFailure::Cache(e.to_string()))?;
    atomic_write(path, &encoded).map_err(|e| FrameFailure::Cache(e.to_string()))
}
