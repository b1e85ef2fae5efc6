use std::{fs::File, io::BufReader, path::{Path, PathBuf}};

use chrono::{TimeZone, Utc};

use crate::{
    domain::photo::SourcePhoto,
    error::{Error, Result},
    tools::{
        file_tools::{is_supported_image, modified_millis},
        image_tools::capture_datetime_millis,
        log::{log_info, LogServiceType},
    },
};

/// Non-recursive scan of the input folder. Entries are sorted by file name
/// before indexing so the discovery order, and with it every tie-break, is
/// reproducible across runs and platforms.
pub async fn scan_input(input: &Path) -> Result<Vec<SourcePhoto>> {
    let dir = input.to_path_buf();
    tokio::task::spawn_blocking(move || scan_dir(&dir))
        .await
        .map_err(|e| Error::WorkerPanic(e.to_string()))?
}

fn scan_dir(input: &Path) -> Result<Vec<SourcePhoto>> {
    let entries = std::fs::read_dir(input)
        .map_err(|_| Error::UnableToAccessInputFolder(input.to_string_lossy().to_string()))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && is_supported_image(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut photos = Vec::with_capacity(paths.len());
    for (order, path) in paths.into_iter().enumerate() {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        // Timestamps are read from the original file, best effort.
        let taken = File::open(&path)
            .ok()
            .and_then(|file| capture_datetime_millis(&mut BufReader::new(file)));
        let modified = modified_millis(&path);
        photos.push(SourcePhoto { path, name, taken, modified, order });
    }
    Ok(photos)
}

/// Total, stable chronological ordering over the scanned photos.
pub fn order_sequence(mut photos: Vec<SourcePhoto>) -> Vec<SourcePhoto> {
    photos.sort_by_key(|photo| photo.sort_key());
    photos
}

pub fn log_date_range(photos: &[SourcePhoto]) {
    if let (Some(first), Some(last)) = (photos.first(), photos.last()) {
        log_info(
            LogServiceType::Scan,
            format!(
                "Sequence covers {} to {}",
                format_millis(first.effective_millis()),
                format_millis(last.effective_millis())
            ),
        );
    }
}

fn format_millis(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis) {
        chrono::LocalResult::Single(date) => date.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => format!("{}ms", millis),
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

    use crate::tools::test_data;

    use super::*;

    fn photo(name: &str, taken: Option<i64>, modified: i64, order: usize) -> SourcePhoto {
        SourcePhoto {
            path: PathBuf::from(format!("/in/{}", name)),
            name: name.to_string(),
            taken,
            modified,
            order,
        }
    }

    #[test]
    fn test_order_is_total_and_stable() {
        let expected = vec![
            photo("e.jpg", Some(100), 900, 4),
            photo("c.jpg", Some(250), 100, 2),
            photo("d.jpg", Some(250), 100, 3),
            photo("a.jpg", None, 50, 0),
            photo("b.jpg", None, 700, 1),
        ];

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut shuffled = expected.clone();
            shuffled.shuffle(&mut rng);
            assert_eq!(order_sequence(shuffled), expected);
        }
    }

    #[test]
    fn test_fallback_sorts_after_every_timestamp() {
        // A very old modification time must not outrank a capture time.
        let ordered = order_sequence(vec![
            photo("old-mtime.jpg", None, 1, 0),
            photo("recent.jpg", Some(1_700_000_000_000), 2_000_000_000_000, 1),
        ]);
        assert_eq!(ordered[0].name, "recent.jpg");
    }

    #[tokio::test]
    async fn test_scan_lists_supported_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        test_data::write_png(&dir.path().join("c.png"), 8, 8, 1);
        test_data::write_png(&dir.path().join("a.png"), 8, 8, 2);
        std::fs::write(dir.path().join("notes.txt"), b"not a photo").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let photos = scan_input(dir.path()).await.unwrap();
        assert_eq!(photos.len(), 2);
        assert_eq!(photos[0].name, "a.png");
        assert_eq!(photos[0].order, 0);
        assert_eq!(photos[0].taken, None);
        assert!(photos[0].modified > 0);
        assert_eq!(photos[1].name, "c.png");
        assert_eq!(photos[1].order, 1);
    }

    #[tokio::test]
    async fn test_scan_reads_capture_datetime() {
        let dir = tempfile::tempdir().unwrap();
        let portrait = test_data::gradient_portrait(16, 16, 3);
        let jpeg = test_data::jpeg_with_datetime(&portrait, "2019:03:02 08:00:00");
        std::fs::write(dir.path().join("z.jpg"), jpeg).unwrap();
        test_data::write_png(&dir.path().join("a.png"), 8, 8, 4);

        let photos = order_sequence(scan_input(dir.path()).await.unwrap());
        // The timestamped photo leads even though its name sorts last.
        assert_eq!(photos[0].name, "z.jpg");
        assert_eq!(photos[0].taken, Some(1551513600000));
        assert_eq!(photos[1].name, "a.png");
        assert_eq!(photos[1].taken, None);
    }

    #[tokio::test]
    async fn test_scan_missing_folder() {
        let result = scan_input(Path::new("/definitely/not/here")).await;
        assert!(matches!(result, Err(Error::UnableToAccessInputFolder(_))));
    }
}
