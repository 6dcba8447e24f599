//! # Loader Module
//!
//! Lists and decodes the images in a directory.
//!
//! Only the directory itself is scanned (no recursion), entries are taken
//! in byte-order of their file names, and non-image files are filtered by
//! extension. An image that fails to decode is recorded and skipped; the
//! load as a whole only fails when the directory cannot be read at all.

use crate::error::LoadError;
use crate::events::{Event, EventSender, LoadEvent};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File extensions treated as images (matched case-insensitively)
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// A decoded image together with the file name it came from
pub struct LoadedImage {
    /// File name (not the full path); used as the image's identity in
    /// reports
    pub name: String,
    pub image: DynamicImage,
}

/// The result of loading a directory
#[derive(Default)]
pub struct LoadOutcome {
    /// Decoded images in file-name order
    pub images: Vec<LoadedImage>,
    /// Per-file failures that were skipped
    pub errors: Vec<LoadError>,
}

/// Filters directory entries down to likely image files.
pub struct ImageFilter;

impl ImageFilter {
    pub fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let lower = ext.to_ascii_lowercase();
                IMAGE_EXTENSIONS.contains(&lower.as_str())
            })
            .unwrap_or(false)
    }
}

/// Loads images from a single directory.
pub struct DirectorySource;

impl DirectorySource {
    /// Load every image file directly inside `dir`.
    ///
    /// Returns [`LoadError::DirectoryNotFound`] when the directory does not
    /// exist; decode failures are collected per file instead.
    pub fn load(dir: &Path, events: &EventSender) -> Result<LoadOutcome, LoadError> {
        if !dir.is_dir() {
            return Err(LoadError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }

        events.send(Event::Load(LoadEvent::Started {
            path: dir.to_path_buf(),
        }));

        let mut outcome = LoadOutcome::default();

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| LoadError::ReadDirectory {
                path: dir.to_path_buf(),
                source: e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            })?;

            let path = entry.path();
            if !entry.file_type().is_file() || !ImageFilter::is_image(path) {
                continue;
            }

            match image::open(path) {
                Ok(image) => {
                    debug!(path = %path.display(), "loaded image");
                    events.send(Event::Load(LoadEvent::ImageLoaded {
                        path: path.to_path_buf(),
                    }));
                    outcome.images.push(LoadedImage {
                        name: file_name(path),
                        image,
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping undecodable image");
                    events.send(Event::Load(LoadEvent::Error {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    }));
                    outcome.errors.push(LoadError::Decode {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        events.send(Event::Load(LoadEvent::Completed {
            total_images: outcome.images.len(),
        }));

        Ok(outcome)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::null_sender;
    use image::{GrayImage, Luma};
    use std::fs;

    fn write_png(dir: &Path, name: &str, value: u8) {
        let image = GrayImage::from_pixel(16, 16, Luma([value]));
        image.save(dir.join(name)).unwrap();
    }

    #[test]
    fn loads_images_in_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 10);
        write_png(dir.path(), "a.png", 20);
        write_png(dir.path(), "c.png", 30);

        let outcome = DirectorySource::load(dir.path(), &null_sender()).unwrap();
        let names: Vec<&str> = outcome.images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["a.png", "b.png", "c.png"]);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let result = DirectorySource::load(&missing, &null_sender());
        assert!(matches!(
            result,
            Err(LoadError::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn non_image_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "photo.png", 10);
        fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
        fs::write(dir.path().join("noext"), [0u8; 8]).unwrap();

        let outcome = DirectorySource::load(dir.path(), &null_sender()).unwrap();
        assert_eq!(outcome.images.len(), 1);
        assert_eq!(outcome.images[0].name, "photo.png");
    }

    #[test]
    fn corrupt_image_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "good.png", 10);
        fs::write(dir.path().join("bad.png"), b"definitely not a png").unwrap();

        let outcome = DirectorySource::load(dir.path(), &null_sender()).unwrap();
        assert_eq!(outcome.images.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(outcome.errors[0], LoadError::Decode { .. }));
    }

    #[test]
    fn subdirectories_are_not_descended_into() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "top.png", 10);
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        write_png(&nested, "deep.png", 20);

        let outcome = DirectorySource::load(dir.path(), &null_sender()).unwrap();
        assert_eq!(outcome.images.len(), 1);
        assert_eq!(outcome.images[0].name, "top.png");
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "SHOUTY.PNG", 10);

        let outcome = DirectorySource::load(dir.path(), &null_sender()).unwrap();
        assert_eq!(outcome.images.len(), 1);
    }

    #[test]
    fn load_events_are_emitted() {
        use crate::events::EventChannel;

        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "one.png", 10);

        let (sender, receiver) = EventChannel::new();
        DirectorySource::load(dir.path(), &sender).unwrap();
        drop(sender);

        let events: Vec<Event> = receiver.iter().collect();
        assert!(matches!(events.first(), Some(Event::Load(LoadEvent::Started { .. }))));
        assert!(matches!(
            events.last(),
            Some(Event::Load(LoadEvent::Completed { total_images: 1 }))
        ));
    }
}
