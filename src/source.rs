// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Input source handling for posture analysis.
//!
//! A [`Source`] is either a still image, a video file, or a directory of
//! frame images that is analyzed like a video. [`SourceIterator`] yields the
//! decoded frames in order; a frame that fails to decode is yielded as an
//! `Err` so the analyzer can count it and move on.

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::{PostureError, Result};

/// Extensions treated as still images.
const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff", "tif"];

/// Extensions treated as video containers.
const VIDEO_EXTENSIONS: [&str; 10] = [
    "mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v", "mpeg", "mpg",
];

/// Consecutive decode failures after which a video is considered exhausted.
#[cfg(feature = "video")]
const MAX_CONSECUTIVE_DECODE_ERRORS: usize = 32;

/// Represents the input sources posture analysis accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Path to an image file.
    Image(PathBuf),
    /// Path to a video file.
    Video(PathBuf),
    /// Directory whose images are frames of one clip, in file name order.
    Directory(PathBuf),
}

impl Source {
    /// Check if this source is a single image.
    #[must_use]
    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    /// Check if this source yields a sequence of frames.
    #[must_use]
    pub const fn is_video(&self) -> bool {
        matches!(self, Self::Video(_) | Self::Directory(_))
    }

    /// Path of the source.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Image(p) | Self::Video(p) | Self::Directory(p) => p,
        }
    }
}

/// Convert from a string path to Source.
impl From<&str> for Source {
    fn from(s: &str) -> Self {
        let path = PathBuf::from(s);

        if path.is_dir() {
            return Self::Directory(path);
        }

        if let Some(ext) = path.extension() {
            let ext = ext.to_string_lossy().to_lowercase();
            if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
                return Self::Video(path);
            }
        }

        // Default to image
        Self::Image(path)
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Self::from(path.to_string_lossy().as_ref())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::from(path.as_path())
    }
}

/// Check if a path is an image file based on extension.
fn is_image_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        IMAGE_EXTENSIONS.contains(&ext.as_str())
    })
}

/// Collect image paths from a directory, sorted by file name.
fn collect_images_from_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PostureError::VideoOpen(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| PostureError::VideoOpen(format!("{}: {e}", dir.display())))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_image_file(path))
        .collect();

    paths.sort();
    Ok(paths)
}

/// Load an image file.
///
/// # Errors
///
/// Returns [`PostureError::ImageDecode`] if the file cannot be read or decoded.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| {
        PostureError::ImageDecode(format!("Failed to load {}: {e}", path.display()))
    })
}

/// Decode an in-memory encoded image (JPEG, PNG, ...).
///
/// # Errors
///
/// Returns [`PostureError::ImageDecode`] if the bytes are not a supported image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| PostureError::ImageDecode(e.to_string()))
}

/// Iterator over the frames of a source.
///
/// The underlying decoder is owned by the iterator and released when it is
/// dropped, whichever way the analysis ends.
pub enum SourceIterator {
    /// Frames read from image files.
    Images(std::vec::IntoIter<PathBuf>),
    /// Frames decoded from a video container.
    #[cfg(feature = "video")]
    Video(VideoFrames),
}

impl SourceIterator {
    /// Open a source for frame iteration.
    ///
    /// # Errors
    ///
    /// Returns [`PostureError::VideoOpen`] if a video or frame directory
    /// cannot be opened, and [`PostureError::FeatureNotEnabled`] for video
    /// files when the `video` feature is off.
    pub fn open(source: &Source) -> Result<Self> {
        match source {
            Source::Image(path) => Ok(Self::Images(vec![path.clone()].into_iter())),
            Source::Directory(dir) => Ok(Self::Images(collect_images_from_dir(dir)?.into_iter())),
            Source::Video(path) => Self::open_video(path),
        }
    }

    #[cfg(feature = "video")]
    fn open_video(path: &Path) -> Result<Self> {
        let frames = VideoFrames::open(path)?;
        crate::verbose!("Video {} at {:.2} fps", path.display(), frames.frame_rate());
        Ok(Self::Video(frames))
    }

    #[cfg(not(feature = "video"))]
    fn open_video(path: &Path) -> Result<Self> {
        Err(PostureError::FeatureNotEnabled(format!(
            "Video support requires the 'video' feature ({})",
            path.display()
        )))
    }
}

impl Iterator for SourceIterator {
    type Item = Result<DynamicImage>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Images(paths) => paths.next().map(|path| load_image(&path)),
            #[cfg(feature = "video")]
            Self::Video(frames) => frames.next(),
        }
    }
}

#[cfg(feature = "video")]
static INIT: std::sync::Once = std::sync::Once::new();

/// Initialize `video-rs` once per process and silence `FFmpeg` logging.
#[cfg(feature = "video")]
fn init_video() {
    INIT.call_once(|| {
        if let Err(e) = video_rs::init() {
            crate::warn!("Failed to initialize video-rs: {e}");
        }
    });
}

/// Frame-by-frame decoder for a video file.
#[cfg(feature = "video")]
pub struct VideoFrames {
    decoder: video_rs::decode::Decoder,
    consecutive_errors: usize,
}

#[cfg(feature = "video")]
impl VideoFrames {
    /// Open a video file.
    ///
    /// # Errors
    ///
    /// Returns [`PostureError::VideoOpen`] if the file is missing or no
    /// decoder can be created for it.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PostureError::VideoOpen(format!(
                "File not found: {}",
                path.display()
            )));
        }

        init_video();
        let decoder = video_rs::decode::Decoder::new(path)
            .map_err(|e| PostureError::VideoOpen(format!("{}: {e}", path.display())))?;

        Ok(Self {
            decoder,
            consecutive_errors: 0,
        })
    }

    /// Frame rate reported by the container.
    #[must_use]
    pub fn frame_rate(&self) -> f32 {
        self.decoder.frame_rate()
    }
}

#[cfg(feature = "video")]
impl Iterator for VideoFrames {
    type Item = Result<DynamicImage>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.decoder.decode() {
            Ok((_ts, frame)) => {
                self.consecutive_errors = 0;
                Some(video_frame_to_image(&frame))
            }
            Err(video_rs::Error::ReadExhausted | video_rs::Error::DecodeExhausted) => None,
            Err(e) => {
                self.consecutive_errors += 1;
                if self.consecutive_errors > MAX_CONSECUTIVE_DECODE_ERRORS {
                    crate::warn!("Stopping after {MAX_CONSECUTIVE_DECODE_ERRORS} consecutive decode errors");
                    return None;
                }
                Some(Err(PostureError::ImageDecode(format!(
                    "Failed to decode video frame: {e}"
                ))))
            }
        }
    }
}

/// Convert a `video_rs` HWC RGB frame to `DynamicImage`.
#[cfg(feature = "video")]
fn video_frame_to_image(arr: &video_rs::Frame) -> Result<DynamicImage> {
    let shape = arr.shape();
    let height = u32::try_from(shape[0])
        .map_err(|_| PostureError::ImageDecode("Frame height exceeds u32::MAX".to_string()))?;
    let width = u32::try_from(shape[1])
        .map_err(|_| PostureError::ImageDecode("Frame width exceeds u32::MAX".to_string()))?;

    let rgb_data: Vec<u8> = arr.iter().copied().collect();

    let img_buffer = image::RgbImage::from_raw(width, height, rgb_data).ok_or_else(|| {
        PostureError::ImageDecode("Failed to create image from video frame".to_string())
    })?;

    Ok(DynamicImage::ImageRgb8(img_buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_string() {
        assert!(matches!(Source::from("image.jpg"), Source::Image(_)));
        assert!(matches!(Source::from("clip.MP4"), Source::Video(_)));
        assert!(matches!(Source::from("squat.webm"), Source::Video(_)));
        assert!(matches!(Source::from("no_extension"), Source::Image(_)));
    }

    #[test]
    fn test_source_checks() {
        let img = Source::Image(PathBuf::from("test.jpg"));
        assert!(img.is_image());
        assert!(!img.is_video());

        let vid = Source::Video(PathBuf::from("test.mp4"));
        assert!(!vid.is_image());
        assert!(vid.is_video());
        assert_eq!(vid.path(), Path::new("test.mp4"));

        let dir = Source::Directory(PathBuf::from("./frames"));
        assert!(dir.is_video());
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a/b/frame_001.PNG")));
        assert!(!is_image_file(Path::new("notes.txt")));
    }

    #[test]
    fn test_missing_directory_is_open_error() {
        let source = Source::Directory(PathBuf::from("/definitely/not/here"));
        assert!(matches!(
            SourceIterator::open(&source),
            Err(PostureError::VideoOpen(_))
        ));
    }

    #[test]
    fn test_decode_image_rejects_garbage() {
        assert!(matches!(
            decode_image(b"not an image"),
            Err(PostureError::ImageDecode(_))
        ));
    }

    #[test]
    fn test_missing_image_yields_decode_error() {
        let source = Source::Image(PathBuf::from("/definitely/not/here.png"));
        let mut frames = SourceIterator::open(&source).unwrap();
        assert!(matches!(frames.next(), Some(Err(PostureError::ImageDecode(_)))));
        assert!(frames.next().is_none());
    }

    #[cfg(not(feature = "video"))]
    #[test]
    fn test_video_requires_feature() {
        let source = Source::Video(PathBuf::from("clip.mp4"));
        assert!(matches!(
            SourceIterator::open(&source),
            Err(PostureError::FeatureNotEnabled(_))
        ));
    }

    #[cfg(feature = "video")]
    #[test]
    fn test_missing_video_is_open_error() {
        let source = Source::Video(PathBuf::from("/definitely/not/here.mp4"));
        assert!(matches!(
            SourceIterator::open(&source),
            Err(PostureError::VideoOpen(_))
        ));
    }
}
