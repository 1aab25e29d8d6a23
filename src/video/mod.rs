//! Video frame readers and writers.
//!
//! Two backends, selected from the path:
//! - `stub://WxH/N`: synthetic frames for tests (`N` defaults to 30, and a
//!   bare `stub://name` is 640x480). Writers to `stub://` only count frames.
//! - anything else: FFmpeg decode/encode, behind the `video-ffmpeg` feature.

use anyhow::Result;
use image::{Rgb, RgbImage};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

#[cfg(feature = "video-ffmpeg")]
mod ffmpeg;

#[cfg(feature = "video-ffmpeg")]
use self::ffmpeg::{FfmpegReader, FfmpegWriter};
use crate::{AnnotationError, Resolution};

const STUB_SCHEME: &str = "stub://";
const DEFAULT_STUB_FRAMES: u64 = 30;
const DEFAULT_STUB_RESOLUTION: Resolution = Resolution {
    width: 640,
    height: 480,
};

fn stub_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^stub://(\d+)x(\d+)(?:/(\d+))?$").unwrap())
}

pub fn is_stub_path(path: &str) -> bool {
    path.starts_with(STUB_SCHEME)
}

// -------------------- Reader --------------------

/// Sequential RGB frame source.
pub struct VideoReader {
    backend: ReaderBackend,
    frames_read: u64,
}

enum ReaderBackend {
    Synthetic(SyntheticReader),
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(FfmpegReader),
}

impl VideoReader {
    pub fn open(path: &str) -> Result<Self> {
        if path.trim().is_empty() {
            return Err(AnnotationError::frame_extraction("video path is empty").into());
        }
        let backend = if is_stub_path(path) {
            ReaderBackend::Synthetic(SyntheticReader::parse(path)?)
        } else {
            Self::open_file(path)?
        };
        log::info!("opened video {}", path);
        Ok(Self {
            backend,
            frames_read: 0,
        })
    }

    #[cfg(feature = "video-ffmpeg")]
    fn open_file(path: &str) -> Result<ReaderBackend> {
        if !Path::new(path).is_file() {
            return Err(
                AnnotationError::frame_extraction(format!("video file not found: {}", path)).into(),
            );
        }
        Ok(ReaderBackend::Ffmpeg(FfmpegReader::open(path)?))
    }

    #[cfg(not(feature = "video-ffmpeg"))]
    fn open_file(path: &str) -> Result<ReaderBackend> {
        Err(AnnotationError::frame_extraction(format!(
            "cannot decode {}: video decoding requires the video-ffmpeg feature",
            path
        ))
        .into())
    }

    pub fn resolution(&self) -> Resolution {
        match &self.backend {
            ReaderBackend::Synthetic(reader) => reader.resolution,
            #[cfg(feature = "video-ffmpeg")]
            ReaderBackend::Ffmpeg(reader) => reader.resolution(),
        }
    }

    /// Next decoded frame, or `None` at end of stream.
    pub fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let frame = match &mut self.backend {
            ReaderBackend::Synthetic(reader) => reader.next_frame(),
            #[cfg(feature = "video-ffmpeg")]
            ReaderBackend::Ffmpeg(reader) => reader.next_frame()?,
        };
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Read forward to the zero-indexed frame `target` and return it.
    pub fn seek_frame(&mut self, target: u64) -> Result<RgbImage> {
        if target < self.frames_read {
            return Err(AnnotationError::frame_extraction(format!(
                "frame {} already consumed ({} frames read)",
                target, self.frames_read
            ))
            .into());
        }
        loop {
            let index = self.frames_read;
            match self.next_frame()? {
                Some(frame) if index == target => return Ok(frame),
                Some(_) => continue,
                None => {
                    return Err(AnnotationError::frame_extraction(format!(
                        "frame {} is past the end of the video ({} frames)",
                        target, self.frames_read
                    ))
                    .into())
                }
            }
        }
    }
}

struct SyntheticReader {
    resolution: Resolution,
    total_frames: u64,
    produced: u64,
}

impl SyntheticReader {
    fn parse(path: &str) -> Result<Self> {
        let (resolution, total_frames) = match stub_regex().captures(path) {
            Some(caps) => {
                let dim = |i: usize| -> Result<u32> {
                    caps[i].parse().map_err(|_| {
                        AnnotationError::frame_extraction(format!("invalid stub size in {}", path))
                            .into()
                    })
                };
                let frames = match caps.get(3) {
                    Some(m) => m.as_str().parse().map_err(|_| {
                        AnnotationError::frame_extraction(format!(
                            "invalid stub frame count in {}",
                            path
                        ))
                    })?,
                    None => DEFAULT_STUB_FRAMES,
                };
                (Resolution::new(dim(1)?, dim(2)?), frames)
            }
            None => (DEFAULT_STUB_RESOLUTION, DEFAULT_STUB_FRAMES),
        };
        if resolution.width == 0 || resolution.height == 0 {
            return Err(AnnotationError::frame_extraction(format!(
                "stub video {} has an empty frame size",
                path
            ))
            .into());
        }
        Ok(Self {
            resolution,
            total_frames,
            produced: 0,
        })
    }

    fn next_frame(&mut self) -> Option<RgbImage> {
        if self.produced >= self.total_frames {
            return None;
        }
        let shift = self.produced;
        self.produced += 1;
        Some(RgbImage::from_fn(
            self.resolution.width,
            self.resolution.height,
            |x, y| {
                let v = ((x as u64 + y as u64 + shift) % 64) as u8;
                Rgb([v, v, v])
            },
        ))
    }
}

// -------------------- Writer --------------------

/// Sequential RGB frame sink.
pub struct VideoWriter {
    backend: WriterBackend,
    resolution: Resolution,
    frames_written: u64,
}

enum WriterBackend {
    Counting,
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(FfmpegWriter),
}

impl VideoWriter {
    /// Encoder for `path` at a fixed size and frame rate.
    pub fn create(path: &str, resolution: Resolution, fps: u32) -> Result<Self> {
        if fps == 0 {
            return Err(AnnotationError::invalid_config("fps must be greater than zero").into());
        }
        if is_stub_path(path) {
            return Ok(Self::counting(resolution));
        }
        let backend = Self::create_file(path, resolution, fps)?;
        log::info!("writing {} at {} fps ({})", path, fps, resolution);
        Ok(Self {
            backend,
            resolution,
            frames_written: 0,
        })
    }

    /// Writer that checks and counts frames without encoding them.
    pub fn counting(resolution: Resolution) -> Self {
        Self {
            backend: WriterBackend::Counting,
            resolution,
            frames_written: 0,
        }
    }

    #[cfg(feature = "video-ffmpeg")]
    fn create_file(path: &str, resolution: Resolution, fps: u32) -> Result<WriterBackend> {
        Ok(WriterBackend::Ffmpeg(FfmpegWriter::create(
            Path::new(path),
            resolution,
            fps,
        )?))
    }

    #[cfg(not(feature = "video-ffmpeg"))]
    fn create_file(path: &str, _resolution: Resolution, _fps: u32) -> Result<WriterBackend> {
        Err(AnnotationError::io(format!(
            "cannot encode {}: video encoding requires the video-ffmpeg feature",
            Path::new(path).display()
        ))
        .into())
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let (width, height) = frame.dimensions();
        if width != self.resolution.width || height != self.resolution.height {
            return Err(AnnotationError::io(format!(
                "frame is {}x{}, writer expects {}",
                width, height, self.resolution
            ))
            .into());
        }
        match &mut self.backend {
            WriterBackend::Counting => {}
            #[cfg(feature = "video-ffmpeg")]
            WriterBackend::Ffmpeg(writer) => writer.write_frame(frame)?,
        }
        self.frames_written += 1;
        Ok(())
    }

    /// Flush and finalize the container; returns the number of frames written.
    pub fn finish(self) -> Result<u64> {
        match self.backend {
            WriterBackend::Counting => {}
            #[cfg(feature = "video-ffmpeg")]
            WriterBackend::Ffmpeg(writer) => writer.finish()?,
        }
        Ok(self.frames_written)
    }
}
