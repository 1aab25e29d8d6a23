//! Run modes: annotate one extracted frame, or a whole video.

use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::annotate::FrameAnnotator;
use crate::config::{FrameErrorPolicy, RenderSettings, RunConfig, RunMode};
use crate::format::{AnnotationFormat, SourceLayout};
use crate::render::OverlayStyle;
use crate::video::{VideoReader, VideoWriter};
use crate::{AnnotationError, Resolution};

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_written: u64,
    pub detections_drawn: u64,
    /// Frames written un-annotated under `FrameErrorPolicy::Skip`.
    pub frames_skipped: u64,
    pub outputs: Vec<PathBuf>,
}

pub fn run(config: &RunConfig, settings: &RenderSettings) -> Result<RunSummary> {
    run_with_progress(config, settings, &mut |_| {})
}

/// Like `run`; `progress` is called with the running frame count in
/// whole-video mode.
pub fn run_with_progress(
    config: &RunConfig,
    settings: &RenderSettings,
    progress: &mut dyn FnMut(u64),
) -> Result<RunSummary> {
    config.validate()?;
    settings.validate()?;
    let mode = config.mode()?;
    check_annotation_source(config.format, &config.annotations)?;
    if config.format.is_ground_truth() {
        log::debug!("{} is ground truth; every detection scores 1.0", config.format);
    }

    let labels = Arc::new(settings.label_map()?);
    let style = OverlayStyle::from_settings(settings)?;
    let annotator = FrameAnnotator::for_format(config.format, labels, style);
    let mut reader = VideoReader::open(&config.input)?;
    log::info!(
        "annotating {} ({}) with {} annotations from {}",
        config.input,
        reader.resolution(),
        config.format,
        config.annotations.display()
    );

    match mode {
        RunMode::SingleFrame(frame_number) => annotate_single_frame(
            &mut reader,
            &annotator,
            &config.annotations,
            frame_number,
            &single_frame_path(&config.output),
        ),
        RunMode::WholeVideo { decomposed } => {
            let video_path = video_output_path(&config.output);
            let mut writer = VideoWriter::create(&video_path, reader.resolution(), settings.fps)?;
            let frames_dir = if decomposed {
                let dir = PathBuf::from(&config.output);
                prepare_frames_dir(&dir)?;
                Some(dir)
            } else {
                None
            };
            let mut summary = annotate_video(
                &mut reader,
                &mut writer,
                &annotator,
                &config.annotations,
                frames_dir.as_deref(),
                settings.frame_errors,
                progress,
            )?;
            writer.finish()?;
            summary.outputs.insert(0, PathBuf::from(video_path));
            Ok(summary)
        }
    }
}

/// Single-file formats need a file, per-frame formats a directory.
pub fn check_annotation_source(format: AnnotationFormat, source: &Path) -> Result<()> {
    let (present, expected) = match format.layout() {
        SourceLayout::SingleFile => (source.is_file(), "file"),
        SourceLayout::FrameDirectory => (source.is_dir(), "directory"),
    };
    if present {
        return Ok(());
    }
    Err(AnnotationError::io(format!(
        "{} annotations must be a {}: {}",
        format,
        expected,
        source.display()
    ))
    .into())
}

pub fn single_frame_path(output: &str) -> PathBuf {
    PathBuf::from(format!("{}.jpg", output))
}

pub fn video_output_path(output: &str) -> String {
    format!("{}.mp4", output)
}

/// `annotated-frame<k>.jpg`, `k` counting written frames from 1.
pub fn decomposed_frame_path(dir: &Path, count: u64) -> PathBuf {
    dir.join(format!("annotated-frame{}.jpg", count))
}

/// Remove any previous output directory and create it empty.
pub fn prepare_frames_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| {
            AnnotationError::io(format!("cannot clear {}: {}", dir.display(), e))
        })?;
    }
    std::fs::create_dir_all(dir)
        .map_err(|e| AnnotationError::io(format!("cannot create {}: {}", dir.display(), e)))?;
    Ok(())
}

fn save_frame(frame: &RgbImage, path: &Path) -> Result<()> {
    frame
        .save(path)
        .map_err(|e| AnnotationError::io(format!("cannot write {}: {}", path.display(), e)))?;
    Ok(())
}

fn frame_resolution(frame: &RgbImage) -> Resolution {
    let (width, height) = frame.dimensions();
    Resolution::new(width, height)
}

/// Extract the zero-indexed `frame_number`, annotate it and save it as JPEG.
pub fn annotate_single_frame(
    reader: &mut VideoReader,
    annotator: &FrameAnnotator,
    source: &Path,
    frame_number: u64,
    output: &Path,
) -> Result<RunSummary> {
    let mut frame = reader.seek_frame(frame_number)?;
    let resolution = frame_resolution(&frame);
    let drawn = annotator.annotate_frame(&mut frame, source, frame_number, resolution)?;
    save_frame(&frame, output)?;
    log::info!(
        "frame {}: {} detections drawn, wrote {}",
        frame_number,
        drawn,
        output.display()
    );
    Ok(RunSummary {
        frames_read: reader.frames_read(),
        frames_written: 1,
        detections_drawn: drawn as u64,
        frames_skipped: 0,
        outputs: vec![output.to_path_buf()],
    })
}

/// Annotate every frame with its zero-indexed position and hand it to
/// `writer`; with `frames_dir`, each annotated frame is also saved as JPEG.
pub fn annotate_video(
    reader: &mut VideoReader,
    writer: &mut VideoWriter,
    annotator: &FrameAnnotator,
    source: &Path,
    frames_dir: Option<&Path>,
    policy: FrameErrorPolicy,
    progress: &mut dyn FnMut(u64),
) -> Result<RunSummary> {
    let resolution = reader.resolution();
    let mut summary = RunSummary::default();
    let mut frame_number = 0u64;

    while let Some(mut frame) = reader.next_frame()? {
        match annotator.annotate_frame(&mut frame, source, frame_number, resolution) {
            Ok(drawn) => summary.detections_drawn += drawn as u64,
            Err(e) if policy == FrameErrorPolicy::Skip => {
                log::warn!("frame {} left un-annotated: {:#}", frame_number, e);
                summary.frames_skipped += 1;
            }
            Err(e) => return Err(e.context(format!("annotating frame {}", frame_number))),
        }
        frame_number += 1;

        writer
            .write_frame(&frame)
            .with_context(|| format!("writing frame {}", frame_number - 1))?;
        if let Some(dir) = frames_dir {
            save_frame(&frame, &decomposed_frame_path(dir, frame_number))?;
        }
        summary.frames_written += 1;
        progress(frame_number);
    }

    summary.frames_read = frame_number;
    if let Some(dir) = frames_dir {
        summary.outputs.push(dir.to_path_buf());
    }
    log::info!(
        "{} frames annotated, {} detections drawn, {} skipped",
        summary.frames_written,
        summary.detections_drawn,
        summary.frames_skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::MemoryStore;
    use crate::labels::LabelMap;
    use crate::{error_kind, ErrorKind};

    fn yolo_annotator(store: MemoryStore) -> FrameAnnotator {
        FrameAnnotator::new(
            AnnotationFormat::Yolo.parser_with_store(Arc::new(LabelMap::coco()), Arc::new(store)),
            OverlayStyle::default(),
        )
    }

    #[test]
    fn output_names() {
        assert_eq!(single_frame_path("out/shot"), PathBuf::from("out/shot.jpg"));
        assert_eq!(video_output_path("annotated"), "annotated.mp4");
        assert_eq!(
            decomposed_frame_path(Path::new("annotated"), 1),
            PathBuf::from("annotated/annotated-frame1.jpg")
        );
    }

    #[test]
    fn whole_video_counts_frames_and_detections() -> Result<()> {
        let store = MemoryStore::new();
        store.insert("gt/frame0.txt", "1 0.5 0.5 0.5 0.5\n")?;
        store.insert("gt/frame2.txt", "1 0.5 0.5 0.5 0.5\n3 0.2 0.2 0.1 0.1\n")?;
        let annotator = yolo_annotator(store);

        let mut reader = VideoReader::open("stub://16x16/4")?;
        let mut writer = VideoWriter::counting(reader.resolution());
        let mut seen = Vec::new();
        let summary = annotate_video(
            &mut reader,
            &mut writer,
            &annotator,
            Path::new("gt"),
            None,
            FrameErrorPolicy::Abort,
            &mut |n| seen.push(n),
        )?;
        assert_eq!(summary.frames_read, 4);
        assert_eq!(summary.frames_written, 4);
        assert_eq!(summary.detections_drawn, 3);
        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert_eq!(writer.frames_written(), 4);
        Ok(())
    }

    #[test]
    fn skip_policy_keeps_going() -> Result<()> {
        let store = MemoryStore::new();
        store.insert("gt/frame1.txt", "not a record\n")?;
        let annotator = yolo_annotator(store);

        let mut reader = VideoReader::open("stub://8x8/3")?;
        let mut writer = VideoWriter::counting(reader.resolution());
        let summary = annotate_video(
            &mut reader,
            &mut writer,
            &annotator,
            Path::new("gt"),
            None,
            FrameErrorPolicy::Skip,
            &mut |_| {},
        )?;
        assert_eq!(summary.frames_written, 3);
        assert_eq!(summary.frames_skipped, 1);

        let mut reader = VideoReader::open("stub://8x8/3")?;
        let mut writer = VideoWriter::counting(reader.resolution());
        let err = annotate_video(
            &mut reader,
            &mut writer,
            &annotator,
            Path::new("gt"),
            None,
            FrameErrorPolicy::Abort,
            &mut |_| {},
        )
        .unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::MalformedRecord));
        assert_eq!(writer.frames_written(), 1);
        Ok(())
    }

    #[test]
    fn annotation_source_kind_is_checked() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("dets.json");
        std::fs::write(&file, "[]")?;

        check_annotation_source(AnnotationFormat::OpenDataCamYolo, &file)?;
        check_annotation_source(AnnotationFormat::Yolo, dir.path())?;

        let err = check_annotation_source(AnnotationFormat::Yolo, &file).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::IoFailure));
        let err = check_annotation_source(AnnotationFormat::Faster, dir.path()).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::IoFailure));
        Ok(())
    }

    #[test]
    fn prepare_frames_dir_clears_previous_output() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("annotated");
        std::fs::create_dir(&out)?;
        std::fs::write(out.join("stale.jpg"), b"old")?;
        prepare_frames_dir(&out)?;
        assert!(out.is_dir());
        assert_eq!(std::fs::read_dir(&out)?.count(), 0);
        Ok(())
    }
}
