//! annotate_video - Draw detection annotations onto video frames.
//!
//! Single-frame mode extracts frame `-n` and writes `<output>.jpg`.
//! Whole-video mode (`-v`) writes `<output>.mp4`, and with `-d` also every
//! annotated frame as `<output>/annotated-frame<k>.jpg`.
//!
//! Exit status identifies the failure: 2 configuration, 3 I/O, 4 malformed
//! record, 5 unknown class, 6 unsupported format, 7 frame extraction.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use detection_overlay::pipeline::run_with_progress;
use detection_overlay::{error_kind, AnnotationFormat, FrameErrorPolicy, RenderSettings, RunConfig};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "annotate_video",
    about = "Draw detection annotations onto video frames"
)]
struct Args {
    /// Input video (or stub://WxH/N for synthetic frames)
    #[arg(short, long, value_name = "PATH")]
    input: String,

    /// Annotation file, or directory of frame<N>.txt files
    #[arg(short, long, value_name = "PATH")]
    annotations: PathBuf,

    /// Output base name (.jpg / .mp4 are appended)
    #[arg(short, long, value_name = "PATH")]
    output: String,

    /// opendatacamyolo|openimages|relxywh|absxywh|yolo|absolute|faster
    #[arg(
        short = 'f',
        long = "annotation-format",
        alias = "annotation_format",
        value_name = "FORMAT"
    )]
    annotation_format: String,

    /// Zero-indexed frame to annotate (single-frame mode)
    #[arg(short = 'n', long = "frame-num", alias = "frame_num", value_name = "N")]
    frame_num: Option<u64>,

    /// Annotate the whole video
    #[arg(short, long)]
    video: bool,

    /// Also write every annotated frame as a JPEG (with --video)
    #[arg(short, long)]
    decomposed: bool,

    /// Class-name table, one name per line (defaults to COCO)
    #[arg(long, value_name = "PATH")]
    labels: Option<PathBuf>,

    /// TTF/OTF font for captions (defaults to the bundled DejaVu Sans)
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,

    /// Output video frame rate
    #[arg(long, value_name = "FPS")]
    fps: Option<u32>,

    /// Write frames whose annotations fail to parse without overlays
    #[arg(long)]
    skip_bad_frames: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("annotate_video: {:#}", e);
            ExitCode::from(error_kind(&e).map(|kind| kind.exit_code()).unwrap_or(1))
        }
    }
}

fn run(args: Args) -> Result<()> {
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let format: AnnotationFormat = args.annotation_format.parse()?;
    let config = RunConfig {
        input: args.input,
        annotations: args.annotations,
        output: args.output,
        format,
        frame_number: args.frame_num,
        whole_video: args.video,
        decomposed: args.decomposed,
    };

    let settings = {
        let _stage = ui.stage("Load render settings");
        let mut settings = RenderSettings::load()?;
        if let Some(labels) = args.labels {
            settings.labels_path = Some(labels);
        }
        if let Some(font) = args.font {
            settings.font_path = Some(font);
        }
        if let Some(fps) = args.fps {
            settings.fps = fps;
        }
        if args.skip_bad_frames {
            settings.frame_errors = FrameErrorPolicy::Skip;
        }
        settings.validate()?;
        settings
    };

    let summary = {
        let mut stage = ui.frames("Annotate");
        run_with_progress(&config, &settings, &mut |frames| stage.set_frames(frames))?
    };

    for output in &summary.outputs {
        println!("annotate_video: wrote {}", output.display());
    }
    println!(
        "annotate_video: {} frames written, {} detections drawn",
        summary.frames_written, summary.detections_drawn
    );
    if summary.frames_skipped > 0 {
        println!(
            "annotate_video: {} frames written without annotations",
            summary.frames_skipped
        );
    }
    Ok(())
}
