use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    fn spinner(&self, template: &str) -> Option<ProgressBar> {
        if !self.use_pretty() {
            return None;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style =
            ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        Some(spinner)
    }

    /// Timed step; prints a check mark with the elapsed time when dropped.
    pub fn stage(&self, name: &str) -> StageGuard {
        let spinner = self.spinner("{spinner} {msg}");
        match &spinner {
            Some(spinner) => spinner.set_message(format!("{name}…")),
            None => eprintln!("==> {}", name),
        }
        StageGuard::new(name.to_string(), spinner)
    }

    /// Like `stage`, with a running frame counter.
    pub fn frames(&self, name: &str) -> StageGuard {
        let spinner = self.spinner("{spinner} {msg} [{pos} frames, {per_sec}]");
        match &spinner {
            Some(spinner) => spinner.set_message(name.to_string()),
            None => eprintln!("==> {}", name),
        }
        StageGuard::new(name.to_string(), spinner)
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    frames: u64,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            frames: 0,
            spinner,
        }
    }

    pub fn set_frames(&mut self, frames: u64) {
        self.frames = frames;
        if let Some(spinner) = &self.spinner {
            spinner.set_position(frames);
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = format_duration(self.start.elapsed());
        let message = if self.frames > 0 {
            format!("✔ {}: {} frames ({})", self.name, self.frames, elapsed)
        } else {
            format!("✔ {} ({})", self.name, elapsed)
        };
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
