//! Frame-file lookup for directory layouts.
//!
//! A directory source holds one `frame<N>.txt` per annotated frame. Lookup is
//! a pure function over a listing; the listing itself comes from an
//! `AnnotationStore`.

use anyhow::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::AnnotationError;

/// Extract `N` from a `frame<N>.txt` file name.
///
/// Any other name fails the lookup: a stray file in an annotation directory
/// usually means the wrong directory was passed.
pub fn frame_number_from_file_name(path: &Path) -> Result<u64> {
    static FRAME_FILE_RE: OnceLock<Regex> = OnceLock::new();
    let re = FRAME_FILE_RE.get_or_init(|| Regex::new(r"^frame(\d+)\.txt$").unwrap());

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    let digits = re
        .captures(&name)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| {
            AnnotationError::malformed(format!(
                "annotation file name '{}' does not match frame<N>.txt",
                path.display()
            ))
        })?;
    let frame = digits.as_str().parse::<u64>().map_err(|_| {
        AnnotationError::malformed(format!(
            "frame number in '{}' is out of range",
            path.display()
        ))
    })?;
    Ok(frame)
}

/// Every file in `listing` whose embedded frame number equals `frame_number`,
/// in listing order. Usually zero or one; zero-padded duplicates
/// (`frame3.txt`, `frame03.txt`) are all returned.
pub fn select_frame_files(listing: &[PathBuf], frame_number: u64) -> Result<Vec<PathBuf>> {
    let mut matches = Vec::new();
    for path in listing {
        if frame_number_from_file_name(path)? == frame_number {
            matches.push(path.clone());
        }
    }
    Ok(matches)
}
