use super::error::PipelineError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
    Other,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
            Orientation::Other => "other",
        }
    }

    /// Object store prefix videos of this orientation are filed under.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape/",
            Orientation::Portrait => "portrait/",
            Orientation::Other => "other/",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a frame size as 16:9, 9:16 or neither.
///
/// Each orientation is tested by exact cross-multiplication first and then
/// against a 5% relative band around the target ratio, inclusive at both
/// ends. Landscape is tested before portrait.
pub fn classify(width: u32, height: u32) -> Result<Orientation, PipelineError> {
    if height == 0 {
        return Err(PipelineError::InvalidDimensions { width, height });
    }

    let (w, h) = (u64::from(width), u64::from(height));

    if w * 9 == h * 16 || within_band(w, h, 16, 9) {
        return Ok(Orientation::Landscape);
    }
    if w * 16 == h * 9 || within_band(w, h, 9, 16) {
        return Ok(Orientation::Portrait);
    }
    Ok(Orientation::Other)
}

/// `|w/h - num/den| <= num/den / 20`, cross-multiplied by `20·den·h` so the
/// boundary is exact.
fn within_band(w: u64, h: u64, num: u64, den: u64) -> bool {
    (20 * den * w).abs_diff(20 * num * h) <= num * h
}
