//! Turns semantic button parameters into icon files.

use std::{f64::consts::PI, path::PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::{registry::Rgb, utils::dir::create_dir};

pub const BUTTON_SIZE: u32 = 128;

/// Displayed value of the elapsed-time clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockFace {
    pub hours: i64,
    pub minutes: i64,
}

impl ClockFace {
    pub fn from_elapsed(elapsed: Duration) -> Self {
        let seconds = elapsed.num_seconds().max(0);
        Self {
            hours: seconds / 3600,
            minutes: seconds / 60 % 60,
        }
    }
}

/// Produces icons and returns the path they can be loaded from.
#[cfg_attr(test, mockall::automock)]
pub trait IconRenderer {
    fn render_clock(&mut self, face: ClockFace) -> Result<String>;

    fn render_swatch(&mut self, code: &str, colour: Rgb) -> Result<String>;
}

/// Writes square PNG icons into a directory. File names follow the rendered value, so the same
/// face always maps to the same file.
pub struct PngRenderer {
    icon_dir: PathBuf,
}

const CLOCK_HAND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const HOUR_MARK: Rgba<u8> = Rgba([128, 128, 128, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const MAX_HOUR_MARKS: i64 = 12;

impl PngRenderer {
    pub fn new(icon_dir: PathBuf) -> Result<Self> {
        create_dir(&icon_dir)?;
        Ok(Self { icon_dir })
    }

    fn save(&self, image: &RgbaImage, file_name: &str) -> Result<String> {
        let path = self.icon_dir.join(file_name);
        image
            .save(&path)
            .with_context(|| format!("Failed to write icon {path:?}"))?;
        debug!("Rendered {path:?}");
        Ok(path.to_string_lossy().into_owned())
    }
}

impl IconRenderer for PngRenderer {
    fn render_clock(&mut self, face: ClockFace) -> Result<String> {
        self.save(&draw_clock(face), &format!("clock-{}-{:02}.png", face.hours, face.minutes))
    }

    fn render_swatch(&mut self, code: &str, colour: Rgb) -> Result<String> {
        let file_name = format!("swatch-{}-{colour}.png", sanitize(code));
        self.save(&draw_swatch(colour), &file_name)
    }
}

fn sanitize(code: &str) -> String {
    code.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Pie sector growing clockwise from twelve o'clock with the minutes, and a grey dot per elapsed
/// hour around it.
fn draw_clock(face: ClockFace) -> RgbaImage {
    let center = BUTTON_SIZE as f64 / 2.;
    let radius = BUTTON_SIZE as f64 / 3.;
    let sweep = 2. * PI * face.minutes as f64 / 60.;
    let marks = face.hours.min(MAX_HOUR_MARKS);
    let mark_radius = radius + (center - radius) / 2.;
    let mark_size = (center - radius) / 4.;

    RgbaImage::from_fn(BUTTON_SIZE, BUTTON_SIZE, |x, y| {
        let dx = x as f64 + 0.5 - center;
        let dy = y as f64 + 0.5 - center;
        let distance = dx.hypot(dy);
        // Angle measured clockwise from twelve o'clock, in [0, 2π).
        let angle = (dx.atan2(-dy) + 2. * PI) % (2. * PI);

        if distance <= radius && angle < sweep {
            return CLOCK_HAND;
        }
        for mark in 0..marks {
            let theta = 2. * PI * mark as f64 / MAX_HOUR_MARKS as f64;
            let mx = center + mark_radius * theta.sin();
            let my = center - mark_radius * theta.cos();
            if (x as f64 + 0.5 - mx).hypot(y as f64 + 0.5 - my) <= mark_size {
                return HOUR_MARK;
            }
        }
        TRANSPARENT
    })
}

/// Solid square in the project colour with a contrasting bar along the bottom edge.
fn draw_swatch(colour: Rgb) -> RgbaImage {
    let fill = Rgba([colour.0, colour.1, colour.2, 255]);
    let bar = if colour.is_light() {
        Rgba([0, 0, 0, 255])
    } else {
        Rgba([255, 255, 255, 255])
    };
    let bar_start = BUTTON_SIZE - BUTTON_SIZE / 8;
    RgbaImage::from_fn(BUTTON_SIZE, BUTTON_SIZE, |_, y| {
        if y >= bar_start {
            bar
        } else {
            fill
        }
    })
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::Duration;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_clock_face_from_elapsed() {
        assert_eq!(
            ClockFace::from_elapsed(Duration::seconds(125)),
            ClockFace {
                hours: 0,
                minutes: 2
            }
        );
        assert_eq!(
            ClockFace::from_elapsed(Duration::seconds(3 * 3600 + 59 * 60 + 59)),
            ClockFace {
                hours: 3,
                minutes: 59
            }
        );
        assert_eq!(
            ClockFace::from_elapsed(Duration::seconds(-5)),
            ClockFace {
                hours: 0,
                minutes: 0
            }
        );
    }

    #[test]
    fn test_clock_sweep_follows_minutes() {
        let quarter = draw_clock(ClockFace {
            hours: 0,
            minutes: 15,
        });
        let c = BUTTON_SIZE / 2;
        // Right of center is inside the first quarter, left of center is not.
        assert_eq!(*quarter.get_pixel(c + 10, c - 10), CLOCK_HAND);
        assert_eq!(*quarter.get_pixel(c - 10, c + 10), TRANSPARENT);

        let empty = draw_clock(ClockFace {
            hours: 0,
            minutes: 0,
        });
        assert!(empty.pixels().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn test_png_renderer_writes_files() -> Result<()> {
        let dir = tempdir()?;
        let mut renderer = PngRenderer::new(dir.path().join("icons"))?;

        let clock = renderer.render_clock(ClockFace {
            hours: 1,
            minutes: 5,
        })?;
        let swatch = renderer.render_swatch("R&D", Rgb(10, 20, 30))?;

        assert!(clock.ends_with("clock-1-05.png"));
        assert!(swatch.ends_with("swatch-R_D-0a141e.png"));
        assert!(std::path::Path::new(&clock).is_file());
        assert!(std::path::Path::new(&swatch).is_file());
        Ok(())
    }
}
