//! Target-size computation and resampling.

use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the output size is derived from the source size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResizeSpec {
    /// Keep the source size
    #[default]
    Original,
    /// Fixed width, height follows the aspect ratio
    Width { width: u32 },
    /// Fixed height, width follows the aspect ratio
    Height { height: u32 },
    /// Longest side becomes `size`
    LongestEdge { size: u32 },
    /// Scale both sides by `percent`
    Percent { percent: f32 },
    /// Exact size, aspect ratio ignored
    Exact { width: u32, height: u32 },
}

fn scaled(value: u32, factor: f64) -> u32 {
    ((f64::from(value) * factor).round() as u32).max(1)
}

impl ResizeSpec {
    /// Output size for a `width` x `height` source. Never zero.
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        let (width, height) = (width.max(1), height.max(1));
        match *self {
            ResizeSpec::Original => (width, height),
            ResizeSpec::Width { width: w } => {
                let w = w.max(1);
                (w, scaled(height, f64::from(w) / f64::from(width)))
            }
            ResizeSpec::Height { height: h } => {
                let h = h.max(1);
                (scaled(width, f64::from(h) / f64::from(height)), h)
            }
            ResizeSpec::LongestEdge { size } => {
                let size = size.max(1);
                let factor = f64::from(size) / f64::from(width.max(height));
                (scaled(width, factor), scaled(height, factor))
            }
            ResizeSpec::Percent { percent } => {
                let factor = f64::from(percent.max(0.0)) / 100.0;
                (scaled(width, factor), scaled(height, factor))
            }
            ResizeSpec::Exact { width, height } => (width.max(1), height.max(1)),
        }
    }

    /// Resample `image` to the target size (Lanczos3).
    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        let (w, h) = self.target_size(image.width(), image.height());
        if (w, h) == (image.width(), image.height()) {
            return image.clone();
        }
        image.resize_exact(w, h, FilterType::Lanczos3)
    }
}

impl fmt::Display for ResizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResizeSpec::Original => write!(f, "original"),
            ResizeSpec::Width { width } => write!(f, "w{}", width),
            ResizeSpec::Height { height } => write!(f, "h{}", height),
            ResizeSpec::LongestEdge { size } => write!(f, "long{}", size),
            ResizeSpec::Percent { percent } => write!(f, "{}%", percent),
            ResizeSpec::Exact { width, height } => write!(f, "{}x{}", width, height),
        }
    }
}

impl FromStr for ResizeSpec {
    type Err = String;

    /// Accepts `original`, `w800`, `h600`, `long1024`, `50%` and `800x600`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let number = |digits: &str| {
            digits
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| format!("invalid size in {:?}", s))
        };

        if s == "original" {
            return Ok(ResizeSpec::Original);
        }
        if let Some(p) = s.strip_suffix('%') {
            let percent: f32 = p.parse().map_err(|_| format!("invalid percent {:?}", s))?;
            if !(percent > 0.0) {
                return Err(format!("percent must be positive: {:?}", s));
            }
            return Ok(ResizeSpec::Percent { percent });
        }
        if let Some(rest) = s.strip_prefix("long") {
            return Ok(ResizeSpec::LongestEdge { size: number(rest)? });
        }
        if let Some(rest) = s.strip_prefix('w') {
            return Ok(ResizeSpec::Width { width: number(rest)? });
        }
        if let Some(rest) = s.strip_prefix('h') {
            return Ok(ResizeSpec::Height { height: number(rest)? });
        }
        if let Some((w, h)) = s.split_once('x') {
            return Ok(ResizeSpec::Exact {
                width: number(w)?,
                height: number(h)?,
            });
        }
        Err(format!(
            "unrecognised size {:?} (use original, w800, h600, long1024, 50% or 800x600)",
            s
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_sizes() {
        assert_eq!(ResizeSpec::Original.target_size(400, 300), (400, 300));
        assert_eq!(ResizeSpec::Width { width: 200 }.target_size(400, 300), (200, 150));
        assert_eq!(ResizeSpec::Height { height: 150 }.target_size(400, 300), (200, 150));
        assert_eq!(ResizeSpec::LongestEdge { size: 100 }.target_size(300, 400), (75, 100));
        assert_eq!(ResizeSpec::Percent { percent: 50.0 }.target_size(400, 300), (200, 150));
        assert_eq!(
            ResizeSpec::Exact { width: 10, height: 10 }.target_size(400, 300),
            (10, 10)
        );
    }

    #[test]
    fn test_never_zero() {
        assert_eq!(ResizeSpec::Width { width: 10 }.target_size(10000, 1), (10, 1));
        assert_eq!(ResizeSpec::Percent { percent: 0.01 }.target_size(10, 10), (1, 1));
    }

    #[test]
    fn test_parse() {
        assert_eq!("w800".parse::<ResizeSpec>(), Ok(ResizeSpec::Width { width: 800 }));
        assert_eq!("H600".parse::<ResizeSpec>(), Ok(ResizeSpec::Height { height: 600 }));
        assert_eq!(
            "long1024".parse::<ResizeSpec>(),
            Ok(ResizeSpec::LongestEdge { size: 1024 })
        );
        assert_eq!(
            "800x600".parse::<ResizeSpec>(),
            Ok(ResizeSpec::Exact { width: 800, height: 600 })
        );
        assert_eq!("50%".parse::<ResizeSpec>(), Ok(ResizeSpec::Percent { percent: 50.0 }));
        assert!("w0".parse::<ResizeSpec>().is_err());
        assert!("banana".parse::<ResizeSpec>().is_err());
    }

    #[test]
    fn test_apply_resamples() {
        let image = DynamicImage::new_rgb8(40, 20);
        let out = ResizeSpec::Width { width: 10 }.apply(&image);
        assert_eq!((out.width(), out.height()), (10, 5));
    }
}
