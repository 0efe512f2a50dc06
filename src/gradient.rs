use kurbo::Point;

use crate::error::{GlowshotError, GlowshotResult};

/// A multi-stop linear gradient background: ordered colors plus an angle in
/// degrees (CSS-style, 0 = bottom-to-top, 90 = left-to-right).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Gradient {
    pub colors: Vec<String>,
    pub angle: f64,
}

struct Preset {
    colors: &'static [&'static str],
    angle: f64,
}

const PRESETS: &[Preset] = &[
    Preset {
        colors: &["#667eea", "#764ba2", "#f093fb"],
        angle: 135.0,
    },
    Preset {
        colors: &["#4facfe", "#00f2fe", "#43e97b"],
        angle: 120.0,
    },
    Preset {
        colors: &["#fa709a", "#fee140", "#30cfd0"],
        angle: 160.0,
    },
    Preset {
        colors: &["#a8edea", "#fed6e3", "#ffd89b"],
        angle: 90.0,
    },
    Preset {
        colors: &["#ff9a56", "#ff6a88", "#f093fb"],
        angle: 145.0,
    },
    Preset {
        colors: &["#5ee7df", "#b490ca", "#d9a7c7"],
        angle: 180.0,
    },
    Preset {
        colors: &["#f6d365", "#fda085", "#fa709a"],
        angle: 110.0,
    },
    Preset {
        colors: &["#13547a", "#80d0c7", "#a8edea"],
        angle: 135.0,
    },
    Preset {
        colors: &["#667eea", "#764ba2", "#f093fb", "#4facfe"],
        angle: 125.0,
    },
    Preset {
        colors: &["#fdbb2d", "#22c1c3", "#3a7bd5"],
        angle: 140.0,
    },
];

impl Gradient {
    /// Number of entries in the fixed preset table.
    pub fn preset_count() -> usize {
        PRESETS.len()
    }

    /// Deterministic uniform pick from the preset table. Callers supply the
    /// randomness (or a fixed seed for reproducible output).
    pub fn pick(seed: u64) -> Gradient {
        let preset = &PRESETS[(seed % PRESETS.len() as u64) as usize];
        Gradient {
            colors: preset.colors.iter().map(|c| c.to_string()).collect(),
            angle: preset.angle,
        }
    }

    /// A caller-assembled gradient; rejects anything the renderer could not
    /// place stops for.
    pub fn custom(colors: Vec<String>, angle: f64) -> GlowshotResult<Gradient> {
        let g = Gradient { colors, angle };
        g.validate()?;
        Ok(g)
    }

    pub fn validate(&self) -> GlowshotResult<()> {
        if self.colors.len() < 2 {
            return Err(GlowshotError::validation(
                "gradient needs at least 2 colors",
            ));
        }
        if !self.angle.is_finite() {
            return Err(GlowshotError::validation("gradient angle must be finite"));
        }
        for c in &self.colors {
            parse_hex_color(c)?;
        }
        Ok(())
    }

    /// The two gradient endpoints for a canvas of the given logical size.
    ///
    /// The angle is treated compass-style: `angle_rad = (angle - 90)·π/180`,
    /// endpoints at canvas center ± (cos·w/2, sin·h/2). So 90° yields a
    /// horizontal axis and 0° a vertical one.
    pub fn endpoints(&self, width: f64, height: f64) -> (Point, Point) {
        let angle_rad = (self.angle - 90.0).to_radians();
        let (cx, cy) = (width / 2.0, height / 2.0);
        let dx = angle_rad.cos() * width / 2.0;
        let dy = angle_rad.sin() * height / 2.0;
        (Point::new(cx + dx, cy + dy), Point::new(cx - dx, cy - dy))
    }

    /// Rasterize to an opaque premultiplied-RGBA8 buffer of `width × height`.
    ///
    /// Each pixel projects onto the endpoint axis; the clamped projection
    /// parameter is interpolated piecewise-linearly between color stops
    /// placed at `i / (n - 1)`.
    pub fn rasterize(&self, width: u32, height: u32) -> GlowshotResult<Vec<u8>> {
        self.validate()?;
        let stops: Vec<[u8; 3]> = self
            .colors
            .iter()
            .map(|c| parse_hex_color(c))
            .collect::<GlowshotResult<_>>()?;

        let (p0, p1) = self.endpoints(f64::from(width), f64::from(height));
        let (dx, dy) = (p1.x - p0.x, p1.y - p0.y);
        let len_sq = dx * dx + dy * dy;

        let mut out = vec![0u8; width as usize * height as usize * 4];
        for y in 0..height {
            for x in 0..width {
                // Sample at the pixel center.
                let px = f64::from(x) + 0.5;
                let py = f64::from(y) + 0.5;
                let t = if len_sq <= f64::EPSILON {
                    0.0
                } else {
                    (((px - p0.x) * dx + (py - p0.y) * dy) / len_sq).clamp(0.0, 1.0)
                };
                let c = sample_stops(&stops, t);
                let idx = (y as usize * width as usize + x as usize) * 4;
                out[idx] = c[0];
                out[idx + 1] = c[1];
                out[idx + 2] = c[2];
                out[idx + 3] = 255;
            }
        }
        Ok(out)
    }
}

fn sample_stops(stops: &[[u8; 3]], t: f64) -> [u8; 3] {
    let n = stops.len();
    debug_assert!(n >= 2);
    let scaled = t * (n - 1) as f64;
    let i = (scaled.floor() as usize).min(n - 2);
    let frac = scaled - i as f64;
    let (a, b) = (stops[i], stops[i + 1]);
    let lerp = |a: u8, b: u8| -> u8 {
        (f64::from(a) + (f64::from(b) - f64::from(a)) * frac)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    [lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2])]
}

/// Parse `#rrggbb` or `#rgb` into RGB bytes.
pub fn parse_hex_color(s: &str) -> GlowshotResult<[u8; 3]> {
    let hex = s
        .strip_prefix('#')
        .ok_or_else(|| GlowshotError::validation(format!("color '{s}' must start with '#'")))?;
    let invalid = || GlowshotError::validation(format!("color '{s}' is not a valid hex color"));
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).map_err(|_| invalid())?;
            let g = u8::from_str_radix(&hex[2..4], 16).map_err(|_| invalid())?;
            let b = u8::from_str_radix(&hex[4..6], 16).map_err(|_| invalid())?;
            Ok([r, g, b])
        }
        3 => {
            let d = |i: usize| -> GlowshotResult<u8> {
                let v = u8::from_str_radix(&hex[i..i + 1], 16).map_err(|_| invalid())?;
                Ok(v * 17)
            };
            Ok([d(0)?, d(1)?, d(2)?])
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_table_has_ten_entries_with_valid_colors() {
        assert_eq!(Gradient::preset_count(), 10);
        for seed in 0..10 {
            let g = Gradient::pick(seed);
            g.validate().unwrap();
            assert!(g.colors.len() >= 3);
        }
    }

    #[test]
    fn pick_is_deterministic_and_uniform_over_table() {
        assert_eq!(Gradient::pick(3), Gradient::pick(13));
        assert_ne!(Gradient::pick(0), Gradient::pick(1));
    }

    #[test]
    fn custom_rejects_fewer_than_two_colors() {
        assert!(Gradient::custom(vec!["#ffffff".to_string()], 90.0).is_err());
        Gradient::custom(vec!["#ffffff".to_string(), "#000000".to_string()], 90.0).unwrap();
    }

    #[test]
    fn hex_parsing_long_short_and_invalid() {
        assert_eq!(parse_hex_color("#764ba2").unwrap(), [0x76, 0x4b, 0xa2]);
        assert_eq!(parse_hex_color("#fff").unwrap(), [255, 255, 255]);
        assert!(parse_hex_color("764ba2").is_err());
        assert!(parse_hex_color("#zzzzzz").is_err());
        assert!(parse_hex_color("#ffff").is_err());
    }

    #[test]
    fn endpoints_angle_90_is_horizontal_and_0_is_vertical() {
        let g = Gradient::custom(vec!["#000000".into(), "#ffffff".into()], 90.0).unwrap();
        let (p0, p1) = g.endpoints(200.0, 100.0);
        assert!((p0.y - p1.y).abs() < 1e-9);
        assert!((p0.x - p1.x).abs() > 1.0);

        let g = Gradient::custom(vec!["#000000".into(), "#ffffff".into()], 0.0).unwrap();
        let (p0, p1) = g.endpoints(200.0, 100.0);
        assert!((p0.x - p1.x).abs() < 1e-9);
        assert!((p0.y - p1.y).abs() > 1.0);
    }

    #[test]
    fn raster_center_matches_middle_stop() {
        let g = Gradient {
            colors: vec!["#667eea".into(), "#764ba2".into(), "#f093fb".into()],
            angle: 135.0,
        };
        let (w, h) = (101u32, 101u32);
        let data = g.rasterize(w, h).unwrap();
        let idx = ((h / 2) as usize * w as usize + (w / 2) as usize) * 4;
        let center = &data[idx..idx + 3];
        for (got, want) in center.iter().zip([0x76u8, 0x4b, 0xa2]) {
            assert!((i16::from(*got) - i16::from(want)).abs() <= 3);
        }
        assert_eq!(data[idx + 3], 255);
    }

    #[test]
    fn raster_horizontal_gradient_varies_along_x_only() {
        let g = Gradient::custom(vec!["#000000".into(), "#ffffff".into()], 90.0).unwrap();
        let data = g.rasterize(64, 64).unwrap();
        let px = |x: usize, y: usize| data[(y * 64 + x) * 4];
        assert_ne!(px(0, 32), px(63, 32));
        assert_eq!(px(10, 0), px(10, 63));
    }
}
