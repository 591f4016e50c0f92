use image::Rgb;
use palette::{LinSrgb, Mix, Srgb};

// ---------------------------------------------------------------------------
// Colormap anchors
// ---------------------------------------------------------------------------

/// Viridis control points, evenly spaced from 0.0 to 1.0.
const VIRIDIS_ANCHORS: [(f32, f32, f32); 9] = [
    (0.267, 0.005, 0.329),
    (0.283, 0.141, 0.458),
    (0.254, 0.265, 0.530),
    (0.207, 0.372, 0.553),
    (0.164, 0.471, 0.558),
    (0.128, 0.567, 0.551),
    (0.135, 0.659, 0.518),
    (0.267, 0.749, 0.441),
    (0.993, 0.906, 0.144),
];

const LUT_SIZE: usize = 256;

// ---------------------------------------------------------------------------
// Colormap: normalised value → RGB
// ---------------------------------------------------------------------------

/// A 256-entry lookup table built by blending anchor colours in linear sRGB.
#[derive(Debug, Clone)]
pub struct Colormap {
    lut: Vec<Rgb<u8>>,
}

impl Default for Colormap {
    fn default() -> Self {
        Self::viridis()
    }
}

impl Colormap {
    pub fn viridis() -> Self {
        Self::from_anchors(&VIRIDIS_ANCHORS)
    }

    /// Build a table from evenly spaced sRGB anchors (at least two).
    fn from_anchors(anchors: &[(f32, f32, f32)]) -> Self {
        let linear: Vec<LinSrgb> = anchors
            .iter()
            .map(|&(r, g, b)| Srgb::new(r, g, b).into_linear())
            .collect();
        let segments = linear.len().saturating_sub(1).max(1);

        let lut = (0..LUT_SIZE)
            .map(|i| {
                let t = i as f32 / (LUT_SIZE - 1) as f32 * segments as f32;
                let seg = (t.floor() as usize).min(segments - 1);
                let lo = linear[seg.min(linear.len() - 1)];
                let hi = linear[(seg + 1).min(linear.len() - 1)];
                let mixed = lo.mix(hi, t - seg as f32);
                let rgb: Srgb<u8> = Srgb::from_linear(mixed);
                Rgb([rgb.red, rgb.green, rgb.blue])
            })
            .collect();

        Colormap { lut }
    }

    /// Look up the colour for a value in `[0, 1]`; out-of-range and NaN clamp.
    pub fn color_for(&self, t: f64) -> Rgb<u8> {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let idx = (t * (LUT_SIZE - 1) as f64).round() as usize;
        self.lut[idx]
    }
}
