
use std::sync::OnceLock;

use crate::error::ExportError;
use crate::icc::IccProfileBuilder;
use crate::models::ColorSpaceId;

/// CIE 1931 xy chromaticity coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chromaticity {
    pub x: f64,
    pub y: f64,
}

const WHITE_POINT_D65: Chromaticity = Chromaticity { x: 0.3127, y: 0.3290 };

/// An RGB color space as the profile synthesizer sees it: four
/// chromaticities, a display gamma, and a human-readable label.
/// Immutable once chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbColorSpace {
    pub red: Chromaticity,
    pub green: Chromaticity,
    pub blue: Chromaticity,
    pub white: Chromaticity,
    pub gamma: f64,
    pub label: &'static str,
}

impl RgbColorSpace {
    /// [sRGB](https://en.wikipedia.org/wiki/SRGB), same primaries and white
    /// point as ITU-R BT.709. Display gamma 2.4.
    pub const fn rec709() -> Self {
        Self {
            red: Chromaticity { x: 0.6400, y: 0.3300 },
            green: Chromaticity { x: 0.3000, y: 0.6000 },
            blue: Chromaticity { x: 0.1500, y: 0.0600 },
            white: WHITE_POINT_D65,
            gamma: 2.4,
            label: "sRGB IEC61966-2.1",
        }
    }

    /// Display P3: DCI-P3 primaries with a D65 white point.
    pub const fn display_p3() -> Self {
        Self {
            red: Chromaticity { x: 0.680, y: 0.320 },
            green: Chromaticity { x: 0.265, y: 0.690 },
            blue: Chromaticity { x: 0.150, y: 0.060 },
            white: WHITE_POINT_D65,
            gamma: 2.2,
            label: "Display P3",
        }
    }

    /// Primaries of the ITU-R Recommendation BT.2020 or
    /// [Rec.2020](https://en.wikipedia.org/wiki/Rec._2020) standard.
    pub const fn rec2020() -> Self {
        Self {
            red: Chromaticity { x: 0.708, y: 0.292 },
            green: Chromaticity { x: 0.170, y: 0.797 },
            blue: Chromaticity { x: 0.131, y: 0.046 },
            white: WHITE_POINT_D65,
            gamma: 2.2,
            label: "Rec. 2020",
        }
    }

    pub fn white_xyz(&self) -> [f64; 3] {
        xy_to_xyz(self.white)
    }

    /// The colorant XYZ values an RGB profile stores: each primary's XYZ
    /// scaled so the three sum to the white point.
    ///
    /// Solves `[R G B] . S = W` for the scale vector `S`. The result is kept
    /// relative to the profile's own white; no adaptation to D50 is applied
    /// even though the PCS illuminant is declared as D50.
    pub fn scaled_colorants(&self) -> Result<[[f64; 3]; 3], ExportError> {
        let red = xy_to_xyz(self.red);
        let green = xy_to_xyz(self.green);
        let blue = xy_to_xyz(self.blue);
        let white = self.white_xyz();

        // Primaries as columns.
        let m = [
            [red[0], green[0], blue[0]],
            [red[1], green[1], blue[1]],
            [red[2], green[2], blue[2]],
        ];
        let inverse = invert_matrix(m).ok_or_else(|| {
            ExportError::assertion(format!("degenerate primaries for {}", self.label))
        })?;
        let s = mul_vector(&inverse, &white);

        Ok([
            [red[0] * s[0], red[1] * s[0], red[2] * s[0]],
            [green[0] * s[1], green[1] * s[1], green[2] * s[1]],
            [blue[0] * s[2], blue[1] * s[2], blue[2] * s[2]],
        ])
    }
}

impl ColorSpaceId {
    pub fn color_space(self) -> &'static RgbColorSpace {
        const REC709: RgbColorSpace = RgbColorSpace::rec709();
        const DISPLAY_P3: RgbColorSpace = RgbColorSpace::display_p3();
        const REC2020: RgbColorSpace = RgbColorSpace::rec2020();
        match self {
            ColorSpaceId::Rec709 => &REC709,
            ColorSpaceId::DisplayP3 => &DISPLAY_P3,
            ColorSpaceId::Rec2020 => &REC2020,
        }
    }
}

/// ICC profile bytes for a color space, synthesized on first use and
/// memoized for the life of the process. Safe for concurrent readers;
/// a race at most builds the same profile twice and keeps one.
pub fn icc_profile(id: ColorSpaceId) -> Result<&'static [u8], ExportError> {
    static CACHE: [OnceLock<Vec<u8>>; 3] = [const { OnceLock::new() }; 3];

    let slot = &CACHE[id.index()];
    if let Some(bytes) = slot.get() {
        return Ok(bytes);
    }
    let built = IccProfileBuilder::new(id.color_space()).build()?;
    Ok(slot.get_or_init(|| built))
}

/// CIE xy chromaticity to XYZ with Y = 1.
fn xy_to_xyz(c: Chromaticity) -> [f64; 3] {
    [c.x / c.y, 1.0, (1.0 - c.x - c.y) / c.y]
}

/// Multiply a row-major 3x3 matrix by a column vector.
fn mul_vector(matrix: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    let mut result = [0.0; 3];
    for i in 0..3 {
        result[i] = matrix[i][0] * v[0] + matrix[i][1] * v[1] + matrix[i][2] * v[2];
    }
    result
}

fn invert_matrix(matrix: [[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let det = matrix[0][0] * (matrix[1][1] * matrix[2][2] - matrix[1][2] * matrix[2][1])
        - matrix[0][1] * (matrix[1][0] * matrix[2][2] - matrix[1][2] * matrix[2][0])
        + matrix[0][2] * (matrix[1][0] * matrix[2][1] - matrix[1][1] * matrix[2][0]);

    if det.abs() < 1e-10 {
        // Matrix is not invertible
        return None;
    }

    let inv_det = 1.0 / det;

    Some([
        [
            (matrix[1][1] * matrix[2][2] - matrix[1][2] * matrix[2][1]) * inv_det,
            (matrix[0][2] * matrix[2][1] - matrix[0][1] * matrix[2][2]) * inv_det,
            (matrix[0][1] * matrix[1][2] - matrix[0][2] * matrix[1][1]) * inv_det,
        ],
        [
            (matrix[1][2] * matrix[2][0] - matrix[1][0] * matrix[2][2]) * inv_det,
            (matrix[0][0] * matrix[2][2] - matrix[0][2] * matrix[2][0]) * inv_det,
            (matrix[0][2] * matrix[1][0] - matrix[0][0] * matrix[1][2]) * inv_det,
        ],
        [
            (matrix[1][0] * matrix[2][1] - matrix[1][1] * matrix[2][0]) * inv_det,
            (matrix[0][1] * matrix[2][0] - matrix[0][0] * matrix[2][1]) * inv_det,
            (matrix[0][0] * matrix[1][1] - matrix[0][1] * matrix[1][0]) * inv_det,
        ],
    ])
}
