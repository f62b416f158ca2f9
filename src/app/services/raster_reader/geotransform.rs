//! Affine pixel-to-coordinate mapping
//!
//! Coefficients follow the GDAL ordering
//! `[origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height]`:
//!
//! ```text
//! x = origin_x + col * pixel_width  + row * row_rotation
//! y = origin_y + col * column_rotation + row * pixel_height
//! ```
//!
//! where `(col, row)` addresses the top-left corner of a pixel.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    coefficients: [f64; 6],
}

impl GeoTransform {
    pub fn new(coefficients: [f64; 6]) -> Self {
        Self { coefficients }
    }

    /// North-up transform from an origin (top-left corner) and pixel size
    ///
    /// `pixel_height` is the positive ground size of a pixel; rows grow
    /// southwards.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self::new([origin_x, pixel_width, 0.0, origin_y, 0.0, -pixel_height])
    }

    /// Build from GeoTIFF `ModelPixelScale` and `ModelTiepoint` values
    ///
    /// Only the first tiepoint is used; it ties raster position (i, j) to
    /// model coordinates (x, y).
    pub fn from_scale_and_tiepoint(scale: &[f64], tiepoint: &[f64]) -> Option<Self> {
        if scale.len() < 2 || tiepoint.len() < 6 {
            return None;
        }
        let (sx, sy) = (scale[0], scale[1]);
        let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
        if sx == 0.0 || sy == 0.0 {
            return None;
        }
        Some(Self::new([x - i * sx, sx, 0.0, y + j * sy, 0.0, -sy]))
    }

    /// Build from a GeoTIFF `ModelTransformation` 4x4 row-major matrix
    pub fn from_model_transformation(matrix: &[f64]) -> Option<Self> {
        if matrix.len() < 8 {
            return None;
        }
        Some(Self::new([
            matrix[3], matrix[0], matrix[1], matrix[7], matrix[4], matrix[5],
        ]))
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.coefficients
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.coefficients[0], self.coefficients[3])
    }

    /// Signed pixel size (width, height); height is negative for north-up
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.coefficients[1], self.coefficients[5])
    }

    /// Whether the transform has no rotation/shear terms
    pub fn is_axis_aligned(&self) -> bool {
        self.coefficients[2] == 0.0 && self.coefficients[4] == 0.0
    }

    /// Model coordinates of a fractional raster position
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let [c, a, b, f, d, e] = self.coefficients;
        (c + col * a + row * b, f + col * d + row * e)
    }

    /// Model coordinates of the centre of pixel (col, row)
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Fractional raster position of a model coordinate
    ///
    /// Returns `None` for transforms with rotation terms or zero pixel size.
    pub fn invert_axis_aligned(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let [c, a, _, f, _, e] = self.coefficients;
        if !self.is_axis_aligned() || a == 0.0 || e == 0.0 {
            return None;
        }
        Some(((x - c) / a, (y - f) / e))
    }
}
