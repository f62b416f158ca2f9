//! Zonal means of a normalized raster within district polygons
//!
//! A pixel belongs to a district when its centre lies strictly inside the
//! district geometry. Masked pixels are excluded from both the sum and the
//! count, so a district whose pixels are all masked has no mean (`None`),
//! which is a different fact from a mean of zero.

use crate::app::models::{RasterKey, VegetationObservation};
use crate::app::services::district_registry::{AdministrativeRegion, DistrictRegistry};
use crate::app::services::raster_reader::RasterFrame;
use geo::{Contains, Point};
use rayon::prelude::*;
use std::ops::Range;

/// Running sum of valid samples
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZonalAccumulator {
    pub sum: f64,
    pub count: usize,
}

impl ZonalAccumulator {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Arithmetic mean, or `None` when nothing was accumulated
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// One observation per district for the raster identified by `key`
///
/// Districts are processed in parallel; the output follows registry order.
pub fn zonal_means(
    frame: &RasterFrame,
    registry: &DistrictRegistry,
    key: &RasterKey,
) -> Vec<VegetationObservation> {
    registry
        .regions()
        .par_iter()
        .map(|region| {
            VegetationObservation::new(
                key.for_district(region.district.clone()),
                zonal_mean(frame, region),
            )
        })
        .collect()
}

/// Mean of the valid pixels whose centres fall inside the region
pub fn zonal_mean(frame: &RasterFrame, region: &AdministrativeRegion) -> Option<f64> {
    let (cols, rows) = pixel_window(frame, region)?;
    let transform = frame.transform();
    let mut acc = ZonalAccumulator::default();

    for row in rows {
        for col in cols.clone() {
            let Some(value) = frame.get(col, row) else {
                continue;
            };
            let (x, y) = transform.pixel_center(col, row);
            if region.geometry.contains(&Point::new(x, y)) {
                acc.add(value);
            }
        }
    }

    acc.mean()
}

/// Column and row ranges whose pixel centres can fall inside the region
///
/// Rotated transforms cannot be bounded cheaply and scan the whole frame.
fn pixel_window(
    frame: &RasterFrame,
    region: &AdministrativeRegion,
) -> Option<(Range<usize>, Range<usize>)> {
    let full = (0..frame.width(), 0..frame.height());
    let bounds = region.bounds()?;
    let transform = frame.transform();

    let (Some((c0, r0)), Some((c1, r1))) = (
        transform.invert_axis_aligned(bounds.min().x, bounds.min().y),
        transform.invert_axis_aligned(bounds.max().x, bounds.max().y),
    ) else {
        return Some(full);
    };

    let cols = centre_range(c0.min(c1), c0.max(c1), frame.width())?;
    let rows = centre_range(r0.min(r1), r0.max(r1), frame.height())?;
    Some((cols, rows))
}

/// Indices `i` in `0..len` with `lo <= i + 0.5 <= hi`
fn centre_range(lo: f64, hi: f64, len: usize) -> Option<Range<usize>> {
    let start = (lo - 0.5).ceil().max(0.0);
    let end = ((hi - 0.5).floor() + 1.0).min(len as f64);
    if !start.is_finite() || !end.is_finite() || end <= start {
        return None;
    }
    Some(start as usize..end as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::raster_reader::GeoTransform;
    use geo::{MultiPolygon, polygon};

    /// Square region covering [x0, x1] x [y0, y1]
    fn region(name: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> AdministrativeRegion {
        let geometry = MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ]]);
        AdministrativeRegion::new(name, name.to_uppercase(), "Test", geometry)
    }

    /// 4x2 frame covering x in [0, 4], y in [0, 2], one unit per pixel
    fn frame(encoded: Vec<f64>, nodata: Option<f64>) -> RasterFrame {
        RasterFrame::from_encoded(
            encoded,
            4,
            2,
            GeoTransform::north_up(0.0, 2.0, 1.0, 1.0),
            nodata,
        )
        .unwrap()
    }

    #[test]
    fn test_mean_of_pixels_inside_region() {
        // Region covers the left two columns of both rows
        let frame = frame(
            vec![51.0, 102.0, 255.0, 255.0, 51.0, 102.0, 255.0, 255.0],
            None,
        );
        let mean = zonal_mean(&frame, &region("x", 0.0, 0.0, 2.0, 2.0)).unwrap();
        assert!((mean - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_masked_pixels_excluded_from_numerator_and_denominator() {
        let frame = frame(
            vec![0.0, 127.5, 255.0, 255.0, 0.0, 127.5, 255.0, 255.0],
            Some(0.0),
        );
        let mean = zonal_mean(&frame, &region("x", 0.0, 0.0, 2.0, 2.0)).unwrap();
        assert!((mean - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_fully_masked_region_has_no_mean() {
        let frame = frame(vec![9.0, 9.0, 51.0, 51.0, 9.0, 9.0, 51.0, 51.0], Some(9.0));
        assert_eq!(zonal_mean(&frame, &region("x", 0.0, 0.0, 2.0, 2.0)), None);
        assert!(zonal_mean(&frame, &region("y", 2.0, 0.0, 4.0, 2.0)).is_some());
    }

    #[test]
    fn test_measured_zero_is_a_mean_of_zero() {
        let frame = frame(vec![0.0; 8], None);
        assert_eq!(zonal_mean(&frame, &region("x", 0.0, 0.0, 2.0, 2.0)), Some(0.0));
    }

    #[test]
    fn test_region_outside_raster_has_no_mean() {
        let frame = frame(vec![255.0; 8], None);
        assert_eq!(
            zonal_mean(&frame, &region("far", 100.0, 100.0, 101.0, 101.0)),
            None
        );
    }

    #[test]
    fn test_region_missing_every_pixel_centre_has_no_mean() {
        // Thin sliver between pixel centres
        let frame = frame(vec![255.0; 8], None);
        assert_eq!(zonal_mean(&frame, &region("thin", 0.6, 0.0, 1.4, 2.0)), None);
    }

    #[test]
    fn test_rotated_transform_scans_every_pixel() {
        let frame = RasterFrame::from_encoded(
            vec![255.0; 4],
            2,
            2,
            GeoTransform::new([0.0, 1.0, 0.1, 2.0, 0.1, -1.0]),
            None,
        )
        .unwrap();
        assert_eq!(zonal_mean(&frame, &region("x", -1.0, -1.0, 5.0, 5.0)), Some(1.0));
    }

    #[test]
    fn test_zonal_means_one_observation_per_region() {
        let frame = frame(
            vec![51.0, 51.0, 255.0, 255.0, 51.0, 51.0, 255.0, 255.0],
            None,
        );
        let registry = DistrictRegistry::from_regions(
            "Test",
            vec![
                region("east", 2.0, 0.0, 4.0, 2.0),
                region("west", 0.0, 0.0, 2.0, 2.0),
            ],
        )
        .unwrap();
        let key = RasterKey::new(4, 2019, "01to15").unwrap();

        let observations = zonal_means(&frame, &registry, &key);

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].key, key.for_district("east"));
        assert_eq!(observations[0].mean_ndvi, Some(1.0));
        assert_eq!(observations[1].key.district(), "west");
        assert!((observations[1].mean_ndvi.unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_centre_range_bounds() {
        assert_eq!(centre_range(0.0, 2.0, 4), Some(0..2));
        assert_eq!(centre_range(-3.0, 10.0, 4), Some(0..4));
        assert_eq!(centre_range(0.6, 1.4, 4), None);
        assert_eq!(centre_range(5.0, 6.0, 4), None);
    }
}
