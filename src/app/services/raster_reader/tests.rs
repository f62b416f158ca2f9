//! Tests for raster reading and normalization

use super::*;
use std::path::PathBuf;
use tempfile::TempDir;
use tiff::encoder::{TiffEncoder, colortype};

/// Write a single-band 8-bit GeoTIFF with a north-up transform
///
/// `origin` is the top-left corner, `pixel_size` the ground size of a pixel.
pub fn write_geotiff(
    path: &Path,
    width: u32,
    height: u32,
    data: &[u8],
    nodata: Option<&str>,
    origin: (f64, f64),
    pixel_size: f64,
) {
    let mut file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(&mut file).unwrap();
    let mut image = encoder.new_image::<colortype::Gray8>(width, height).unwrap();
    image
        .encoder()
        .write_tag(
            Tag::from_u16_exhaustive(geotiff_tags::MODEL_PIXEL_SCALE),
            &[pixel_size, pixel_size, 0.0][..],
        )
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::from_u16_exhaustive(geotiff_tags::MODEL_TIEPOINT),
            &[0.0, 0.0, 0.0, origin.0, origin.1, 0.0][..],
        )
        .unwrap();
    if let Some(nodata) = nodata {
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(geotiff_tags::GDAL_NODATA), nodata)
            .unwrap();
    }
    image.write_data(data).unwrap();
}

fn temp_raster(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

#[test]
fn test_from_encoded_masks_sentinel_and_rescales() {
    let frame = RasterFrame::from_encoded(
        vec![0.0, 255.0, 127.5, 200.0],
        2,
        2,
        GeoTransform::north_up(0.0, 2.0, 1.0, 1.0),
        Some(200.0),
    )
    .unwrap();

    assert_eq!(frame.get(0, 0), Some(0.0));
    assert_eq!(frame.get(1, 0), Some(1.0));
    assert_eq!(frame.get(0, 1), Some(0.5));
    assert_eq!(frame.get(1, 1), None);
    assert_eq!(frame.valid_count(), 3);
}

#[test]
fn test_measured_zero_is_not_masked_without_sentinel() {
    let frame = RasterFrame::from_encoded(
        vec![0.0, f64::NAN],
        2,
        1,
        GeoTransform::north_up(0.0, 1.0, 1.0, 1.0),
        None,
    )
    .unwrap();

    assert_eq!(frame.get(0, 0), Some(0.0));
    assert_eq!(frame.get(1, 0), None);
    assert_eq!(frame.get(5, 0), None);
}

#[test]
fn test_from_encoded_rejects_mismatched_grid() {
    let result = RasterFrame::from_encoded(
        vec![1.0, 2.0, 3.0],
        2,
        2,
        GeoTransform::north_up(0.0, 0.0, 1.0, 1.0),
        None,
    );
    assert!(matches!(result, Err(Error::Raster { .. })));
}

#[test]
fn test_read_geotiff_uses_declared_nodata() {
    let dir = TempDir::new().unwrap();
    let path = temp_raster(&dir, "NDVI_apr_2019_01to15.tif");
    write_geotiff(&path, 3, 2, &[0, 51, 255, 250, 102, 250], Some("250"), (70.0, 22.0), 0.5);

    let frame = read_raster(&path).unwrap();

    assert_eq!(frame.width(), 3);
    assert_eq!(frame.height(), 2);
    assert_eq!(frame.nodata(), Some(250.0));
    assert_eq!(frame.get(0, 0), Some(0.0));
    assert_eq!(frame.get(1, 0), Some(0.2));
    assert_eq!(frame.get(2, 0), Some(1.0));
    assert_eq!(frame.get(0, 1), None);
    assert_eq!(frame.get(1, 1), Some(0.4));
    assert_eq!(frame.valid_count(), 4);
    assert_eq!(
        *frame.transform(),
        GeoTransform::north_up(70.0, 22.0, 0.5, 0.5)
    );
}

#[test]
fn test_read_geotiff_without_nodata_tag_keeps_every_pixel() {
    let dir = TempDir::new().unwrap();
    let path = temp_raster(&dir, "NDVI_may_2019_x.tif");
    write_geotiff(&path, 2, 1, &[0, 255], None, (0.0, 1.0), 1.0);

    let frame = read_raster(&path).unwrap();
    assert_eq!(frame.nodata(), None);
    assert_eq!(frame.valid_count(), 2);
}

#[test]
fn test_read_missing_file_is_io_error() {
    let result = read_raster(Path::new("/nonexistent/NDVI_apr_2019_x.tif"));
    assert!(matches!(result, Err(Error::Io { .. })));
}

#[test]
fn test_read_non_tiff_is_tiff_error() {
    let dir = TempDir::new().unwrap();
    let path = temp_raster(&dir, "NDVI_apr_2019_x.tif");
    std::fs::write(&path, b"not a tiff at all").unwrap();

    let error = read_raster(&path).unwrap_err();
    assert!(matches!(error, Error::Tiff { .. }));
    assert!(error.is_io());
}

#[test]
fn test_read_multiband_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = temp_raster(&dir, "NDVI_apr_2019_rgb.tif");
    {
        let mut file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(&mut file).unwrap();
        encoder
            .write_image::<colortype::RGB8>(1, 1, &[1, 2, 3])
            .unwrap();
    }

    assert!(matches!(read_raster(&path), Err(Error::Raster { .. })));
}

#[test]
fn test_read_without_georeferencing_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = temp_raster(&dir, "NDVI_apr_2019_plain.tif");
    {
        let mut file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(&mut file).unwrap();
        encoder
            .write_image::<colortype::Gray8>(2, 1, &[1, 2])
            .unwrap();
    }

    let error = read_raster(&path).unwrap_err();
    assert!(error.to_string().contains("no geotransform"));
}
