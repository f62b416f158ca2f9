//! Raster reading and NDVI normalization
//!
//! Loads band 1 of a GeoTIFF, masks the no-data sentinel declared in the
//! file's own `GDAL_NODATA` tag and rescales the 8-bit NDVI encoding back to
//! the physical index range by dividing by 255.
//!
//! Masked pixels become `None` and stay unknown through every later
//! computation; they are never read as zero.

pub mod geotransform;

pub use geotransform::GeoTransform;

use crate::constants::{NDVI_SCALE, geotiff_tags};
use crate::{Error, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::debug;

/// One normalized single-band raster
///
/// Samples are stored row-major; `None` marks no-data.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterFrame {
    data: Vec<Option<f64>>,
    width: usize,
    height: usize,
    transform: GeoTransform,
    nodata: Option<f64>,
}

impl RasterFrame {
    /// Mask and rescale raw encoded samples
    ///
    /// Samples equal to `nodata` (or NaN) become missing; every other sample
    /// is divided by [`NDVI_SCALE`].
    pub fn from_encoded(
        samples: Vec<f64>,
        width: usize,
        height: usize,
        transform: GeoTransform,
        nodata: Option<f64>,
    ) -> Result<Self> {
        if samples.len() != width * height {
            return Err(Error::raster(
                "<memory>",
                format!(
                    "sample count {} does not match {}x{} grid",
                    samples.len(),
                    width,
                    height
                ),
            ));
        }

        let data = samples
            .into_iter()
            .map(|value| normalize_sample(value, nodata))
            .collect();

        Ok(Self {
            data,
            width,
            height,
            transform,
            nodata,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// The sentinel declared by the source file, if any
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Normalized value at (col, row); `None` when masked or out of bounds
    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.data[row * self.width + col]
    }

    /// Number of pixels that carry a measurement
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_some()).count()
    }
}

fn normalize_sample(value: f64, nodata: Option<f64>) -> Option<f64> {
    if value.is_nan() {
        return None;
    }
    match nodata {
        Some(sentinel) if value == sentinel => None,
        _ => Some(value / NDVI_SCALE),
    }
}

/// Read band 1 of a GeoTIFF and normalize it
pub fn read_raster(path: &Path) -> Result<RasterFrame> {
    let file_label = path.display().to_string();
    let file = File::open(path)
        .map_err(|e| Error::io(format!("Failed to open raster {}", file_label), e))?;

    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| Error::tiff(&file_label, e))?
        .with_limits(Limits::unlimited());

    match decoder.colortype().map_err(|e| Error::tiff(&file_label, e))? {
        ColorType::Gray(_) => {}
        other => {
            return Err(Error::raster(
                &file_label,
                format!("expected a single-band raster, found {:?}", other),
            ));
        }
    }

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::tiff(&file_label, e))?;
    let nodata = read_nodata(&mut decoder, &file_label)?;
    let transform = read_transform(&mut decoder, &file_label)?;

    let samples = match decoder
        .read_image()
        .map_err(|e| Error::tiff(&file_label, e))?
    {
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        _ => {
            return Err(Error::raster(&file_label, "unsupported sample format"));
        }
    };

    debug!(
        "Read raster {} ({}x{}, nodata={:?})",
        file_label, width, height, nodata
    );

    RasterFrame::from_encoded(samples, width as usize, height as usize, transform, nodata)
        .map_err(|e| match e {
            Error::Raster { message, .. } => Error::raster(&file_label, message),
            other => other,
        })
}

fn read_nodata<R>(decoder: &mut Decoder<R>, file_label: &str) -> Result<Option<f64>>
where
    R: std::io::Read + std::io::Seek,
{
    let tag = Tag::from_u16_exhaustive(geotiff_tags::GDAL_NODATA);
    let Some(value) = decoder
        .find_tag(tag)
        .map_err(|e| Error::tiff(file_label, e))?
    else {
        return Ok(None);
    };

    let text = value
        .into_string()
        .map_err(|e| Error::tiff(file_label, e))?;
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if text.eq_ignore_ascii_case("nan") {
        // NaN samples are always masked
        return Ok(None);
    }
    text.parse::<f64>().map(Some).map_err(|_| {
        Error::raster(file_label, format!("unparseable GDAL_NODATA value '{}'", text))
    })
}

fn read_transform<R>(decoder: &mut Decoder<R>, file_label: &str) -> Result<GeoTransform>
where
    R: std::io::Read + std::io::Seek,
{
    let mut f64_tag = |code: u16| -> Result<Option<Vec<f64>>> {
        match decoder
            .find_tag(Tag::from_u16_exhaustive(code))
            .map_err(|e| Error::tiff(file_label, e))?
        {
            Some(value) => value
                .into_f64_vec()
                .map(Some)
                .map_err(|e| Error::tiff(file_label, e)),
            None => Ok(None),
        }
    };

    if let Some(matrix) = f64_tag(geotiff_tags::MODEL_TRANSFORMATION)? {
        return GeoTransform::from_model_transformation(&matrix)
            .ok_or_else(|| Error::raster(file_label, "malformed ModelTransformation tag"));
    }

    let scale = f64_tag(geotiff_tags::MODEL_PIXEL_SCALE)?;
    let tiepoint = f64_tag(geotiff_tags::MODEL_TIEPOINT)?;
    match (scale, tiepoint) {
        (Some(scale), Some(tiepoint)) => GeoTransform::from_scale_and_tiepoint(&scale, &tiepoint)
            .ok_or_else(|| Error::raster(file_label, "malformed pixel scale or tiepoint tag")),
        _ => Err(Error::raster(
            file_label,
            "no geotransform (ModelTransformation or PixelScale+Tiepoint) present",
        )),
    }
}

#[cfg(test)]
pub(crate) mod tests;
