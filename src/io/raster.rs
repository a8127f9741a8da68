//! Decoding rendered payloads into `RasterBuffer`s.
use std::io::Cursor;

use tiff::decoder::{Decoder, DecodingResult};
use tracing::debug;

use crate::core::stats::{RasterBuffer, parse_raster};
use crate::error::{Error, Result};
use crate::io::imagery::RenderedPayload;
use crate::types::SampleType;

/// Decode a TIFF payload; band count is derived from the sample count.
pub fn decode_tiff(bytes: &[u8]) -> Result<RasterBuffer> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);

    let (data, sample_type): (Vec<f32>, SampleType) = match decoder.read_image()? {
        DecodingResult::U8(v) => (v.into_iter().map(f32::from).collect(), SampleType::Uint8),
        DecodingResult::U16(v) => (v.into_iter().map(f32::from).collect(), SampleType::Uint16),
        DecodingResult::F32(v) => (v, SampleType::Float32),
        DecodingResult::F64(v) => (v.into_iter().map(|x| x as f32).collect(), SampleType::Float32),
        _ => {
            return Err(Error::MalformedRaster(
                "unsupported TIFF sample format".into(),
            ));
        }
    };

    let pixels = width * height;
    if pixels == 0 || data.len() % pixels != 0 {
        return Err(Error::MalformedRaster(format!(
            "{} samples do not tile a {}x{} image",
            data.len(),
            width,
            height
        )));
    }
    let band_count = data.len() / pixels;
    debug!("Decoded {}x{}x{} {} TIFF", width, height, band_count, sample_type);
    RasterBuffer::new(data, width, height, band_count, sample_type)
}

/// Decode a payload that should hold `width`×`height`×`band_count` samples.
///
/// TIFF payloads are decoded and checked against the expected shape; raw
/// payloads are read as little-endian samples of `sample_type`. Encoded images
/// (png, jpeg) are not rasters and are refused.
pub fn decode_payload(
    payload: &RenderedPayload,
    width: usize,
    height: usize,
    band_count: usize,
    sample_type: SampleType,
) -> Result<RasterBuffer> {
    if payload.is_tiff() {
        let raster = decode_tiff(&payload.bytes)?;
        if raster.width != width || raster.height != height || raster.band_count != band_count {
            return Err(Error::MalformedRaster(format!(
                "TIFF is {}x{}x{}, expected {}x{}x{}",
                raster.width, raster.height, raster.band_count, width, height, band_count
            )));
        }
        return Ok(raster);
    }
    if !payload.is_raw_raster() {
        return Err(Error::MalformedRaster(format!(
            "expected raster samples, got {}",
            payload.content_type
        )));
    }
    parse_raster(&payload.bytes, width, height, band_count, sample_type)
}
