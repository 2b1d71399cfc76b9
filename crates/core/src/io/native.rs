//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate for TIFF I/O. Georeferencing is carried in the
//! ModelPixelScale/ModelTiepoint tags, the CRS as an EPSG code in the
//! GeoKeyDirectory, and the no-data value in the GDAL_NODATA ASCII tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, PixelGrid, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray32Float, RGBA8};
use tiff::encoder::{ImageEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Requested cloud-optimized layout. The native writer always emits a
    /// striped GeoTIFF; the flag is carried so callers can report it.
    pub cloud_optimized: bool,
}

/// Read one band of a GeoTIFF file into a Raster
///
/// `band` selects a sample of a multi-sample image (0-based, default 0).
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file, band)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), band)
}

fn cast_all<S: num_traits::NumCast + Copy, T: RasterElement>(buf: Vec<S>) -> Vec<T> {
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

fn decode_geotiff<T, R>(reader: R, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    let pixels = rows * cols;
    if pixels == 0 || data.len() % pixels != 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    // Samples are interleaved per pixel
    let samples = data.len() / pixels;
    let band = band.unwrap_or(0);
    if band >= samples {
        return Err(Error::InvalidParameter {
            name: "band",
            value: band.to_string(),
            reason: format!("image has {} band(s)", samples),
        });
    }
    let data = if samples == 1 {
        data
    } else {
        data.into_iter().skip(band).step_by(samples).collect()
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Ok(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    if let Some(nodata) = read_nodata(&mut decoder) {
        raster.set_nodata(num_traits::cast(nodata));
    }

    Ok(raster)
}

fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE))
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT))
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// EPSG code from the GeoKeyDirectory, if one is stored inline.
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder
        .get_tag_u16_vec(Tag::Unknown(GEO_KEY_DIRECTORY))
        .ok()?;
    parse_geo_keys(&keys).map(CRS::from_epsg)
}

fn parse_geo_keys(keys: &[u16]) -> Option<u32> {
    let count = *keys.get(3)? as usize;
    let mut projected = None;
    let mut geographic = None;
    for entry in keys.get(4..4 + count * 4)?.chunks_exact(4) {
        // [key id, tag location, count, value]; location 0 means inline
        if entry[1] != 0 {
            continue;
        }
        match entry[0] {
            PROJECTED_CS_TYPE_KEY => projected = Some(entry[3] as u32),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(entry[3] as u32),
            _ => {}
        }
    }
    // 32767 is "user-defined"
    projected.or(geographic).filter(|&code| code != 32767)
}

fn read_nodata<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder
        .get_tag_ascii_string(Tag::Unknown(GDAL_NODATA))
        .ok()?;
    let text = text.trim_end_matches('\0').trim();
    if text.eq_ignore_ascii_case("nan") {
        Some(f64::NAN)
    } else {
        text.parse().ok()
    }
}

fn build_geo_keys(crs: Option<&CRS>) -> Vec<u16> {
    let mut entries: Vec<[u16; 4]> = Vec::new();
    let code = crs
        .and_then(|c| c.epsg())
        .and_then(|code| u16::try_from(code).ok());
    match (code, crs.is_some_and(|c| c.is_geographic())) {
        (Some(code), true) => {
            entries.push([GT_MODEL_TYPE_KEY, 0, 1, 2]);
            entries.push([GT_RASTER_TYPE_KEY, 0, 1, 1]);
            entries.push([GEOGRAPHIC_TYPE_KEY, 0, 1, code]);
        }
        (Some(code), false) => {
            entries.push([GT_MODEL_TYPE_KEY, 0, 1, 1]);
            entries.push([GT_RASTER_TYPE_KEY, 0, 1, 1]);
            entries.push([PROJECTED_CS_TYPE_KEY, 0, 1, code]);
        }
        (None, _) => {
            entries.push([GT_MODEL_TYPE_KEY, 0, 1, 1]);
            entries.push([GT_RASTER_TYPE_KEY, 0, 1, 1]);
        }
    }
    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.iter().flatten());
    keys
}

fn write_geo_tags<W, C, K>(
    image: &mut ImageEncoder<'_, W, C, K>,
    transform: &GeoTransform,
    crs: Option<&CRS>,
) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
    C: ColorType,
    K: TiffKind,
{
    let scale = [transform.pixel_width, transform.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    let geokeys = build_geo_keys(crs);
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;
    Ok(())
}

/// Write a Raster to a GeoTIFF file as 32-bit float
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = BufWriter::new(File::create(path.as_ref())?);
    encode_geotiff(raster, file, options.unwrap_or_default())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, _options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    let nodata = raster.nodata();

    // No-data cells are written as NaN
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if v.is_nodata(nodata) {
                f32::NAN
            } else {
                num_traits::cast(v).unwrap_or(f32::NAN)
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    write_geo_tags(&mut image, raster.transform(), raster.crs())?;
    image
        .encoder()
        .write_tag(Tag::Unknown(GDAL_NODATA), "nan")
        .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

/// Write interleaved RGBA8 pixels laid out on `grid` as a 4-band GeoTIFF
pub fn write_rgba_geotiff<P: AsRef<Path>>(pixels: &[u8], grid: &PixelGrid, path: P) -> Result<()> {
    if pixels.len() != grid.len() * 4 {
        return Err(Error::InvalidDimensions {
            width: grid.cols,
            height: grid.rows,
        });
    }
    let file = BufWriter::new(File::create(path.as_ref())?);
    let mut encoder =
        TiffEncoder::new(file).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;
    let mut image = encoder
        .new_image::<RGBA8>(grid.cols as u32, grid.rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;
    write_geo_tags(&mut image, &grid.transform, grid.crs.as_ref())?;
    image
        .write_data(pixels)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;
    Ok(())
}
