//! Native GeoTIFF reading/writing built on the `tiff` crate.
//!
//! Bands may be stored either interleaved in one image (chunky RGB, RGBA or
//! CMYK samples) or as one page per band; both decode to the same
//! [`BandImage`]. Georeferencing is read from ModelPixelScale/ModelTiepoint
//! and the EPSG code from the GeoKey directory.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{BandImage, GeoTransform, Raster};
use ndarray::Array3;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, Gray8};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::ColorType;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Read selected bands of a GeoTIFF.
///
/// `bands` are 1-based indices in file order, as in most raster tooling;
/// the returned image holds them in the order requested.
pub fn read_bands<P: AsRef<Path>>(path: P, bands: &[usize]) -> Result<BandImage> {
    let image = read_band_image(path)?;
    let zero_based = bands
        .iter()
        .map(|&b| {
            b.checked_sub(1).ok_or(Error::InvalidParameter {
                name: "band",
                value: b.to_string(),
                reason: "band indices are 1-based".into(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    image.select(&zero_based)
}

/// Read every band of a GeoTIFF file.
pub fn read_band_image<P: AsRef<Path>>(path: P) -> Result<BandImage> {
    let file = File::open(path.as_ref())?;
    decode_band_image(BufReader::new(file))
}

/// Read every band of a GeoTIFF held in memory.
pub fn read_band_image_from_buffer(data: &[u8]) -> Result<BandImage> {
    decode_band_image(Cursor::new(data))
}

fn tiff_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Tiff(format!("{context}: {e}"))
}

fn decode_band_image<R: Read + Seek>(reader: R) -> Result<BandImage> {
    let mut decoder = Decoder::new(reader).map_err(|e| tiff_err("cannot open TIFF", e))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| tiff_err("cannot read dimensions", e))?;
    let (rows, cols) = (height as usize, width as usize);
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let transform = read_geotransform(&mut decoder);
    let crs = read_crs(&mut decoder);

    let mut bands: Vec<Vec<f64>> = Vec::new();
    loop {
        let page_dims = decoder
            .dimensions()
            .map_err(|e| tiff_err("cannot read dimensions", e))?;
        if page_dims != (width, height) {
            return Err(Error::DimensionMismatch {
                eb: bands.len() + 1,
                eh: rows,
                ew: cols,
                ab: bands.len() + 1,
                ah: page_dims.1 as usize,
                aw: page_dims.0 as usize,
            });
        }

        let samples = samples_per_pixel(
            decoder
                .colortype()
                .map_err(|e| tiff_err("cannot read color type", e))?,
        )?;
        let interleaved = decode_samples(
            decoder
                .read_image()
                .map_err(|e| tiff_err("cannot read image data", e))?,
        )?;

        if interleaved.len() != rows * cols * samples {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        for s in 0..samples {
            bands.push(interleaved.iter().skip(s).step_by(samples).copied().collect());
        }

        if !decoder.more_images() {
            break;
        }
        decoder
            .next_image()
            .map_err(|e| tiff_err("cannot advance to next page", e))?;
    }

    let count = bands.len();
    let data = Array3::from_shape_vec((count, rows, cols), bands.concat())
        .map_err(|e| Error::Other(e.to_string()))?;

    let mut image = BandImage::new(data);
    if let Some(transform) = transform {
        image.set_transform(transform);
    }
    image.set_crs(crs);
    Ok(image)
}

fn samples_per_pixel(color: ColorType) -> Result<usize> {
    match color {
        ColorType::Gray(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) => Ok(3),
        ColorType::RGBA(_) | ColorType::CMYK(_) => Ok(4),
        other => Err(Error::UnsupportedDataType(format!(
            "unsupported TIFF color type {other:?}"
        ))),
    }
}

fn decode_samples(result: DecodingResult) -> Result<Vec<f64>> {
    let data = match result {
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF sample format".to_string(),
            ))
        }
    };
    Ok(data)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT)).ok()?;
    GeoTransform::from_tiepoint(&tiepoint, &scale)
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::Unknown(GEO_KEY_DIRECTORY)).ok()?;
    // header: version, revision, minor, key count; then 4 shorts per key
    keys.get(4..)?
        .chunks_exact(4)
        .find(|entry| {
            (entry[0] == PROJECTED_CS_TYPE_KEY || entry[0] == GEOGRAPHIC_TYPE_KEY)
                && entry[1] == 0
        })
        .map(|entry| CRS::from_epsg(entry[3] as u32))
}

/// Write a band image as one Float32 page per band.
pub fn write_band_image<P: AsRef<Path>>(image: &BandImage, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_band_image(image, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Encode a band image into an in-memory GeoTIFF.
pub fn write_band_image_to_buffer(image: &BandImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_band_image(image, &mut Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_band_image<W: Write + Seek>(image: &BandImage, writer: W) -> Result<()> {
    if image.is_empty() {
        return Err(Error::InvalidDimensions {
            width: image.width(),
            height: image.height(),
        });
    }

    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_err("TIFF encoder error", e))?;
    let (width, height) = (image.width() as u32, image.height() as u32);

    for b in 0..image.band_count() {
        let data: Vec<f32> = image.band(b)?.iter().map(|&v| v as f32).collect();
        let mut page = encoder
            .new_image::<Gray32Float>(width, height)
            .map_err(|e| tiff_err("cannot create TIFF page", e))?;
        write_geo_tags(page.encoder(), image.transform(), image.crs())?;
        page.write_data(&data)
            .map_err(|e| tiff_err("cannot write image data", e))?;
    }
    Ok(())
}

/// Write a binary change mask as a single-band `u8` GeoTIFF.
pub fn write_mask<P: AsRef<Path>>(mask: &Raster<u8>, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    {
        let mut encoder =
            TiffEncoder::new(&mut writer).map_err(|e| tiff_err("TIFF encoder error", e))?;
        let (rows, cols) = mask.shape();
        let data: Vec<u8> = mask.data().iter().copied().collect();
        let mut page = encoder
            .new_image::<Gray8>(cols as u32, rows as u32)
            .map_err(|e| tiff_err("cannot create TIFF page", e))?;
        write_geo_tags(page.encoder(), mask.transform(), mask.crs())?;
        page.write_data(&data)
            .map_err(|e| tiff_err("cannot write mask data", e))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    transform: &GeoTransform,
    crs: Option<&CRS>,
) -> Result<()> {
    let (tiepoint, scale) = transform.to_tiepoint();
    dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| tiff_err("cannot write scale tag", e))?;
    dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| tiff_err("cannot write tiepoint tag", e))?;

    // GTRasterType = RasterPixelIsArea; model type and CS code follow the CRS
    let mut keys: Vec<u16> = vec![1, 1, 0, 2, GT_RASTER_TYPE_KEY, 0, 1, 1];
    match crs.map(|c| (c.is_geographic(), c.epsg())) {
        Some((geographic, code)) if code <= u16::MAX as u32 => {
            let (model, key) = if geographic {
                (2, GEOGRAPHIC_TYPE_KEY)
            } else {
                (1, PROJECTED_CS_TYPE_KEY)
            };
            keys[3] = 3;
            keys.splice(4..4, [GT_MODEL_TYPE_KEY, 0, 1, model]);
            keys.extend_from_slice(&[key, 0, 1, code as u16]);
        }
        _ => {
            keys.splice(4..4, [GT_MODEL_TYPE_KEY, 0, 1, 1]);
        }
    }
    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &keys[..])
        .map_err(|e| tiff_err("cannot write geokey tag", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn sample_image() -> BandImage {
        let mut img = BandImage::constant(4, 6, &[10.0, 20.0, 30.0, 40.0]);
        img.set_transform(GeoTransform::new(500_000.0, 4_000_000.0, 10.0, -10.0));
        img.set_crs(Some(CRS::from_epsg(32633)));
        img
    }

    #[test]
    fn test_band_image_buffer_roundtrip() {
        let img = sample_image();
        let buf = write_band_image_to_buffer(&img).unwrap();
        let back = read_band_image_from_buffer(&buf).unwrap();

        assert_eq!(back.shape(), (4, 4, 6));
        assert_relative_eq!(back.band(3).unwrap()[[3, 5]], 40.0);
        assert_eq!(back.transform(), img.transform());
        assert_eq!(back.crs().map(|c| c.epsg()), Some(32633));
    }

    #[test]
    fn test_interleaved_four_samples_split_into_bands() {
        let (cols, rows) = (3u32, 2u32);
        let pixels: Vec<u8> = (0..cols * rows)
            .flat_map(|i| {
                let i = i as u8;
                [i, 100 + i, 150 + i, 200 + i]
            })
            .collect();
        let mut buf = Vec::new();
        {
            let mut encoder = TiffEncoder::new(Cursor::new(&mut buf)).unwrap();
            encoder
                .write_image::<tiff::encoder::colortype::RGBA8>(cols, rows, &pixels)
                .unwrap();
        }

        let img = read_band_image_from_buffer(&buf).unwrap();
        assert_eq!(img.shape(), (4, 2, 3));
        assert_relative_eq!(img.band(0).unwrap()[[1, 2]], 5.0);
        assert_relative_eq!(img.band(3).unwrap()[[0, 1]], 201.0);
    }

    #[test]
    fn test_read_bands_is_one_based() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aoi.tif");
        write_band_image(&sample_image(), &path).unwrap();

        let picked = read_bands(&path, &[4, 1]).unwrap();
        assert_eq!(picked.band_count(), 2);
        assert_relative_eq!(picked.band(0).unwrap()[[0, 0]], 40.0);
        assert_relative_eq!(picked.band(1).unwrap()[[0, 0]], 10.0);

        assert!(matches!(
            read_bands(&path, &[0]),
            Err(Error::InvalidParameter { name: "band", .. })
        ));
        assert!(matches!(
            read_bands(&path, &[8]),
            Err(Error::BandOutOfRange { band: 7, count: 4 })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_band_image("/nonexistent/landwatch/t1.tif").unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_write_mask() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.tif");
        let img = sample_image();
        let mut data = Array2::<u8>::zeros((4, 6));
        data[[1, 2]] = 1;
        let mask = img.raster_like(data).unwrap();

        write_mask(&mask, &path).unwrap();
        let back = read_band_image(&path).unwrap();
        assert_eq!(back.shape(), (1, 4, 6));
        assert_relative_eq!(back.band(0).unwrap()[[1, 2]], 1.0);
        assert_relative_eq!(back.band(0).unwrap().sum(), 1.0);
    }
}
