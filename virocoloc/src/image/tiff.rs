use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek};
use std::path::Path;

use common::Buffer2;
use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use super::{max_projection, ImageLoader, LoadedImage, PixelSize, RawImage};
use crate::error::InputError;
use crate::mask::LabelMask;

/// Reads 8/16/32-bit unsigned or 32-bit float grayscale TIFFs. Multi-page
/// stacks are reduced to their maximum intensity projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffLoader;

impl ImageLoader for TiffLoader {
    fn load(&self, path: &Path) -> Result<LoadedImage, InputError> {
        let mut decoder = open_decoder(path)?;
        let pixel_size = read_pixel_size(&mut decoder);

        let mut planes = Vec::new();
        loop {
            let plane = read_plane(&mut decoder, path, to_f32)?;
            if let Some(first) = planes.first() {
                if !plane.same_dimensions(first) {
                    return Err(InputError::InconsistentPages {
                        path: path.to_path_buf(),
                    });
                }
            }
            planes.push(plane);

            if !decoder.more_images() {
                break;
            }
            decoder.next_image().map_err(|e| tiff_error(path, e))?;
        }

        if planes.len() > 1 {
            tracing::debug!(path = %path.display(), pages = planes.len(), "Max-projecting stack");
        }

        let pixels = max_projection(&planes).ok_or_else(|| InputError::Empty {
            path: path.to_path_buf(),
        })?;

        Ok(LoadedImage {
            path: path.to_path_buf(),
            pixels,
            pixel_size,
        })
    }
}

/// Read the first page of an integer label TIFF.
pub fn read_label_tiff(path: &Path) -> Result<LabelMask, InputError> {
    let mut decoder = open_decoder(path)?;
    let labels = read_plane(&mut decoder, path, to_label)?;
    Ok(LabelMask::new(labels))
}

/// Write a label mask as a 32-bit grayscale TIFF.
pub fn write_label_tiff(path: &Path, mask: &LabelMask) -> Result<(), InputError> {
    let buffer = mask.buffer();
    write_plane::<colortype::Gray32>(path, buffer.width(), buffer.height(), buffer.pixels())
}

/// Write an image as a 32-bit float grayscale TIFF.
pub fn write_float_tiff(path: &Path, image: &RawImage) -> Result<(), InputError> {
    write_plane::<colortype::Gray32Float>(path, image.width(), image.height(), image.pixels())
}

fn write_plane<C>(path: &Path, width: usize, height: usize, data: &[C::Inner]) -> Result<(), InputError>
where
    C: colortype::ColorType,
    [C::Inner]: tiff::encoder::TiffValue,
{
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(|e| tiff_error(path, e))?;
    encoder
        .write_image::<C>(width as u32, height as u32, data)
        .map_err(|e| tiff_error(path, e))
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, InputError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|e| tiff_error(path, e))?;
    Ok(decoder.with_limits(Limits::unlimited()))
}

type Convert<T> = fn(DecodingResult) -> Result<Vec<T>, String>;

fn read_plane<R: Read + Seek, T>(
    decoder: &mut Decoder<R>,
    path: &Path,
    convert: Convert<T>,
) -> Result<Buffer2<T>, InputError> {
    match decoder.colortype().map_err(|e| tiff_error(path, e))? {
        tiff::ColorType::Gray(_) => {}
        other => {
            return Err(InputError::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: format!("expected a grayscale image, found {other:?}"),
            });
        }
    }

    let (width, height) = decoder.dimensions().map_err(|e| tiff_error(path, e))?;
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return Err(InputError::Empty {
            path: path.to_path_buf(),
        });
    }

    let decoded = decoder.read_image().map_err(|e| tiff_error(path, e))?;
    let pixels = convert(decoded).map_err(|reason| InputError::UnsupportedFormat {
        path: path.to_path_buf(),
        reason,
    })?;

    if pixels.len() != width * height {
        return Err(InputError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: format!("decoded {} samples for a {width}x{height} page", pixels.len()),
        });
    }

    Ok(Buffer2::new(width, height, pixels))
}

fn to_f32(decoded: DecodingResult) -> Result<Vec<f32>, String> {
    match decoded {
        DecodingResult::U8(buf) => Ok(buf.into_iter().map(f32::from).collect()),
        DecodingResult::U16(buf) => Ok(buf.into_iter().map(f32::from).collect()),
        DecodingResult::U32(buf) => Ok(buf.into_iter().map(|v| v as f32).collect()),
        DecodingResult::F32(buf) => Ok(buf),
        _ => Err("sample format not supported".to_string()),
    }
}

fn to_label(decoded: DecodingResult) -> Result<Vec<u32>, String> {
    match decoded {
        DecodingResult::U8(buf) => Ok(buf.into_iter().map(u32::from).collect()),
        DecodingResult::U16(buf) => Ok(buf.into_iter().map(u32::from).collect()),
        DecodingResult::U32(buf) => Ok(buf),
        DecodingResult::I32(buf) => buf
            .into_iter()
            .map(|v| u32::try_from(v).map_err(|_| format!("negative label {v}")))
            .collect(),
        _ => Err("label maps must be unsigned integers".to_string()),
    }
}

/// XY size is the inverse of `XResolution`; Z spacing and unit come from
/// an ImageJ-style `ImageDescription`.
fn read_pixel_size<R: Read + Seek>(decoder: &mut Decoder<R>) -> PixelSize {
    let xy = decoder
        .find_tag(Tag::XResolution)
        .ok()
        .flatten()
        .and_then(value_as_f64)
        .filter(|res| res.is_finite() && *res > 0.0)
        .map(|res| 1.0 / res);

    let description = match decoder.find_tag(Tag::ImageDescription) {
        Ok(Some(Value::Ascii(text))) => Some(text),
        _ => None,
    };

    let mut pixel_size = PixelSize {
        xy,
        ..PixelSize::default()
    };
    if let Some(description) = description {
        for line in description.lines() {
            match line.split_once('=') {
                Some(("spacing", value)) => pixel_size.z = value.trim().parse().ok(),
                Some(("unit", value)) => pixel_size.unit = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }
    pixel_size
}

fn value_as_f64(value: Value) -> Option<f64> {
    match value {
        Value::Rational(num, den) if den != 0 => Some(num as f64 / den as f64),
        Value::RationalBig(num, den) if den != 0 => Some(num as f64 / den as f64),
        Value::Float(v) => Some(v as f64),
        Value::Double(v) => Some(v),
        Value::List(values) => values.into_iter().next().and_then(value_as_f64),
        _ => None,
    }
}

fn io_error(path: &Path, source: std::io::Error) -> InputError {
    InputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn tiff_error(path: &Path, source: tiff::TiffError) -> InputError {
    InputError::Tiff {
        path: path.to_path_buf(),
        source,
    }
}
