//! EXIF metadata and lens extraction for loaded sources.

use std::io::Cursor;

use exif::{Exif, In, Reader, Tag, Value};

use super::{ImageMetadata, LensInfo, Orientation};

/// Read camera metadata from RAW or bitmap bytes.
///
/// Missing or unreadable tags stay `None`; a file without any EXIF block
/// yields `ImageMetadata::default()`.
pub fn read_metadata(bytes: &[u8]) -> ImageMetadata {
    let mut cursor = Cursor::new(bytes);
    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => from_exif(&exif),
        Err(e) => {
            log::debug!("no EXIF block: {e}");
            ImageMetadata::default()
        }
    }
}

/// Read lens details from RAW or bitmap bytes.
///
/// Sources without EXIF, or without lens tags, give `LensInfo::default()`.
pub fn read_lens_info(bytes: &[u8]) -> LensInfo {
    let mut cursor = Cursor::new(bytes);
    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => lens_from_exif(&exif),
        Err(_) => LensInfo::default(),
    }
}

fn uint(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
}

fn text(exif: &Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY).and_then(|f| match f.value {
        Value::Ascii(ref parts) => parts
            .first()
            .map(|s| String::from_utf8_lossy(s).trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    })
}

/// The `index`-th rational of a tag; zero denominators read as missing.
fn rational(exif: &Exif, tag: Tag, index: usize) -> Option<f32> {
    exif.get_field(tag, In::PRIMARY).and_then(|f| match f.value {
        Value::Rational(ref v) => v
            .get(index)
            .filter(|r| r.denom != 0)
            .map(|r| r.to_f64() as f32),
        _ => None,
    })
}

fn from_exif(exif: &Exif) -> ImageMetadata {
    let shutter_speed = exif
        .get_field(Tag::ExposureTime, In::PRIMARY)
        .and_then(|f| match f.value {
            Value::Rational(ref v) if !v.is_empty() && v[0].denom != 0 => {
                Some(format_exposure(v[0].num, v[0].denom))
            }
            _ => None,
        });

    ImageMetadata {
        width: uint(exif, Tag::PixelXDimension).or_else(|| uint(exif, Tag::ImageWidth)),
        height: uint(exif, Tag::PixelYDimension).or_else(|| uint(exif, Tag::ImageLength)),
        orientation: uint(exif, Tag::Orientation)
            .map(Orientation::from)
            .unwrap_or_default(),
        camera_make: text(exif, Tag::Make),
        camera_model: text(exif, Tag::Model),
        date_taken: text(exif, Tag::DateTimeOriginal).or_else(|| text(exif, Tag::DateTime)),
        iso: uint(exif, Tag::PhotographicSensitivity),
        shutter_speed,
        aperture: rational(exif, Tag::FNumber, 0),
        focal_length: rational(exif, Tag::FocalLength, 0),
    }
}

fn lens_from_exif(exif: &Exif) -> LensInfo {
    // LensSpecification: min focal, max focal, f-number at each.
    let spec = |i| rational(exif, Tag::LensSpecification, i).filter(|v| *v > 0.0);
    LensInfo {
        lens_make: text(exif, Tag::LensMake),
        lens_model: text(exif, Tag::LensModel),
        lens_serial: text(exif, Tag::LensSerialNumber),
        min_focal: spec(0),
        max_focal: spec(1),
        max_aperture_at_min_focal: spec(2),
        max_aperture_at_max_focal: spec(3),
        max_aperture: rational(exif, Tag::MaxApertureValue, 0).map(apex_to_f_number),
        focal_length_in_35mm: uint(exif, Tag::FocalLengthIn35mmFilm).filter(|&v| v > 0),
    }
}

/// APEX aperture value to f-number: `2^(av / 2)`.
fn apex_to_f_number(av: f32) -> f32 {
    2f32.powf(av / 2.0)
}

/// "1/250" for fast shutters, "2.5" style seconds for long ones.
fn format_exposure(num: u32, denom: u32) -> String {
    if num == 0 {
        return "0".to_string();
    }
    if num < denom {
        let reciprocal = (denom as f64 / num as f64).round();
        format!("1/{reciprocal}")
    } else {
        let seconds = num as f64 / denom as f64;
        if seconds.fract() == 0.0 {
            format!("{seconds}")
        } else {
            format!("{seconds:.1}")
        }
    }
}
