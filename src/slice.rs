//! Decoding of a single raw DICOM payload into a [`RawSlice`].

use chrono::NaiveDate;
use dicom::object::file::ReadPreamble;
use dicom::object::{FileDicomObject, InMemDicomObject, OpenFileOptions};
use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use dicom_dictionary_std::tags;
use ndarray::{Array2, s};
use thiserror::Error;

use crate::windowing::Window;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not readable DICOM: {0}")]
    Read(#[from] dicom::object::ReadError),

    #[error("payload carries no decodable pixel data: {0}")]
    PixelData(#[from] dicom::pixeldata::Error),
}

/// One decoded cross-section: the ordering key along the primary axis, the
/// rescaled pixel grid and whatever per-study metadata the source carried.
/// Ephemeral; only the assembled volume is persisted.
pub struct RawSlice {
    pub position: f32,
    /// Intensities with rescale slope/intercept already applied, shape
    /// (rows, columns).
    pub pixels: Array2<f32>,
    pub meta: SliceMeta,
}

#[derive(Clone, Debug, Default)]
pub struct SliceMeta {
    pub slice_thickness: Option<f32>,
    /// (row spacing, column spacing) in mm.
    pub pixel_spacing: Option<(f32, f32)>,
    pub modality: Option<String>,
    pub series_description: Option<String>,
    pub body_part_examined: Option<String>,
    pub study_date: Option<NaiveDate>,
    pub window: Option<Window>,
}

/// Decode one raw payload believed to be a single-slice DICOM object.
pub fn decode_slice(payload: &[u8]) -> Result<RawSlice, DecodeError> {
    let object = OpenFileOptions::new()
        .read_preamble(ReadPreamble::Auto)
        .from_reader(payload)?;
    let pixels = decode_pixels(&object)?;
    Ok(RawSlice {
        position: ordering_key(&object),
        pixels,
        meta: extract_meta(&object),
    })
}

fn decode_pixels(object: &FileDicomObject<InMemDicomObject>) -> Result<Array2<f32>, DecodeError> {
    let decoded = object.decode_pixel_data()?;
    // Stored values are wanted raw; the linear rescale is applied below so
    // that quantitative modalities (CT) end up in physical units.
    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
    let mut pixels = decoded
        .to_ndarray_with_options::<f32>(&options)?
        .slice_move(s![0, .., .., 0]);

    let slope = element_f32(object, tags::RESCALE_SLOPE);
    let intercept = element_f32(object, tags::RESCALE_INTERCEPT);
    if let (Some(slope), Some(intercept)) = (slope, intercept) {
        pixels.mapv_inplace(|value| value * slope + intercept);
    }
    Ok(pixels)
}

/// Ordering key priority: SliceLocation, then the third component of
/// ImagePositionPatient, then InstanceNumber. Slices carrying none of these
/// sort first at 0.0 and are effectively un-orderable; that is a known
/// limitation of the source data, not corrected here.
fn ordering_key(object: &FileDicomObject<InMemDicomObject>) -> f32 {
    if let Some(location) = element_f32(object, tags::SLICE_LOCATION) {
        return location;
    }
    if let Some(z) = object
        .element(tags::IMAGE_POSITION_PATIENT)
        .ok()
        .and_then(|e| e.to_multi_float32().ok())
        .and_then(|position| position.get(2).copied())
    {
        return z;
    }
    if let Some(number) = object
        .element(tags::INSTANCE_NUMBER)
        .ok()
        .and_then(|e| e.to_int::<i32>().ok())
    {
        return number as f32;
    }
    0.0
}

fn extract_meta(object: &FileDicomObject<InMemDicomObject>) -> SliceMeta {
    SliceMeta {
        slice_thickness: element_f32(object, tags::SLICE_THICKNESS),
        pixel_spacing: object
            .element(tags::PIXEL_SPACING)
            .ok()
            .and_then(|e| e.to_multi_float32().ok())
            .and_then(|spacing| match spacing[..] {
                [row, column, ..] => Some((row, column)),
                _ => None,
            }),
        modality: element_string(object, tags::MODALITY),
        series_description: element_string(object, tags::SERIES_DESCRIPTION),
        body_part_examined: element_string(object, tags::BODY_PART_EXAMINED),
        study_date: element_string(object, tags::STUDY_DATE)
            .and_then(|date| NaiveDate::parse_from_str(&date, "%Y%m%d").ok()),
        window: extract_window(object),
    }
}

/// WindowCenter/WindowWidth may be multi-valued; the first pair wins.
fn extract_window(object: &FileDicomObject<InMemDicomObject>) -> Option<Window> {
    let center = element_first_f32(object, tags::WINDOW_CENTER)?;
    let width = element_first_f32(object, tags::WINDOW_WIDTH)?;
    Some(Window::new(center, width))
}

fn element_f32(object: &FileDicomObject<InMemDicomObject>, tag: dicom::core::Tag) -> Option<f32> {
    object.element(tag).ok().and_then(|e| e.to_float32().ok())
}

fn element_first_f32(
    object: &FileDicomObject<InMemDicomObject>,
    tag: dicom::core::Tag,
) -> Option<f32> {
    object
        .element(tag)
        .ok()
        .and_then(|e| e.to_multi_float32().ok())
        .and_then(|values| values.first().copied())
}

fn element_string(
    object: &FileDicomObject<InMemDicomObject>,
    tag: dicom::core::Tag,
) -> Option<String> {
    object
        .element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
