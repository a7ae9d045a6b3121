//! End-to-end assembly and serving against synthetic DICOM payloads.

use dicom::core::{DataElement, PrimitiveValue, VR, dicom_value};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use dicom_dictionary_std::tags;

use mpr_volume::{
    AssembleError, CaseId, EngineError, MprEngine, Plane, VolumeStore, assembler, slice,
};

/// Explicit VR Little Endian.
const TRANSFER_SYNTAX: &str = "1.2.840.10008.1.2.1";
/// CT Image Storage.
const SOP_CLASS: &str = "1.2.840.10008.5.1.4.1.1.2";

#[derive(Clone)]
struct SliceSpec {
    location: Option<f32>,
    instance_number: Option<i32>,
    rows: u16,
    columns: u16,
    /// Constant raw value for every pixel.
    fill: u16,
    rescale: Option<(f32, f32)>,
    thickness: Option<f32>,
    spacing: Option<(f32, f32)>,
    window: Option<(&'static str, &'static str)>,
}

impl Default for SliceSpec {
    fn default() -> Self {
        Self {
            location: None,
            instance_number: None,
            rows: 4,
            columns: 4,
            fill: 0,
            rescale: None,
            thickness: None,
            spacing: None,
            window: None,
        }
    }
}

impl SliceSpec {
    fn at(location: f32, fill: u16) -> Self {
        Self {
            location: Some(location),
            fill,
            ..Self::default()
        }
    }

    fn build(&self) -> Vec<u8> {
        let mut object = InMemDicomObject::new_empty();
        object.put(DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            dicom_value!(Str, SOP_CLASS),
        ));
        object.put(DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            dicom_value!(Str, "1.2.826.0.1.3680043.8.498.1"),
        ));
        object.put(DataElement::new(
            tags::MODALITY,
            VR::CS,
            dicom_value!(Str, "CT"),
        ));
        object.put(DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            dicom_value!(Str, "MONOCHROME2"),
        ));
        object.put(DataElement::new(
            tags::SAMPLES_PER_PIXEL,
            VR::US,
            dicom_value!(U16, [1]),
        ));
        object.put(DataElement::new(
            tags::ROWS,
            VR::US,
            dicom_value!(U16, [self.rows]),
        ));
        object.put(DataElement::new(
            tags::COLUMNS,
            VR::US,
            dicom_value!(U16, [self.columns]),
        ));
        object.put(DataElement::new(
            tags::BITS_ALLOCATED,
            VR::US,
            dicom_value!(U16, [16]),
        ));
        object.put(DataElement::new(
            tags::BITS_STORED,
            VR::US,
            dicom_value!(U16, [16]),
        ));
        object.put(DataElement::new(
            tags::HIGH_BIT,
            VR::US,
            dicom_value!(U16, [15]),
        ));
        object.put(DataElement::new(
            tags::PIXEL_REPRESENTATION,
            VR::US,
            dicom_value!(U16, [0]),
        ));

        if let Some(location) = self.location {
            object.put(DataElement::new(
                tags::SLICE_LOCATION,
                VR::DS,
                PrimitiveValue::from(location.to_string()),
            ));
        }
        if let Some(number) = self.instance_number {
            object.put(DataElement::new(
                tags::INSTANCE_NUMBER,
                VR::IS,
                PrimitiveValue::from(number.to_string()),
            ));
        }
        if let Some((slope, intercept)) = self.rescale {
            object.put(DataElement::new(
                tags::RESCALE_SLOPE,
                VR::DS,
                PrimitiveValue::from(slope.to_string()),
            ));
            object.put(DataElement::new(
                tags::RESCALE_INTERCEPT,
                VR::DS,
                PrimitiveValue::from(intercept.to_string()),
            ));
        }
        if let Some(thickness) = self.thickness {
            object.put(DataElement::new(
                tags::SLICE_THICKNESS,
                VR::DS,
                PrimitiveValue::from(thickness.to_string()),
            ));
        }
        if let Some((row, column)) = self.spacing {
            object.put(DataElement::new(
                tags::PIXEL_SPACING,
                VR::DS,
                dicom_value!(Strs, [row.to_string(), column.to_string()]),
            ));
        }
        if let Some((center, width)) = self.window {
            object.put(DataElement::new(
                tags::WINDOW_CENTER,
                VR::DS,
                dicom_value!(Str, center),
            ));
            object.put(DataElement::new(
                tags::WINDOW_WIDTH,
                VR::DS,
                dicom_value!(Str, width),
            ));
        }

        let pixels = vec![self.fill; usize::from(self.rows) * usize::from(self.columns)];
        object.put(DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::U16(pixels.into()),
        ));

        let file = object
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(TRANSFER_SYNTAX)
                    .media_storage_sop_class_uid(SOP_CLASS)
                    .media_storage_sop_instance_uid("1.2.826.0.1.3680043.8.498.1"),
            )
            .expect("file meta should build");
        let mut bytes = Vec::new();
        file.write_all(&mut bytes).expect("object should serialize");
        bytes
    }
}

#[test]
fn slices_stack_in_ascending_key_order_regardless_of_submission_order() {
    // Tags A..E at keys [30, 10, 50, 20, 40].
    let payloads: Vec<Vec<u8>> = [(30.0, 1), (10.0, 2), (50.0, 3), (20.0, 4), (40.0, 5)]
        .into_iter()
        .map(|(location, fill)| SliceSpec::at(location, fill).build())
        .collect();

    let (volume, metadata) = assembler::assemble(&payloads).unwrap();
    assert_eq!(volume.dim(), (5, 4, 4));
    assert_eq!(metadata.depth, 5);
    // Depth 0 is the slice at key 10 (B); depth 4 is key 50 (C).
    assert_eq!(volume.data()[[0, 0, 0]], 2.0);
    assert_eq!(volume.data()[[1, 0, 0]], 4.0);
    assert_eq!(volume.data()[[2, 0, 0]], 1.0);
    assert_eq!(volume.data()[[3, 0, 0]], 5.0);
    assert_eq!(volume.data()[[4, 0, 0]], 3.0);
}

#[test]
fn undecodable_payloads_are_skipped_not_fatal() {
    let payloads = vec![
        SliceSpec::at(0.0, 1).build(),
        b"not a dicom file at all".to_vec(),
        SliceSpec::at(1.0, 2).build(),
    ];
    let (volume, _) = assembler::assemble(&payloads).unwrap();
    assert_eq!(volume.dim().0, 2);
}

#[test]
fn fewer_than_two_decodable_slices_fail_with_insufficient_data() {
    let payloads = vec![SliceSpec::at(0.0, 1).build(), b"garbage".to_vec()];
    let error = assembler::assemble(&payloads).unwrap_err();
    assert!(matches!(
        error,
        AssembleError::InsufficientSlices { found: 1 }
    ));

    let error = assembler::assemble(&[]).unwrap_err();
    assert!(matches!(
        error,
        AssembleError::InsufficientSlices { found: 0 }
    ));
}

#[test]
fn mismatched_in_plane_dimensions_fail_the_batch() {
    let mut odd = SliceSpec::at(1.0, 2);
    odd.rows = 6;
    let payloads = vec![SliceSpec::at(0.0, 1).build(), odd.build()];
    let error = assembler::assemble(&payloads).unwrap_err();
    assert!(matches!(
        error,
        AssembleError::MismatchedDimensions { index: 1, .. }
    ));
}

#[test]
fn rescale_slope_and_intercept_apply_elementwise() {
    let mut spec = SliceSpec::at(0.0, 10);
    spec.rescale = Some((2.0, -100.0));
    let slice = slice::decode_slice(&spec.build()).unwrap();
    assert!(slice.pixels.iter().all(|&v| v == -80.0));
}

#[test]
fn ordering_key_falls_back_to_instance_number_then_zero() {
    let mut spec = SliceSpec::default();
    spec.instance_number = Some(7);
    let slice = slice::decode_slice(&spec.build()).unwrap();
    assert_eq!(slice.position, 7.0);

    let slice = slice::decode_slice(&SliceSpec::default().build()).unwrap();
    assert_eq!(slice.position, 0.0);
}

#[test]
fn metadata_comes_from_the_first_slice_in_sort_order() {
    let mut first = SliceSpec::at(-5.0, 1);
    first.thickness = Some(2.5);
    first.spacing = Some((0.5, 0.75));
    first.window = Some(("40", "400"));
    let mut second = SliceSpec::at(5.0, 2);
    second.thickness = Some(9.0);
    second.spacing = Some((3.0, 3.0));

    // Submit out of order; the slice at -5.0 sorts first.
    let payloads = vec![second.build(), first.build()];
    let (_, metadata) = assembler::assemble(&payloads).unwrap();
    assert_eq!(metadata.slice_thickness, Some(2.5));
    assert_eq!(metadata.pixel_spacing, Some((0.5, 0.75)));
    assert_eq!(metadata.window_center, 40.0);
    assert_eq!(metadata.window_width, 400.0);
    assert_eq!(metadata.modality.as_deref(), Some("CT"));
}

#[test]
fn auto_window_kicks_in_when_the_source_has_none() {
    // Raw fills 0 and 100: mean 50, stddev 50, so width is 200.
    let payloads = vec![SliceSpec::at(0.0, 0).build(), SliceSpec::at(1.0, 100).build()];
    let (_, metadata) = assembler::assemble(&payloads).unwrap();
    assert_eq!(metadata.window_center, 50.0);
    assert_eq!(metadata.window_width, 200.0);
}

#[test]
fn assembled_case_persists_volume_and_three_previews() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MprEngine::new(VolumeStore::new(dir.path()));
    let payloads: Vec<Vec<u8>> = (0..5)
        .map(|i| SliceSpec::at(i as f32, i as u16 * 10).build())
        .collect();

    let report = engine.assemble_case(CaseId(3), &payloads).unwrap();
    assert_eq!(report.metadata.depth, 5);
    assert!(report.previews.axial.exists());
    assert!(report.previews.coronal.exists());
    assert!(report.previews.sagittal.exists());

    // The persisted volume serves immediately.
    let png = engine
        .serve_slice(CaseId(3), &report.metadata, Plane::Axial, 2, None)
        .unwrap();
    let decoded = image::load_from_memory(&png).unwrap().to_luma8();
    assert_eq!((decoded.width(), decoded.height()), (4, 4));
}

#[test]
fn failed_assembly_persists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MprEngine::new(VolumeStore::new(dir.path()));
    let error = engine.assemble_case(CaseId(8), &[]).unwrap_err();
    assert!(matches!(
        error,
        EngineError::Assemble(AssembleError::InsufficientSlices { found: 0 })
    ));
    assert!(
        engine
            .serve_slice(
                CaseId(8),
                &assembled_metadata(),
                Plane::Axial,
                0,
                None
            )
            .is_err()
    );
}

fn assembled_metadata() -> mpr_volume::VolumeMetadata {
    let payloads = vec![SliceSpec::at(0.0, 1).build(), SliceSpec::at(1.0, 2).build()];
    assembler::assemble(&payloads).unwrap().1
}
