use og1_core::model::{FieldValues, MeasurementStream, RawField};
use og1_core::normalize::{
    apply_vocabulary_attrs, convert_units, normalize_stream, rename_variables,
};
use og1_core::vocabulary::default_vocabulary;
use og1_core::warnings::{ConversionWarning, WarningSet};
use polars::prelude::*;

fn stream_of(fields: &[RawField]) -> MeasurementStream {
    MeasurementStream::from_fields("sg_data_point", fields).expect("valid fixture")
}

#[test]
fn renames_carry_qc_suffixes_in_upper_case() {
    let fields = vec![
        RawField::vector("temperature", "sg_data_point", FieldValues::Float(vec![10.0]))
            .with_attr("units", "degrees_Celsius"),
        RawField::vector("temperature_qc", "sg_data_point", FieldValues::Int(vec![1])),
        RawField::vector("temperature_raw", "sg_data_point", FieldValues::Float(vec![9.9])),
        RawField::vector(
            "temperature_raw_qc",
            "sg_data_point",
            FieldValues::Int(vec![1]),
        ),
        RawField::vector("eng_head", "sg_data_point", FieldValues::Float(vec![3.0])),
    ];
    let mut stream = stream_of(&fields);
    let mut warnings = WarningSet::new();

    rename_variables(&mut stream, default_vocabulary(), &mut warnings).expect("rename");

    assert!(stream.has_variable("TEMP"));
    assert!(stream.has_variable("TEMP_QC"));
    assert!(stream.has_variable("TEMP_RAW"));
    assert!(stream.has_variable("TEMP_RAW_QC"));
    // No vocabulary entry, so the engineering column passes through.
    assert!(stream.has_variable("eng_head"));
    assert!(warnings.is_empty());

    // Attributes travel with the rename.
    assert_eq!(stream.unit("TEMP"), Some("degrees_Celsius"));
    assert!(stream.attrs("temperature").is_none());
}

#[test]
fn rename_collisions_keep_the_source_column() {
    let fields = vec![
        RawField::vector("temperature", "sg_data_point", FieldValues::Float(vec![10.0])),
        RawField::vector("TEMP", "sg_data_point", FieldValues::Float(vec![11.0])),
    ];
    let mut stream = stream_of(&fields);
    let mut warnings = WarningSet::new();

    rename_variables(&mut stream, default_vocabulary(), &mut warnings).expect("rename");

    assert!(stream.has_variable("temperature"));
    assert!(stream.has_variable("TEMP"));
    assert_eq!(warnings.len(), 1);
    assert!(warnings.iter().any(|w| matches!(
        w,
        ConversionWarning::NameCollision { source, target }
            if source == "temperature" && target == "TEMP"
    )));
}

#[test]
fn vocabulary_attrs_fill_in_and_flag_conflicts() {
    let fields = vec![
        RawField::vector("TEMP", "sg_data_point", FieldValues::Float(vec![10.0])),
        RawField::vector("PSAL", "sg_data_point", FieldValues::Float(vec![34.5]))
            .with_attr("units", "PSU"),
    ];
    let mut stream = stream_of(&fields);
    let mut warnings = WarningSet::new();

    apply_vocabulary_attrs(&mut stream, default_vocabulary(), &mut warnings);

    // Absent attributes are inserted from the vocabulary.
    assert_eq!(stream.unit("TEMP"), Some("Celsius"));
    assert_eq!(
        stream
            .attrs("TEMP")
            .and_then(|attrs| attrs.get("standard_name"))
            .and_then(|v| v.as_str()),
        Some("sea_water_temperature")
    );

    // A disagreeing value is kept but reported.
    assert_eq!(stream.unit("PSAL"), Some("PSU"));
    assert!(warnings.iter().any(|w| matches!(
        w,
        ConversionWarning::AttributeConflict {
            variable,
            attribute,
            ..
        } if variable == "PSAL" && attribute == "units"
    )));
}

#[test]
fn unit_strings_are_reformatted_before_comparison() {
    let fields = vec![
        RawField::vector("TEMP", "sg_data_point", FieldValues::Float(vec![10.0]))
            .with_attr("units", "degrees_Celsius"),
    ];
    let mut stream = stream_of(&fields);
    let mut warnings = WarningSet::new();

    apply_vocabulary_attrs(&mut stream, default_vocabulary(), &mut warnings);

    // "degrees_Celsius" rewrites to "Celsius", which then matches the
    // vocabulary, so no conflict is raised.
    assert_eq!(stream.unit("TEMP"), Some("Celsius"));
    assert!(warnings.is_empty());
}

#[test]
fn conversions_rescale_toward_preferred_units() -> PolarsResult<()> {
    let fields = vec![
        RawField::vector(
            "HORZ_GLIDER_SPEED",
            "sg_data_point",
            FieldValues::Float(vec![100.0, 250.0]),
        )
        .with_attr("units", "cm s-1"),
        RawField::vector("PRES", "sg_data_point", FieldValues::Float(vec![10.0, 20.0]))
            .with_attr("units", "dbar"),
    ];
    let mut stream = stream_of(&fields);

    let converted = convert_units(&mut stream, default_vocabulary()).expect("convert");

    assert_eq!(converted, 1);
    assert_eq!(stream.unit("HORZ_GLIDER_SPEED"), Some("m s-1"));
    let speed = stream.frame.column("HORZ_GLIDER_SPEED")?.f64()?;
    assert_eq!(speed.get(0), Some(1.0));
    assert_eq!(speed.get(1), Some(2.5));

    // dbar is already preferred; the Pa conversion must not fire.
    assert_eq!(stream.unit("PRES"), Some("dbar"));
    let pres = stream.frame.column("PRES")?.f64()?;
    assert_eq!(pres.get(0), Some(10.0));
    Ok(())
}

#[test]
fn normalize_renames_the_axis_and_flags_unknown_axes() {
    let fields = vec![RawField::vector(
        "temperature",
        "sg_data_point",
        FieldValues::Float(vec![10.0]),
    )];
    let mut stream = stream_of(&fields);
    let mut warnings = WarningSet::new();

    normalize_stream(&mut stream, default_vocabulary(), &mut warnings).expect("normalize");
    assert_eq!(stream.axis, "N_MEASUREMENTS");
    assert!(warnings.is_empty());

    let mut odd = MeasurementStream::from_fields(
        "adcp_bin",
        &[RawField::vector(
            "velocity",
            "adcp_bin",
            FieldValues::Float(vec![0.1]),
        )],
    )
    .expect("valid fixture");
    normalize_stream(&mut odd, default_vocabulary(), &mut warnings).expect("normalize");
    assert_eq!(odd.axis, "adcp_bin");
    assert!(warnings.iter().any(|w| matches!(
        w,
        ConversionWarning::MissingVocabulary { context } if context == "dimension adcp_bin"
    )));
}
