use chrono::Utc;
use og1_core::archive::{
    read_dive_archive, read_mission_archive, write_dive_archive, write_mission_archive,
    ArchiveError,
};
use og1_core::model::{
    AttrMap, AttrValue, DiveRecord, FieldValues, MeasurementStream, MetadataSet, RawField,
    SensorDescriptor,
};
use og1_core::pipeline::{MissionDataset, SkippedDive};
use og1_core::sensors::SensorEntry;
use og1_core::warnings::{ConversionWarning, WarningSet};
use uuid::Uuid;

fn sample_record() -> DiveRecord {
    let mut attributes = MetadataSet::new();
    attributes.set("creator_name", "Fritz");
    attributes.set("dive_number", 12i64);
    attributes.set("magnetic_variation", -13.5);

    DiveRecord {
        dive_number: 12,
        fields: vec![
            RawField::vector(
                "temperature",
                "sg_data_point",
                FieldValues::Float(vec![10.0, 10.5, 11.0]),
            )
            .with_attr("units", "degrees_Celsius"),
            RawField::vector(
                "temperature_qc",
                "sg_data_point",
                FieldValues::Int(vec![1, 1, 4]),
            ),
            RawField::vector(
                "log_gps_lat",
                "gps_info",
                FieldValues::Float(vec![47.0, 47.1]),
            ),
            RawField::scalar("sg_cal_volmax", FieldValues::Float(vec![850.0])),
            RawField::scalar("log_TGT_NAME", FieldValues::Text(vec!["KEFLAVIK".to_string()])),
        ],
        attributes,
        sensors: vec![SensorDescriptor {
            source_attribute: "sg_cal_sbe_temp".to_string(),
            make_model: "Seabird unpumped CTD".to_string(),
            serial_number: Some("0123".to_string()),
            calibration_date: None,
            calibration_parameters: None,
        }],
    }
}

#[test]
fn dive_archives_round_trip_exactly() {
    let record = sample_record();
    let bytes = write_dive_archive(&record).expect("write");
    let restored = read_dive_archive(&bytes).expect("read");
    assert_eq!(restored, record);
}

#[test]
fn missing_float_samples_survive_the_json_null_detour() {
    let record = DiveRecord {
        dive_number: 3,
        fields: vec![RawField::scalar(
            "depth_avg_curr_east",
            FieldValues::Float(vec![0.02, f64::NAN]),
        )],
        attributes: MetadataSet::new(),
        sensors: Vec::new(),
    };
    let bytes = write_dive_archive(&record).expect("write");
    let restored = read_dive_archive(&bytes).expect("read");

    let values = restored.fields[0].values.as_floats().expect("floats");
    assert_eq!(values[0], 0.02);
    assert!(values[1].is_nan());
}

#[test]
fn mission_archives_round_trip_with_their_manifest() {
    let stream = MeasurementStream::from_fields(
        "N_MEASUREMENTS",
        &[
            RawField::vector(
                "TIME",
                "N_MEASUREMENTS",
                FieldValues::Float(vec![100.0, 200.0]),
            ),
            RawField::vector(
                "TEMP",
                "N_MEASUREMENTS",
                FieldValues::Float(vec![10.0, 11.0]),
            )
            .with_attr("units", "Celsius"),
        ],
    )
    .expect("valid fixture");

    let mut attributes = MetadataSet::new();
    attributes.set("title", "OceanGliders trajectory file");
    attributes.set("file_version", 1i64);

    let mut ctd_attrs = AttrMap::new();
    ctd_attrs.insert("sensor_type".to_string(), AttrValue::from("CTD"));
    let sensors = vec![SensorEntry {
        name: "SENSOR_CTD_0123".to_string(),
        attrs: ctd_attrs,
    }];

    let mut warnings = WarningSet::new();
    warnings.push(ConversionWarning::MissingVocabulary {
        context: "dimension adcp_bin".to_string(),
    });

    let dataset = MissionDataset {
        stream,
        attributes,
        sensors,
        warnings,
        skipped: vec![SkippedDive {
            dive_number: 7,
            reason: "required variable 'PRES' is missing during dive state".to_string(),
        }],
    };

    let id = Uuid::new_v4();
    let created = Utc::now();
    let bytes = write_mission_archive(&dataset, id, created).expect("write");
    let restored = read_mission_archive(&bytes).expect("read");

    assert_eq!(restored.manifest.format, "og1-mission/1");
    assert_eq!(restored.manifest.id, id);
    assert_eq!(restored.manifest.created, created);
    assert_eq!(restored.manifest.axis, "N_MEASUREMENTS");
    assert_eq!(restored.manifest.data_path, "measurements.parquet");

    let names: Vec<&str> = restored
        .manifest
        .variables
        .iter()
        .map(|v| v.name.as_str())
        .collect();
    assert_eq!(names, vec!["TIME", "TEMP"]);
    let temp = &restored.manifest.variables[1];
    assert_eq!(
        temp.attrs.get("units").and_then(|v| v.as_str()),
        Some("Celsius")
    );

    assert_eq!(restored.manifest.attributes, dataset.attributes);
    assert_eq!(restored.manifest.sensors, dataset.sensors);
    assert_eq!(restored.manifest.warnings.len(), 1);
    assert!(restored.manifest.warnings[0].contains("adcp_bin"));
    assert_eq!(restored.manifest.skipped_dives.len(), 1);
    assert_eq!(restored.manifest.skipped_dives[0].dive_number, 7);

    assert!(restored.frame.equals(&dataset.stream.frame));
}

#[test]
fn the_two_archive_kinds_do_not_read_as_each_other() {
    let dive_bytes = write_dive_archive(&sample_record()).expect("write");
    let err = read_mission_archive(&dive_bytes).unwrap_err();
    assert!(matches!(err, ArchiveError::Json(_)));

    let dataset = MissionDataset {
        stream: MeasurementStream::from_fields(
            "N_MEASUREMENTS",
            &[RawField::vector(
                "TIME",
                "N_MEASUREMENTS",
                FieldValues::Float(vec![100.0]),
            )],
        )
        .expect("valid fixture"),
        attributes: MetadataSet::new(),
        sensors: Vec::new(),
        warnings: WarningSet::new(),
        skipped: Vec::new(),
    };
    let mission_bytes =
        write_mission_archive(&dataset, Uuid::new_v4(), Utc::now()).expect("write");
    let err = read_dive_archive(&mission_bytes).unwrap_err();
    assert!(matches!(err, ArchiveError::Json(_)));
}

#[test]
fn junk_bytes_are_a_zip_error() {
    let err = read_dive_archive(b"not a zip archive").unwrap_err();
    assert!(matches!(err, ArchiveError::Zip(_)));
}
