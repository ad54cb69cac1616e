use chrono::{TimeZone, Utc};
use og1_core::attributes::{
    build_dataset_attributes, default_attribute_config, AttributeConfig, ContributorAppend,
};
use og1_core::model::MetadataSet;
use og1_core::warnings::{ConversionWarning, WarningSet};

fn sample_attrs() -> MetadataSet {
    let mut attrs = MetadataSet::new();
    attrs.set("creator_name", "Fritz");
    attrs.set("creator_email", "fritz@uw.edu");
    attrs.set(
        "institution",
        "University of Washington School of Oceanography",
    );
    attrs.set("project", "Labrador Sea 2004");
    attrs.set("time_coverage_start", "2008-09-21T10:00:00Z");
    attrs.set("time_coverage_end", 1221998400.0);
    attrs.set("summary", "Seaglider mission in the Labrador Sea");
    attrs.set("uuid", "4d4c-9f6a");
    attrs.set("license", "CC-BY 4.0");
    attrs
}

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap()
}

#[test]
fn additions_renames_and_times_come_together_in_canonical_order() {
    let attrs = sample_attrs();
    let mut warnings = WarningSet::new();

    let out = build_dataset_attributes(
        &[&attrs],
        default_attribute_config(),
        fixed_now(),
        &mut warnings,
    );

    assert_eq!(out.get_str("title"), Some("OceanGliders trajectory file"));
    assert_eq!(out.get_str("platform"), Some("sub-surface gliders"));
    assert_eq!(out.get_str("Conventions"), Some("CF-1.10,OG-1.0"));

    // Separator cleanup for the string form, epoch rendering for the numeric
    // form.
    assert_eq!(out.get_str("time_coverage_start"), Some("20080921T100000"));
    assert_eq!(out.get_str("time_coverage_end"), Some("20080921T120000"));
    assert_eq!(out.get_str("date_modified"), Some("20260825T120000"));
    assert_eq!(out.get_str("start_date"), Some("20080921T100000"));

    // Renames fire while the originals disappear.
    assert_eq!(
        out.get_str("site"),
        Some("Seaglider mission in the Labrador Sea")
    );
    assert_eq!(out.get_str("uri"), Some("4d4c-9f6a"));
    assert!(!out.contains("summary"));
    assert!(!out.contains("uuid"));

    assert_eq!(out.get_str("license"), Some("CC-BY 4.0"));

    let keys: Vec<&str> = out.keys().collect();
    let position = |key: &str| keys.iter().position(|k| *k == key).unwrap_or(usize::MAX);
    assert_eq!(keys[0], "title");
    assert_eq!(keys[1], "platform");
    assert!(position("institution") < position("time_coverage_start"));
    assert!(position("time_coverage_start") < position("contributor_name"));
    assert!(position("contributor_name") < position("date_modified"));
    assert!(position("date_modified") < position("Conventions"));
    assert!(warnings.is_empty());
}

#[test]
fn contributors_default_roles_and_normalize_the_uw_spelling() {
    let attrs = sample_attrs();
    let mut warnings = WarningSet::new();

    let out = build_dataset_attributes(
        &[&attrs],
        default_attribute_config(),
        fixed_now(),
        &mut warnings,
    );

    assert_eq!(out.get_str("contributor_name"), Some("Fritz"));
    assert_eq!(out.get_str("contributor_email"), Some("fritz@uw.edu"));
    assert_eq!(out.get_str("contributor_role"), Some("PI"));
    assert_eq!(
        out.get_str("contributor_role_vocabulary"),
        Some("http://vocab.nerc.ac.uk/search_nvs/W08")
    );
    assert_eq!(
        out.get_str("contributing_institutions"),
        Some("University of Washington - School of Oceanography")
    );
    // The institution came from `institution`, so its role defaults to PI.
    assert_eq!(out.get_str("contributing_institutions_role"), Some("PI"));
}

#[test]
fn appended_contributors_join_the_roster_and_short_columns_are_padded() {
    let attrs = sample_attrs();
    let mut config = default_attribute_config().clone();
    config.append_contributors = Some(ContributorAppend {
        contributor_name: Some("Ada Processor".to_string()),
        contributor_role: Some("Data scientist".to_string()),
        contributing_institutions: Some("NOC".to_string()),
        contributing_institutions_role: Some("Operator".to_string()),
        ..Default::default()
    });
    let mut warnings = WarningSet::new();

    let out = build_dataset_attributes(&[&attrs], &config, fixed_now(), &mut warnings);

    assert_eq!(out.get_str("contributor_name"), Some("Fritz, Ada Processor"));
    assert_eq!(
        out.get_str("contributor_role"),
        Some("PI, Data scientist")
    );
    // No second email exists, so the column pads out with an empty slot.
    assert_eq!(out.get_str("contributor_email"), Some("fritz@uw.edu, "));
    assert_eq!(
        out.get_str("contributing_institutions"),
        Some("University of Washington - School of Oceanography, NOC")
    );
}

#[test]
fn conflicting_dive_attributes_keep_the_first_value_and_warn() {
    let mut first = MetadataSet::new();
    first.set("project", "Labrador Sea 2004");
    first.set("glider_serial", "SG015");
    let mut second = MetadataSet::new();
    second.set("project", "Labrador Sea 2005");
    second.set("glider_serial", "SG015");
    let mut warnings = WarningSet::new();

    let out = build_dataset_attributes(
        &[&first, &second],
        default_attribute_config(),
        fixed_now(),
        &mut warnings,
    );

    assert_eq!(out.get_str("project"), Some("Labrador Sea 2004"));
    assert!(warnings.iter().any(|w| matches!(
        w,
        ConversionWarning::DatasetAttributeConflict { attribute, .. } if attribute == "project"
    )));
}

#[test]
fn reconciliation_is_idempotent_for_a_fixed_timestamp() {
    let attrs = sample_attrs();
    let config: &AttributeConfig = default_attribute_config();
    let now = fixed_now();
    let mut warnings = WarningSet::new();

    let once = build_dataset_attributes(&[&attrs], config, now, &mut warnings);
    let twice = build_dataset_attributes(&[&once], config, now, &mut warnings);

    assert_eq!(once, twice);
}

#[test]
fn a_dataset_without_contributors_gets_no_roster_attributes() {
    let mut attrs = MetadataSet::new();
    attrs.set("project", "Labrador Sea 2004");
    let mut warnings = WarningSet::new();

    let out = build_dataset_attributes(
        &[&attrs],
        default_attribute_config(),
        fixed_now(),
        &mut warnings,
    );

    assert!(!out.contains("contributor_name"));
    assert!(!out.contains("contributing_institutions"));
    assert_eq!(out.get_str("project"), Some("Labrador Sea 2004"));
}
