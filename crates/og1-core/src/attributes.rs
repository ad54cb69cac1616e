use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::model::{AttrValue, MetadataSet};
use crate::warnings::{ConversionWarning, WarningSet};

const ROLE_VOCABULARY: &str = "http://vocab.nerc.ac.uk/search_nvs/W08";
const INSTITUTION_VOCABULARY: &str = "https://edmo.seadatanet.org/report/1434";
const INSTITUTION_ROLE_VOCABULARY: &str = "http://vocab.nerc.ac.uk/collection/W08/current/";

const TIME_ATTRIBUTES: [&str; 5] = [
    "time_coverage_start",
    "time_coverage_end",
    "date_created",
    "start_time",
    "start_date",
];

/// How dataset attributes are assembled: which source attributes survive
/// unchanged, which are renamed, what gets added outright, the canonical
/// output order, and an optional contributor block appended to the roster.
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeConfig {
    #[serde(default)]
    pub keep_as_is: Vec<String>,
    #[serde(default)]
    pub renames: Vec<AttributeRename>,
    #[serde(default)]
    pub additions: MetadataSet,
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub append_contributors: Option<ContributorAppend>,
}

/// `target` takes the value of `source` when the source attribute exists.
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeRename {
    pub target: String,
    pub source: String,
}

/// One contributor (and one institution) to append to the merged roster,
/// typically the person running the conversion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContributorAppend {
    #[serde(default)]
    pub contributor_name: Option<String>,
    #[serde(default)]
    pub contributor_email: Option<String>,
    #[serde(default)]
    pub contributor_role: Option<String>,
    #[serde(default)]
    pub contributor_role_vocabulary: Option<String>,
    #[serde(default)]
    pub contributing_institutions: Option<String>,
    #[serde(default)]
    pub contributing_institutions_role: Option<String>,
    #[serde(default)]
    pub contributing_institutions_vocabulary: Option<String>,
    #[serde(default)]
    pub contributing_institutions_role_vocabulary: Option<String>,
}

/// Partial adjustments to an [`AttributeConfig`], parsed from TOML. Lists
/// replace their default wholesale; additions extend the default set.
#[derive(Debug, Default, Deserialize)]
pub struct AttributeOverrides {
    #[serde(default)]
    pub keep_as_is: Option<Vec<String>>,
    #[serde(default)]
    pub renames: Option<Vec<AttributeRename>>,
    #[serde(default)]
    pub additions: MetadataSet,
    #[serde(default)]
    pub order: Option<Vec<String>>,
    #[serde(default)]
    pub append_contributors: Option<ContributorAppend>,
}

impl AttributeConfig {
    pub fn with_overrides(mut self, overrides: AttributeOverrides) -> Self {
        if let Some(keep_as_is) = overrides.keep_as_is {
            self.keep_as_is = keep_as_is;
        }
        if let Some(renames) = overrides.renames {
            self.renames = renames;
        }
        for (key, value) in overrides.additions.iter() {
            self.additions.set(key, value.clone());
        }
        if let Some(order) = overrides.order {
            self.order = order;
        }
        if let Some(append) = overrides.append_contributors {
            self.append_contributors = Some(append);
        }
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let overrides: AttributeOverrides = toml::from_str(text)?;
        Ok(default_attribute_config().clone().with_overrides(overrides))
    }
}

static DEFAULT_ATTRIBUTE_CONFIG: Lazy<AttributeConfig> = Lazy::new(|| {
    let mut additions = MetadataSet::new();
    additions.set("title", "OceanGliders trajectory file");
    additions.set("platform", "sub-surface gliders");
    additions.set(
        "platform_vocabulary",
        "https://vocab.nerc.ac.uk/collection/L06/current/27",
    );
    additions.set("featureType", "trajectoryProfile");
    additions.set("Conventions", "CF-1.10,OG-1.0");
    additions.set("rtqc_method", "No QC applied");
    additions.set("rtqc_method_doi", "n/a");
    additions.set("doi", "");
    additions.set("data_url", "");

    AttributeConfig {
        keep_as_is: [
            "naming_authority",
            "institution",
            "project",
            "geospatial_lat_min",
            "geospatial_lat_max",
            "geospatial_lon_min",
            "geospatial_lon_max",
            "geospatial_vertical_min",
            "geospatial_vertical_max",
            "license",
            "keywords",
            "keywords_vocabulary",
            "file_version",
            "acknowledgment",
            "date_created",
            "disclaimer",
        ]
        .into_iter()
        .map(str::to_string)
        .collect(),
        renames: vec![
            AttributeRename {
                target: "site".to_string(),
                source: "summary".to_string(),
            },
            AttributeRename {
                target: "uri".to_string(),
                source: "uuid".to_string(),
            },
            AttributeRename {
                target: "uri_comment".to_string(),
                source: "UUID".to_string(),
            },
            AttributeRename {
                target: "comment".to_string(),
                source: "history".to_string(),
            },
        ],
        additions,
        order: [
            "title",
            "platform",
            "platform_vocabulary",
            "id",
            "naming_authority",
            "institution",
            "internal_mission_identifier",
            "geospatial_lat_min",
            "geospatial_lat_max",
            "geospatial_lon_min",
            "geospatial_lon_max",
            "geospatial_vertical_min",
            "geospatial_vertical_max",
            "time_coverage_start",
            "time_coverage_end",
            "site",
            "site_vocabulary",
            "program",
            "program_vocabulary",
            "project",
            "network",
            "contributor_name",
            "contributor_email",
            "contributor_id",
            "contributor_role",
            "contributor_role_vocabulary",
            "contributing_institutions",
            "contributing_institutions_vocabulary",
            "contributing_institutions_role",
            "contributing_institutions_role_vocabulary",
            "uri",
            "uri_comment",
            "data_url",
            "doi",
            "rtqc_method",
            "rtqc_method_doi",
            "web_link",
            "comment",
            "start_date",
            "date_created",
            "date_modified",
            "featureType",
            "Conventions",
        ]
        .into_iter()
        .map(str::to_string)
        .collect(),
        append_contributors: None,
    }
});

pub fn default_attribute_config() -> &'static AttributeConfig {
    &DEFAULT_ATTRIBUTE_CONFIG
}

/// Merges the attribute sets of several dives into one. The first value seen
/// for a key wins; later disagreements are reported as warnings.
pub fn merge_record_attributes(
    sources: &[&MetadataSet],
    warnings: &mut WarningSet,
) -> MetadataSet {
    let mut merged = MetadataSet::new();
    for source in sources {
        for (key, value) in source.iter() {
            match merged.get(key) {
                None => merged.set(key, value.clone()),
                Some(existing) if existing != value => {
                    warnings.push(ConversionWarning::DatasetAttributeConflict {
                        attribute: key.to_string(),
                        existing: existing.to_string(),
                        replacement: value.to_string(),
                    });
                }
                _ => {}
            }
        }
    }
    merged
}

// A comma-separated roster column. Items are deduplicated, and embedded
// commas are replaced with hyphens so the joined string stays splittable.
#[derive(Debug, Default)]
struct RosterList {
    items: Vec<String>,
}

impl RosterList {
    fn push(&mut self, item: &str) {
        if item.is_empty() {
            return;
        }
        let cleaned = item.replace(',', "-");
        if !self.items.iter().any(|existing| existing == &cleaned) {
            self.items.push(cleaned);
        }
    }

    fn extend_split(&mut self, joined: &str) {
        for part in joined.split(", ") {
            self.push(part);
        }
    }

    fn pad_to(&mut self, len: usize) {
        while self.items.len() < len {
            self.items.push(String::new());
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn join(&self) -> String {
        self.items.join(", ")
    }
}

fn contributor_attributes(
    attrs: &MetadataSet,
    append: Option<&ContributorAppend>,
) -> MetadataSet {
    let mut names = RosterList::default();
    let mut emails = RosterList::default();
    let mut roles = RosterList::default();
    let mut roles_vocab = RosterList::default();

    if let Some(value) = attrs.get_str("creator_name") {
        names.extend_split(value);
        if let Some(email) = attrs.get_str("creator_email") {
            emails.extend_split(email);
        }
        roles.extend_split(attrs.get_str("creator_role").unwrap_or("PI"));
        roles_vocab.extend_split(
            attrs
                .get_str("creator_role_vocabulary")
                .unwrap_or(ROLE_VOCABULARY),
        );
    }
    if let Some(value) = attrs.get_str("contributor_name") {
        names.extend_split(value);
        if let Some(email) = attrs.get_str("contributor_email") {
            emails.extend_split(email);
        }
        roles.extend_split(attrs.get_str("contributor_role").unwrap_or("PI"));
        roles_vocab.extend_split(
            attrs
                .get_str("contributor_role_vocabulary")
                .unwrap_or(ROLE_VOCABULARY),
        );
    }

    let mut institutions = RosterList::default();
    let mut institution_roles = RosterList::default();
    let mut institution_vocab = RosterList::default();
    let mut institution_role_vocab = RosterList::default();

    if let Some(value) = attrs.get_str("contributing_institutions") {
        institutions.extend_split(value);
        institution_roles.extend_split(
            attrs
                .get_str("contributing_institutions_role")
                .unwrap_or("Operator"),
        );
        institution_vocab.extend_split(
            attrs
                .get_str("contributing_institutions_vocabulary")
                .unwrap_or(INSTITUTION_VOCABULARY),
        );
        institution_role_vocab.extend_split(
            attrs
                .get_str("contributing_institutions_role_vocabulary")
                .unwrap_or(INSTITUTION_ROLE_VOCABULARY),
        );
    } else if let Some(value) = attrs.get_str("institution") {
        institutions.extend_split(value);
        institution_roles.extend_split(
            attrs
                .get_str("contributing_institutions_role")
                .unwrap_or("PI"),
        );
        institution_vocab.extend_split(
            attrs
                .get_str("contributing_institutions_vocabulary")
                .unwrap_or(INSTITUTION_VOCABULARY),
        );
        institution_role_vocab.extend_split(
            attrs
                .get_str("contributing_institutions_role_vocabulary")
                .unwrap_or(INSTITUTION_ROLE_VOCABULARY),
        );
    }

    // The basestation spells this institution several ways across missions.
    for item in &mut institutions.items {
        if ["Oceanography", "University", "Washington"]
            .iter()
            .all(|keyword| item.contains(keyword))
        {
            *item = "University of Washington - School of Oceanography".to_string();
        }
    }

    if let Some(append) = append {
        if let Some(value) = &append.contributor_name {
            names.push(value);
        }
        if let Some(value) = &append.contributor_email {
            emails.push(value);
        }
        if let Some(value) = &append.contributor_role {
            roles.push(value);
        }
        if let Some(value) = &append.contributor_role_vocabulary {
            roles_vocab.push(value);
        }
        if let Some(value) = &append.contributing_institutions {
            institutions.push(value);
        }
        if let Some(value) = &append.contributing_institutions_role {
            institution_roles.push(value);
        }
        if let Some(value) = &append.contributing_institutions_vocabulary {
            institution_vocab.push(value);
        }
        if let Some(value) = &append.contributing_institutions_role_vocabulary {
            institution_role_vocab.push(value);
        }
    }

    let mut out = MetadataSet::new();
    if names.is_empty() && institutions.is_empty() {
        return out;
    }

    emails.pad_to(names.len());
    roles.pad_to(names.len());
    roles_vocab.pad_to(names.len());
    institution_roles.pad_to(institutions.len());
    institution_vocab.pad_to(institutions.len());
    institution_role_vocab.pad_to(institutions.len());

    out.set("contributor_name", names.join());
    out.set("contributor_email", emails.join());
    out.set("contributor_role", roles.join());
    out.set("contributor_role_vocabulary", roles_vocab.join());
    out.set("contributing_institutions", institutions.join());
    out.set("contributing_institutions_role", institution_roles.join());
    out.set(
        "contributing_institutions_vocabulary",
        institution_vocab.join(),
    );
    out.set(
        "contributing_institutions_role_vocabulary",
        institution_role_vocab.join(),
    );
    out
}

fn format_epoch(seconds: f64) -> Option<String> {
    let datetime = DateTime::<Utc>::from_timestamp(seconds.floor() as i64, 0)?;
    Some(datetime.format("%Y%m%dT%H%M%S").to_string())
}

// Strips separators so "2008-09-21T10:00:00Z" becomes "20080921T100000".
// Strings without separators pass through untouched.
fn clean_time_string(text: &str) -> String {
    let filtered: String = text
        .chars()
        .filter(|c| !matches!(c, '-' | ':' | '_'))
        .collect();
    filtered.trim_end_matches('Z').to_string()
}

fn time_attributes(attrs: &MetadataSet, now: DateTime<Utc>) -> MetadataSet {
    let mut out = MetadataSet::new();
    for attr in TIME_ATTRIBUTES {
        let Some(value) = attrs.get(attr) else {
            continue;
        };
        match value {
            AttrValue::Int(_) | AttrValue::Float(_) => {
                let seconds = value.as_f64().unwrap_or(f64::NAN);
                match format_epoch(seconds) {
                    Some(rendered) => out.set(attr, rendered),
                    None => out.set(attr, value.clone()),
                }
            }
            AttrValue::Text(text) => {
                if text.contains('-') || text.contains(':') {
                    out.set(attr, clean_time_string(text));
                } else {
                    out.set(attr, text.clone());
                }
            }
        }
    }
    out.set("date_modified", now.format("%Y%m%dT%H%M%S").to_string());
    if let Some(start) = out.remove("start_time") {
        out.set("start_date", start);
    }
    if !out.contains("start_date") {
        if let Some(start) = out.get("time_coverage_start").cloned() {
            out.set("start_date", start);
        }
    }
    out
}

fn renamed_attributes(attrs: &MetadataSet, renames: &[AttributeRename]) -> MetadataSet {
    let mut out = MetadataSet::new();
    for rename in renames {
        if let Some(value) = attrs.get(&rename.source) {
            out.set(rename.target.clone(), value.clone());
        } else if let Some(value) = attrs.get(&rename.target) {
            // Already renamed on a previous pass.
            out.set(rename.target.clone(), value.clone());
        }
    }
    out
}

fn kept_attributes(attrs: &MetadataSet, keep_as_is: &[String]) -> MetadataSet {
    let mut out = MetadataSet::new();
    for key in keep_as_is {
        if let Some(value) = attrs.get(key) {
            out.set(key.clone(), value.clone());
        }
    }
    out
}

/// Builds the final dataset attributes from the merged per-dive attributes:
/// configured additions, the contributor roster, normalized time attributes,
/// renames, and the kept attributes, reordered canonically. Additions always
/// win over values carried from the source data.
///
/// Given the same `now`, feeding the output back in reproduces it exactly.
pub fn build_dataset_attributes(
    sources: &[&MetadataSet],
    config: &AttributeConfig,
    now: DateTime<Utc>,
    warnings: &mut WarningSet,
) -> MetadataSet {
    let merged = merge_record_attributes(sources, warnings);
    let contributors = contributor_attributes(&merged, config.append_contributors.as_ref());
    let times = time_attributes(&merged, now);
    let renamed = renamed_attributes(&merged, &config.renames);
    let kept = kept_attributes(&merged, &config.keep_as_is);

    let mut combined = MetadataSet::new();
    for set in [&config.additions, &contributors, &renamed, &kept, &times] {
        for (key, value) in set.iter() {
            combined.set(key, value.clone());
        }
    }
    for (key, value) in config.additions.iter() {
        combined.set(key, value.clone());
    }

    let mut ordered = MetadataSet::new();
    for key in &config.order {
        if let Some(value) = combined.get(key) {
            ordered.set(key.clone(), value.clone());
        }
    }
    for (key, value) in combined.iter() {
        if !ordered.contains(key) {
            ordered.set(key.to_string(), value.clone());
        }
    }
    ordered
}
