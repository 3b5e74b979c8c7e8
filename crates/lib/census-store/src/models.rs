use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Organisms published in the Census.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Organism {
    #[serde(rename = "Homo sapiens")]
    HomoSapiens,
    #[serde(rename = "Mus musculus")]
    MusMusculus,
}

impl Organism {
    pub const ALL: [Self; 2] = [Self::HomoSapiens, Self::MusMusculus];

    /// Canonical binomial name, e.g. `Homo sapiens`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HomoSapiens => "Homo sapiens",
            Self::MusMusculus => "Mus musculus",
        }
    }

    /// Key under `census_data` for this organism's experiment.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::HomoSapiens => "homo_sapiens",
            Self::MusMusculus => "mus_musculus",
        }
    }

    #[must_use]
    pub const fn common_name(self) -> &'static str {
        match self {
            Self::HomoSapiens => "human",
            Self::MusMusculus => "mouse",
        }
    }

    /// Resolves a user-supplied organism name.
    ///
    /// Matching is case-insensitive and treats spaces, underscores and hyphens
    /// alike, so `Homo sapiens`, `homo_sapiens` and `human` all resolve.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let normalized: String = input
            .trim()
            .chars()
            .map(|ch| match ch {
                '_' | '-' => ' ',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

        Self::ALL.into_iter().find(|organism| {
            normalized == organism.name().to_ascii_lowercase()
                || normalized == organism.storage_key().replace('_', " ")
                || normalized == organism.common_name()
        })
    }
}

impl fmt::Display for Organism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Annotation axis of a Census experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Cell-level metadata.
    Obs,
    /// Gene-level metadata.
    Var,
}

impl Axis {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Obs => "obs",
            Self::Var => "var",
        }
    }

    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Obs => crate::schema::OBS_FILE,
            Self::Var => crate::schema::VAR_FILE,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single scalar cell in an obs/var frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl CellValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
        }
    }

    /// Converts the cell into a protocol-safe JSON primitive.
    ///
    /// Non-finite floats become `null`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(value) => Value::Bool(*value),
            Self::Int(value) => Value::from(*value),
            Self::Float(value) => Value::from(*value),
            Self::Str(value) => Value::String(value.clone()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Row-major table returned by obs/var reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<CellValue>>,
}

impl Frame {
    #[must_use]
    pub const fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Returns the index of the first row whose width differs from the header.
    #[must_use]
    pub fn ragged_row(&self) -> Option<usize> {
        let width = self.columns.len();
        self.rows.iter().position(|row| row.len() != width)
    }

    pub fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }

    #[must_use]
    pub fn head(&self, len: usize) -> &[Vec<CellValue>] {
        &self.rows[..self.rows.len().min(len)]
    }
}

/// One label/value pair from `census_info/summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub label: String,
    pub value: CellValue,
}

/// Location of a release's SOMA data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseLocator {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_region: Option<String>,
}

/// A single release entry from the Census release directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    #[serde(default)]
    pub release_name: String,
    pub release_build: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default)]
    pub lts: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retraction: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soma: Option<ReleaseLocator>,
}

impl ReleaseEntry {
    #[must_use]
    pub const fn is_retracted(&self) -> bool {
        self.retraction.is_some()
    }
}

/// Parsed release directory: named releases plus aliases such as `stable`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, DirectoryValue>")]
pub struct ReleaseDirectory {
    pub releases: BTreeMap<String, ReleaseEntry>,
    pub aliases: BTreeMap<String, String>,
}

/// Raw release-directory value: either an alias target or a release entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DirectoryValue {
    Alias(String),
    Release(Box<ReleaseEntry>),
}

impl From<BTreeMap<String, DirectoryValue>> for ReleaseDirectory {
    fn from(raw: BTreeMap<String, DirectoryValue>) -> Self {
        let mut directory = Self::default();
        for (name, value) in raw {
            match value {
                DirectoryValue::Alias(target) => {
                    directory.aliases.insert(name, target);
                }
                DirectoryValue::Release(mut entry) => {
                    entry.release_name.clone_from(&name);
                    directory.releases.insert(name, *entry);
                }
            }
        }
        directory
    }
}

impl ReleaseDirectory {
    /// Release names in ascending order (Census names sort chronologically).
    #[must_use]
    pub fn release_names(&self) -> Vec<String> {
        self.releases.keys().cloned().collect()
    }

    /// Resolves a release name or alias to a release entry.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&ReleaseEntry> {
        let target = self.aliases.get(name).map_or(name, String::as_str);
        self.releases.get(target)
    }

    /// Newest non-retracted long-term-support release.
    #[must_use]
    pub fn newest_lts(&self) -> Option<&ReleaseEntry> {
        self.releases
            .values()
            .rev()
            .find(|entry| entry.lts && !entry.is_retracted())
    }

    #[must_use]
    pub fn newest(&self) -> Option<&ReleaseEntry> {
        self.releases.values().next_back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organism_parse_accepts_common_spellings() {
        assert_eq!(Organism::parse("Homo sapiens"), Some(Organism::HomoSapiens));
        assert_eq!(Organism::parse("homo_sapiens"), Some(Organism::HomoSapiens));
        assert_eq!(Organism::parse("  HUMAN "), Some(Organism::HomoSapiens));
        assert_eq!(Organism::parse("Mus-musculus"), Some(Organism::MusMusculus));
        assert_eq!(Organism::parse("mouse"), Some(Organism::MusMusculus));
        assert_eq!(Organism::parse("Danio rerio"), None);
        assert_eq!(Organism::parse(""), None);
    }

    #[test]
    fn cell_values_deserialize_untagged() {
        let row: Vec<CellValue> =
            serde_json::from_str(r#"[null, true, 3, 2.5, "T cell"]"#).expect("row parses");
        assert_eq!(
            row,
            vec![
                CellValue::Null,
                CellValue::Bool(true),
                CellValue::Int(3),
                CellValue::Float(2.5),
                CellValue::Str("T cell".to_string()),
            ]
        );
    }

    #[test]
    fn non_finite_floats_serialize_as_null() {
        assert_eq!(CellValue::Float(f64::NAN).to_json(), Value::Null);
    }

    #[test]
    fn ragged_rows_are_reported() {
        let frame: Frame = serde_json::from_str(r#"{"columns": ["a", "b"], "rows": [[1, 2], [3]]}"#)
            .expect("frame parses");
        assert_eq!(frame.ragged_row(), Some(1));
    }

    #[test]
    fn release_directory_splits_aliases_and_releases() {
        let raw = r#"{
            "stable": "2024-07-01",
            "latest": "2025-01-30",
            "2024-07-01": {"release_build": "2024-07-01", "lts": true},
            "2025-01-30": {"release_build": "2025-01-30"},
            "2023-05-15": {"release_build": "2023-05-15", "lts": true, "retraction": {"date": "2023-06-01"}}
        }"#;
        let directory: ReleaseDirectory = serde_json::from_str(raw).expect("directory parses");

        assert_eq!(directory.releases.len(), 3);
        assert_eq!(directory.aliases.len(), 2);
        assert_eq!(
            directory.resolve("stable").map(|entry| entry.release_name.as_str()),
            Some("2024-07-01")
        );
        assert_eq!(
            directory.newest_lts().map(|entry| entry.release_build.as_str()),
            Some("2024-07-01")
        );
        assert_eq!(
            directory.newest().map(|entry| entry.release_build.as_str()),
            Some("2025-01-30")
        );
    }
}
