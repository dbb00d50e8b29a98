//! Placeholder mappings.
//!
//! A mapping tells the engine where each placeholder's value comes from.
//! Mappings are supplied per generation request, never inferred, except
//! through [`Mapping::identity`] which the CLI offers as a convenience.

use crate::error::Result;
use crate::placeholder::{token_head, TemplateDiscovery};
use crate::record::{normalize_key, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Value source for one placeholder.
///
/// JSON form: `{"kind": "column", "value": "NAME"}`. The older names
/// `custom_text` and `csv_column` are accepted for `literal` and `column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingEntry {
    /// Fixed text.
    #[serde(alias = "custom_text")]
    Literal { value: String },

    /// Value of a record column.
    #[serde(alias = "csv_column")]
    Column { value: String },

    /// `prefix + column value + suffix`, or nothing when the value is empty.
    Combined {
        value: String,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
    },
}

impl MappingEntry {
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    #[must_use]
    pub fn column(column: impl Into<String>) -> Self {
        Self::Column {
            value: column.into(),
        }
    }

    #[must_use]
    pub fn combined(
        column: impl Into<String>,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self::Combined {
            value: column.into(),
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Resolve the entry against one record. Missing columns give `""`.
    #[must_use]
    pub fn resolve(&self, record: &Record) -> String {
        match self {
            Self::Literal { value } => value.clone(),
            Self::Column { value } => record.value(value).to_string(),
            Self::Combined {
                value,
                prefix,
                suffix,
            } => {
                let found = record.value(value);
                if found.is_empty() {
                    String::new()
                } else {
                    format!("{prefix}{found}{suffix}")
                }
            }
        }
    }
}

/// Placeholder token to mapping entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mapping {
    entries: BTreeMap<String, MappingEntry>,
}

impl Mapping {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every discovered placeholder `#X` to column `X`.
    ///
    /// A two-word capture such as `#NAME is` keeps both words only when
    /// `columns` has a column of that name (`#P_ ADDRESS`). Otherwise the
    /// first word is mapped and the second stays in the text.
    #[must_use]
    pub fn identity(discovery: &TemplateDiscovery, columns: &[String]) -> Self {
        let known: HashSet<String> = columns.iter().map(|c| normalize_key(c)).collect();
        let mut mapping = Self::new();
        for token in &discovery.placeholders {
            let head = token_head(token);
            let name = token.trim_start_matches('#');
            let key = if head == token || known.contains(&normalize_key(name)) {
                token.as_str()
            } else {
                head
            };
            mapping.insert(key, MappingEntry::column(key.trim_start_matches('#')));
        }
        mapping
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn insert(&mut self, token: impl Into<String>, entry: MappingEntry) {
        self.entries.insert(token.into(), entry);
    }

    #[must_use]
    pub fn get(&self, token: &str) -> Option<&MappingEntry> {
        self.entries.get(token)
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every mapped token for one record.
    #[must_use]
    pub fn resolve_all(&self, record: &Record) -> HashMap<String, String> {
        self.entries
            .iter()
            .map(|(token, entry)| (token.clone(), entry.resolve(record)))
            .collect()
    }
}

impl FromIterator<(String, MappingEntry)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, MappingEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::from_pairs([("NAME", "Ada"), ("TITLE", ""), ("P_ADDRESS", "1 Main St")])
    }

    #[test]
    fn test_entry_kinds() {
        let r = record();
        assert_eq!(MappingEntry::literal("Dear").resolve(&r), "Dear");
        assert_eq!(MappingEntry::column("NAME").resolve(&r), "Ada");
        assert_eq!(MappingEntry::column("MISSING").resolve(&r), "");
        assert_eq!(MappingEntry::combined("NAME", "(", ")").resolve(&r), "(Ada)");
        assert_eq!(MappingEntry::combined("TITLE", "(", ")").resolve(&r), "");
    }

    #[test]
    fn test_column_lookup_uses_alias() {
        assert_eq!(MappingEntry::column("P_ ADDRESS").resolve(&record()), "1 Main St");
    }

    #[test]
    fn test_json_parsing_with_aliases() {
        let json = r##"{
            "#NAME": {"kind": "column", "value": "NAME"},
            "#GREETING": {"kind": "custom_text", "value": "Hello", "prefix": "", "suffix": ""},
            "#ADDR": {"kind": "csv_column", "value": "P_ ADDRESS"},
            "#TITLE": {"kind": "combined", "value": "TITLE", "prefix": "Re: "}
        }"##;
        let mapping = Mapping::from_json_str(json).unwrap();
        assert_eq!(mapping.len(), 4);
        assert_eq!(mapping.get("#GREETING"), Some(&MappingEntry::literal("Hello")));
        assert_eq!(
            mapping.get("#TITLE"),
            Some(&MappingEntry::combined("TITLE", "Re: ", ""))
        );

        let values = mapping.resolve_all(&record());
        assert_eq!(values["#ADDR"], "1 Main St");
        assert_eq!(values["#TITLE"], "");
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = r##"{"#X": {"kind": "formula", "value": "1+1"}}"##;
        assert!(Mapping::from_json_str(json).is_err());
    }

    fn discovery(tokens: &[&str]) -> TemplateDiscovery {
        TemplateDiscovery {
            placeholders: tokens.iter().map(|t| (*t).to_string()).collect(),
            ..TemplateDiscovery::default()
        }
    }

    #[test]
    fn test_identity_mapping() {
        let columns = vec!["CITY".to_string(), "P_ ADDRESS".to_string()];
        let mapping = Mapping::identity(&discovery(&["#CITY", "#P_ ADDRESS"]), &columns);
        assert_eq!(mapping.get("#CITY"), Some(&MappingEntry::column("CITY")));
        assert_eq!(
            mapping.get("#P_ ADDRESS").map(|e| e.resolve(&record())),
            Some("1 Main St".to_string())
        );
    }

    #[test]
    fn test_identity_maps_head_of_run_on_capture() {
        let columns = vec!["NAME".to_string()];
        let mapping = Mapping::identity(&discovery(&["#NAME is", "#NAME"]), &columns);
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("#NAME"), Some(&MappingEntry::column("NAME")));
        assert!(!mapping.contains("#NAME is"));
    }

    #[test]
    fn test_identity_without_columns_maps_heads() {
        let mapping = Mapping::identity(&discovery(&["#ITEM each", "#DATE"]), &[]);
        assert_eq!(mapping.tokens().collect::<Vec<_>>(), vec!["#DATE", "#ITEM"]);
    }
}
