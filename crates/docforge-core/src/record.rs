//! Row normalization: tabular input to canonical records.
//!
//! Header keys lose every whitespace character (`" P_ ADDRESS "` becomes
//! `P_ADDRESS`), values are trimmed, and rows with no non-blank value are
//! dropped. The same key normalization is used for every lookup made against
//! a record, so mapping columns and predicate columns can be written with the
//! spacing of the original spreadsheet header.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Header spelling that appears in legacy address sheets.
pub const ADDRESS_ALIAS: &str = "P_ ADDRESS";

/// Canonical key the alias resolves to.
pub const ADDRESS_KEY: &str = "P_ADDRESS";

/// Normalize a header or lookup key by removing all whitespace.
///
/// Normalization is idempotent.
#[must_use = "normalization returns a new string"]
pub fn normalize_key(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

fn canonical_key(raw: &str) -> String {
    if raw == ADDRESS_ALIAS {
        return ADDRESS_KEY.to_string();
    }
    normalize_key(raw)
}

/// One row of input data keyed by normalized header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: BTreeMap<String, String>,
}

impl Record {
    /// Create an empty record. Empty records pad short multi-row chunks.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from raw `(header, value)` pairs.
    ///
    /// Keys are normalized and values trimmed; a later duplicate key wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut record = Self::new();
        for (key, value) in pairs {
            record.insert(key.as_ref(), value.as_ref());
        }
        record
    }

    /// Insert a raw header/value pair.
    pub fn insert(&mut self, key: &str, value: &str) {
        self.values
            .insert(canonical_key(key), value.trim().to_string());
    }

    /// Look up a value; the key is normalized first.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&canonical_key(key)).map(String::as_str)
    }

    /// Look up a value, yielding `""` when the column is absent.
    #[must_use]
    pub fn value(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// True when no value in the record is non-empty.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.values.values().all(|v| v.is_empty())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(normalized key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Ordered records read from one tabular source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    headers: Vec<String>,
    records: Vec<Record>,
    skipped_rows: usize,
}

impl RecordSet {
    /// Normalize an in-memory grid: `headers` names the columns of every row.
    ///
    /// Short rows are padded with empty values, extra cells are ignored, and
    /// rows whose values are all blank are skipped and counted.
    pub fn from_rows<H, R, C>(headers: &[H], rows: R) -> Self
    where
        H: AsRef<str>,
        R: IntoIterator,
        R::Item: IntoIterator<Item = C>,
        C: AsRef<str>,
    {
        let raw_headers: Vec<&str> = headers.iter().map(AsRef::as_ref).collect();
        let mut normalized = Vec::with_capacity(raw_headers.len());
        for header in &raw_headers {
            let key = canonical_key(header);
            if !normalized.contains(&key) {
                normalized.push(key);
            }
        }

        let mut records = Vec::new();
        let mut skipped_rows = 0;
        for row in rows {
            let mut cells = row.into_iter();
            let mut record = Record::new();
            for header in &raw_headers {
                match cells.next() {
                    Some(cell) => record.insert(header, cell.as_ref()),
                    None => record.insert(header, ""),
                }
            }
            if record.is_blank() {
                skipped_rows += 1;
                continue;
            }
            records.push(record);
        }

        if skipped_rows > 0 {
            log::debug!("Skipped {skipped_rows} blank row(s)");
        }

        Self {
            headers: normalized,
            records,
            skipped_rows,
        }
    }

    /// Read records from CSV. The first row holds the headers.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(false)
            .from_reader(reader);

        let mut rows = csv_reader.records();
        let headers: Vec<String> = match rows.next() {
            Some(first) => first?
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    if i == 0 {
                        h.trim_start_matches('\u{feff}').to_string()
                    } else {
                        h.to_string()
                    }
                })
                .collect(),
            None => return Ok(Self::default()),
        };

        let mut data = Vec::new();
        for row in rows {
            let row = row?;
            data.push(row.iter().map(ToString::to_string).collect::<Vec<_>>());
        }

        let set = Self::from_rows(&headers, data);
        log::info!(
            "Loaded {} record(s) with {} column(s)",
            set.records.len(),
            set.headers.len()
        );
        Ok(set)
    }

    /// Read records from a CSV file.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_csv_reader(file)
    }

    /// Normalized headers in source order.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Number of fully blank rows dropped while reading.
    #[must_use]
    pub const fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Column names a mapping may refer to: sorted headers plus the address alias.
    #[must_use]
    pub fn column_choices(&self) -> Vec<String> {
        let mut choices = self.headers.clone();
        choices.push(ADDRESS_ALIAS.to_string());
        choices.sort();
        choices.dedup();
        choices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_key_strips_all_whitespace() {
        assert_eq!(normalize_key("  NAME "), "NAME");
        assert_eq!(normalize_key("P_ ADDRESS"), "P_ADDRESS");
        assert_eq!(normalize_key("FIRST\tLAST\nNAME"), "FIRSTLASTNAME");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn test_record_lookup_normalizes_key() {
        let record = Record::from_pairs([(" CITY ", "  Oslo ")]);
        assert_eq!(record.get("CITY"), Some("Oslo"));
        assert_eq!(record.get("C I T Y"), Some("Oslo"));
        assert_eq!(record.value("MISSING"), "");
    }

    #[test]
    fn test_address_alias() {
        let record = Record::from_pairs([("P_ADDRESS", "1 Main St")]);
        assert_eq!(record.value(ADDRESS_ALIAS), "1 Main St");

        let record = Record::from_pairs([("P_ ADDRESS", "2 High St")]);
        assert_eq!(record.value(ADDRESS_KEY), "2 High St");
    }

    #[test]
    fn test_duplicate_header_later_wins() {
        let record = Record::from_pairs([("NAME", "first"), ("NAME ", "second")]);
        assert_eq!(record.len(), 1);
        assert_eq!(record.value("NAME"), "second");
    }

    #[test]
    fn test_csv_reader_skips_blank_rows() {
        let csv = "NAME,CITY\nAda,London\n , \n,\nGrace,Arlington\n";
        let set = RecordSet::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.skipped_rows(), 2);
        assert_eq!(set.records()[1].value("NAME"), "Grace");
    }

    #[test]
    fn test_csv_reader_short_and_long_rows() {
        let csv = "A,B,C\n1\n1,2,3,4\n";
        let set = RecordSet::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].value("B"), "");
        assert_eq!(set.records()[0].len(), 3);
        assert_eq!(set.records()[1].value("C"), "3");
    }

    #[test]
    fn test_csv_reader_strips_bom_and_header_spaces() {
        let csv = "\u{feff}FULL NAME, P_ ADDRESS \nAda Lovelace,12 St James Sq\n";
        let set = RecordSet::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(set.headers(), &["FULLNAME".to_string(), "P_ADDRESS".to_string()]);
        assert_eq!(set.records()[0].value("FULLNAME"), "Ada Lovelace");
        assert_eq!(set.records()[0].value(ADDRESS_ALIAS), "12 St James Sq");
    }

    #[test]
    fn test_csv_reader_empty_input() {
        let set = RecordSet::from_csv_reader("".as_bytes()).unwrap();
        assert!(set.is_empty());
        assert!(set.headers().is_empty());
    }

    #[test]
    fn test_csv_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        std::fs::write(&path, "NAME\nAda\n").unwrap();
        let set = RecordSet::from_csv_path(&path).unwrap();
        assert_eq!(set.len(), 1);
        assert!(RecordSet::from_csv_path(dir.path().join("missing.csv")).is_err());
    }

    #[test]
    fn test_column_choices_include_alias() {
        let set = RecordSet::from_rows(&["NAME", "CITY"], vec![vec!["a", "b"]]);
        assert_eq!(set.column_choices(), vec!["CITY", "NAME", "P_ ADDRESS"]);
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent(raw in "\\PC*") {
            let once = normalize_key(&raw);
            prop_assert_eq!(normalize_key(&once), once);
        }

        #[test]
        fn prop_address_alias_lookup(value in "[a-zA-Z0-9 ]{0,20}", spaced in any::<bool>()) {
            let header = if spaced { ADDRESS_ALIAS } else { ADDRESS_KEY };
            let record = Record::from_pairs([(header, value.as_str())]);
            prop_assert_eq!(record.get(ADDRESS_ALIAS), record.get(ADDRESS_KEY));
        }
    }
}
