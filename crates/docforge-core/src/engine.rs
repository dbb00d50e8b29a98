//! One-document fill pipeline: conditionals, substitution, settings.

use crate::conditional::{resolve_conditionals, ConditionalOutcome};
use crate::document::TemplateDocument;
use crate::error::Result;
use crate::mapping::Mapping;
use crate::placeholder::{token_head, TemplateDiscovery};
use crate::record::Record;
use crate::settings::{DocumentSettings, ResolvedSettings};
use crate::substitute::{
    substitute_document, OccurrenceValues, RecordValues, SubstitutionStats, TokenSet,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What one fill did to a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReport {
    pub conditionals: ConditionalOutcome,
    pub substitution: SubstitutionStats,
}

/// Prepared filling state shared by every document of a batch.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    mapping: Mapping,
    tokens: TokenSet,
    unknown: Vec<String>,
    settings: Option<ResolvedSettings>,
}

/// Discovered placeholders with no mapping entry.
///
/// The token grammar greedily takes a second word, so `#NAME is` is found in
/// "Dear #NAME is". When the first word alone is mapped the longer capture is
/// not a placeholder of its own. Otherwise the first word is the unknown
/// placeholder, so only it is blanked and the following word survives.
fn unknown_placeholders(mapping: &Mapping, discovery: &TemplateDiscovery) -> Vec<String> {
    let mut unknown: Vec<String> = Vec::new();
    for token in &discovery.placeholders {
        if mapping.contains(token) {
            continue;
        }
        let head = token_head(token);
        if head != token && mapping.contains(head) {
            continue;
        }
        if !unknown.iter().any(|u| u == head) {
            unknown.push(head.to_string());
        }
    }
    unknown
}

impl TemplateEngine {
    #[must_use]
    pub fn new(mapping: Mapping, discovery: &TemplateDiscovery) -> Self {
        let unknown = unknown_placeholders(&mapping, discovery);
        for token in &unknown {
            log::debug!("Placeholder {token} has no mapping entry, it will be left blank");
        }
        let tokens = TokenSet::new(mapping.tokens().chain(unknown.iter().map(String::as_str)));
        Self {
            mapping,
            tokens,
            unknown,
            settings: None,
        }
    }

    /// Attach document settings; invalid settings are rejected here, before any output.
    pub fn with_settings(mut self, settings: &DocumentSettings) -> Result<Self> {
        let resolved = settings.resolve()?;
        self.settings = if resolved.is_noop() { None } else { Some(resolved) };
        Ok(self)
    }

    #[must_use]
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    #[must_use]
    pub fn unknown_placeholders(&self) -> &[String] {
        &self.unknown
    }

    /// Records one document consumes in multi-row mode under this mapping.
    ///
    /// Occurrences are counted per token actually replaced, so a run-on
    /// capture adds to its first word unless the capture itself is mapped.
    #[must_use]
    pub fn rows_per_document(&self, discovery: &TemplateDiscovery) -> usize {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (token, count) in &discovery.occurrences {
            let key = if self.mapping.contains(token) {
                token.as_str()
            } else {
                token_head(token)
            };
            *counts.entry(key).or_insert(0) += count;
        }
        counts.into_values().max().unwrap_or(1).max(1)
    }

    /// Fill `document` from one record.
    pub fn fill_record(&self, document: &mut TemplateDocument, record: &Record) -> FillReport {
        let conditionals = resolve_conditionals(document, record);
        let mut values = RecordValues::new(&self.mapping, record);
        let substitution = substitute_document(document, &self.tokens, &mut values);
        self.apply_settings(document);
        FillReport {
            conditionals,
            substitution,
        }
    }

    /// Fill `document` from a chunk of records, one value per occurrence.
    ///
    /// Conditional regions are evaluated against the chunk's first record.
    pub fn fill_chunk(&self, document: &mut TemplateDocument, records: &[Record]) -> FillReport {
        let empty = Record::new();
        let first = records.first().unwrap_or(&empty);
        let conditionals = resolve_conditionals(document, first);
        let mut values = OccurrenceValues::new(&self.mapping, records);
        let substitution = substitute_document(document, &self.tokens, &mut values);
        self.apply_settings(document);
        FillReport {
            conditionals,
            substitution,
        }
    }

    fn apply_settings(&self, document: &mut TemplateDocument) {
        if let Some(settings) = &self.settings {
            settings.apply(document);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Paragraph, Run};
    use crate::mapping::MappingEntry;
    use crate::placeholder::discover;
    use crate::settings::PagePreset;

    fn template(lines: &[&str]) -> TemplateDocument {
        TemplateDocument {
            body: lines.iter().map(|l| Paragraph::from_text(*l)).collect(),
            ..TemplateDocument::default()
        }
    }

    #[test]
    fn test_unmapped_token_never_survives() {
        let mut doc = template(&["Hello #NAME, ref #CODE."]);
        let discovery = discover(&doc);
        let mapping: Mapping = [("#NAME".to_string(), MappingEntry::column("NAME"))]
            .into_iter()
            .collect();
        let engine = TemplateEngine::new(mapping, &discovery);
        assert_eq!(engine.unknown_placeholders(), &["#CODE"]);
        engine.fill_record(&mut doc, &Record::from_pairs([("NAME", "Ada")]));
        assert_eq!(doc.plain_text(), "Hello Ada, ref .");
    }

    #[test]
    fn test_greedy_capture_with_mapped_head() {
        let mut doc = template(&["Dear #NAME is here"]);
        let discovery = discover(&doc);
        assert_eq!(discovery.placeholders, vec!["#NAME is"]);
        let mapping: Mapping = [("#NAME".to_string(), MappingEntry::column("NAME"))]
            .into_iter()
            .collect();
        let engine = TemplateEngine::new(mapping, &discovery);
        assert!(engine.unknown_placeholders().is_empty());
        engine.fill_record(&mut doc, &Record::from_pairs([("NAME", "Ada")]));
        assert_eq!(doc.plain_text(), "Dear Ada is here");
    }

    #[test]
    fn test_identity_mapping_keeps_word_after_placeholder() {
        let mut doc = template(&["Dear #NAME is here"]);
        let discovery = discover(&doc);
        let columns = vec!["NAME".to_string()];
        let engine = TemplateEngine::new(Mapping::identity(&discovery, &columns), &discovery);
        engine.fill_record(&mut doc, &Record::from_pairs([("NAME", "Ada")]));
        assert_eq!(doc.plain_text(), "Dear Ada is here");
    }

    #[test]
    fn test_identity_mapping_keeps_two_word_column() {
        let mut doc = template(&["Ship to #P_ ADDRESS today"]);
        let discovery = discover(&doc);
        let columns = vec!["NAME".to_string(), "P_ ADDRESS".to_string()];
        let engine = TemplateEngine::new(Mapping::identity(&discovery, &columns), &discovery);
        engine.fill_record(&mut doc, &Record::from_pairs([("P_ADDRESS", "1 Main St")]));
        assert_eq!(doc.plain_text(), "Ship to 1 Main St today");
    }

    #[test]
    fn test_multi_row_counts_run_on_capture() {
        let mut doc = template(&["#ITEM each", "#ITEM", "#ITEM"]);
        let discovery = discover(&doc);
        let mapping: Mapping = [("#ITEM".to_string(), MappingEntry::column("ITEM"))]
            .into_iter()
            .collect();
        let engine = TemplateEngine::new(mapping, &discovery);
        assert_eq!(engine.rows_per_document(&discovery), 3);

        let records: Vec<Record> = ["a", "b", "c"]
            .iter()
            .map(|v| Record::from_pairs([("ITEM", *v)]))
            .collect();
        engine.fill_chunk(&mut doc, &records);
        assert_eq!(doc.plain_text(), "a each\nb\nc");
    }

    #[test]
    fn test_unknown_two_word_blanks_head_only() {
        let mut doc = template(&["Hello #UNKNOWN world"]);
        let engine = TemplateEngine::new(Mapping::new(), &discover(&doc));
        engine.fill_record(&mut doc, &Record::new());
        assert_eq!(doc.plain_text(), "Hello  world");
    }

    #[test]
    fn test_fill_record_runs_full_pipeline() {
        let mut doc = TemplateDocument {
            body: vec![
                Paragraph::from_text("#IF(STATUS=Active)"),
                Paragraph::from_runs(vec![Run::new("Welcome back #NA"), Run::new("ME")]),
                Paragraph::from_text("#ENDIF"),
                Paragraph::from_text("Bye #NAME"),
            ],
            sections: vec![crate::document::Section::default()],
            ..TemplateDocument::default()
        };
        let engine = TemplateEngine::new(Mapping::identity(&discover(&doc), &[]), &discover(&doc))
            .with_settings(&DocumentSettings {
                page_size: PagePreset::Letter,
                font_name: Some("Calibri".to_string()),
                ..DocumentSettings::default()
            })
            .unwrap();

        let mut active = doc.clone();
        let report = engine.fill_record(
            &mut active,
            &Record::from_pairs([("STATUS", "ACTIVE"), ("NAME", "Ada")]),
        );
        assert_eq!(report.conditionals.kept, 1);
        assert_eq!(report.substitution.replaced, 2);
        assert_eq!(active.plain_text(), "\nWelcome back Ada\n\nBye Ada");
        assert!(active.sections[0].page.is_some());
        assert_eq!(active.body[1].runs[0].style.font_name.as_deref(), Some("Calibri"));

        engine.fill_record(&mut doc, &Record::from_pairs([("STATUS", "Inactive"), ("NAME", "Bo")]));
        assert_eq!(doc.plain_text(), "\n\n\nBye Bo");
    }

    #[test]
    fn test_fill_chunk_occurrences() {
        let mut doc = template(&["#ITEM", "#ITEM", "#ITEM"]);
        let discovery = discover(&doc);
        assert_eq!(discovery.rows_per_document, 3);
        let engine = TemplateEngine::new(Mapping::identity(&discovery, &[]), &discovery);
        let records = vec![
            Record::from_pairs([("ITEM", "a")]),
            Record::from_pairs([("ITEM", "b")]),
            Record::new(),
        ];
        engine.fill_chunk(&mut doc, &records);
        assert_eq!(doc.plain_text(), "a\nb\n");
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let engine = TemplateEngine::new(Mapping::new(), &TemplateDiscovery::default());
        let settings = DocumentSettings {
            page_size: PagePreset::Custom,
            ..DocumentSettings::default()
        };
        assert!(engine.with_settings(&settings).is_err());
    }
}
