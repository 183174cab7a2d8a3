//! Document requirements per destination and the compliance view over uploaded records.

mod catalog;
mod import;

pub use catalog::{DocumentCatalog, DocumentEntry, DocumentGroup};
pub use import::CatalogImportError;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::domain::{
    DestinationTag, DocumentCategory, DocumentKey, DocumentRecord, Language, ValidationStatus,
};

/// Destination to required-language mapping with a configurable fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePolicy {
    pub default_language: Language,
    pub overrides: BTreeMap<DestinationTag, Language>,
}

impl LanguagePolicy {
    pub fn new(default_language: Language) -> Self {
        let mut overrides = BTreeMap::new();
        overrides.insert(DestinationTag::France, Language::french());
        overrides.insert(DestinationTag::China, Language::english());
        Self {
            default_language,
            overrides,
        }
    }

    pub fn required_language(&self, destination: DestinationTag) -> &Language {
        self.overrides
            .get(&destination)
            .unwrap_or(&self.default_language)
    }

    pub fn language_ok(&self, record: &DocumentRecord, destination: DestinationTag) -> bool {
        record.available_in(self.required_language(destination))
    }
}

impl Default for LanguagePolicy {
    fn default() -> Self {
        Self::new(Language::english())
    }
}

/// One required key in the resolved matrix with the destinations that demand it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredDocument {
    pub key: DocumentKey,
    pub label: String,
    pub category: DocumentCategory,
    /// Required by a base group, so every active destination applies.
    pub base: bool,
    pub destinations: BTreeSet<DestinationTag>,
}

/// Base groups plus the groups of every active destination, required sets unioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementMatrix {
    pub destinations: BTreeSet<DestinationTag>,
    pub groups: Vec<DocumentGroup>,
    pub required: Vec<RequiredDocument>,
}

impl RequirementMatrix {
    pub fn required_keys(&self) -> impl Iterator<Item = DocumentKey> + '_ {
        self.required.iter().map(|document| document.key)
    }

    /// Distinct keys across the resolved groups, optional entries included.
    pub fn catalog_keys(&self) -> BTreeSet<DocumentKey> {
        self.groups
            .iter()
            .flat_map(|group| group.entries.iter().map(|entry| entry.key))
            .collect()
    }

    /// Destinations whose language rule applies to `document`.
    pub fn applicable_destinations(&self, document: &RequiredDocument) -> BTreeSet<DestinationTag> {
        if document.base {
            self.destinations.clone()
        } else {
            document.destinations.clone()
        }
    }
}

pub fn resolve(
    destinations: &BTreeSet<DestinationTag>,
    catalog: &DocumentCatalog,
) -> RequirementMatrix {
    let groups: Vec<DocumentGroup> = catalog
        .groups()
        .iter()
        .filter(|group| match group.destination {
            None => true,
            Some(tag) => destinations.contains(&tag),
        })
        .cloned()
        .collect();

    let mut required: Vec<RequiredDocument> = Vec::new();
    for group in &groups {
        for entry in group.entries.iter().filter(|entry| entry.required) {
            let index = match required.iter().position(|document| document.key == entry.key) {
                Some(index) => index,
                None => {
                    required.push(RequiredDocument {
                        key: entry.key,
                        label: entry.label.clone(),
                        category: entry.category,
                        base: false,
                        destinations: BTreeSet::new(),
                    });
                    required.len() - 1
                }
            };
            let document = &mut required[index];
            match group.destination {
                None => document.base = true,
                Some(tag) => {
                    document.destinations.insert(tag);
                }
            }
        }
    }

    RequirementMatrix {
        destinations: destinations.clone(),
        groups,
        required,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub satisfied: usize,
    pub total: usize,
}

impl Completion {
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            self.satisfied as f32 * 100.0 / self.total as f32
        }
    }

    pub fn is_complete(&self) -> bool {
        self.satisfied >= self.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentCompliance {
    pub key: DocumentKey,
    pub uploaded: bool,
    pub status: Option<ValidationStatus>,
    pub language_ok_for: BTreeMap<DestinationTag, bool>,
    pub compliant: bool,
}

impl DocumentCompliance {
    pub fn language_ok_in(&self, destination: DestinationTag) -> bool {
        self.language_ok_for
            .get(&destination)
            .copied()
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    pub documents: Vec<DocumentCompliance>,
    pub minimum_required: Completion,
    pub full_catalog: Completion,
}

impl ComplianceReport {
    /// Every required document that applies to `destination` is uploaded, not rejected, and
    /// available in that destination's language.
    pub fn required_documents_in(&self, destination: DestinationTag) -> bool {
        self.documents
            .iter()
            .filter_map(|document| {
                document
                    .language_ok_for
                    .get(&destination)
                    .map(|language_ok| (document, *language_ok))
            })
            .all(|(document, language_ok)| {
                document.uploaded
                    && document.status != Some(ValidationStatus::Rejected)
                    && language_ok
            })
    }

    pub fn document(&self, key: DocumentKey) -> Option<&DocumentCompliance> {
        self.documents.iter().find(|document| document.key == key)
    }

    pub fn non_compliant(&self) -> impl Iterator<Item = DocumentKey> + '_ {
        self.documents
            .iter()
            .filter(|document| !document.compliant)
            .map(|document| document.key)
    }

    pub fn is_complete(&self) -> bool {
        self.minimum_required.is_complete()
    }
}

pub fn assess(
    matrix: &RequirementMatrix,
    records: &[DocumentRecord],
    policy: &LanguagePolicy,
) -> ComplianceReport {
    let record_for = |key: DocumentKey| records.iter().find(|record| record.key == key);

    let documents: Vec<DocumentCompliance> = matrix
        .required
        .iter()
        .map(|document| {
            let record = record_for(document.key);
            let applicable = matrix.applicable_destinations(document);
            let language_ok_for: BTreeMap<DestinationTag, bool> = applicable
                .iter()
                .map(|tag| {
                    let ok = record
                        .map(|record| policy.language_ok(record, *tag))
                        .unwrap_or(false);
                    (*tag, ok)
                })
                .collect();

            let compliant = match record {
                None => false,
                Some(record) if record.validation_status == ValidationStatus::Rejected => false,
                Some(record) if applicable.is_empty() => {
                    record.available_in(&policy.default_language)
                }
                Some(_) => language_ok_for.values().all(|ok| *ok),
            };

            DocumentCompliance {
                key: document.key,
                uploaded: record.is_some(),
                status: record.map(|record| record.validation_status),
                language_ok_for,
                compliant,
            }
        })
        .collect();

    let minimum_required = Completion {
        satisfied: documents.iter().filter(|document| document.compliant).count(),
        total: documents.len(),
    };

    let catalog_keys = matrix.catalog_keys();
    let full_catalog = Completion {
        satisfied: catalog_keys
            .iter()
            .filter(|key| record_for(**key).is_some())
            .count(),
        total: catalog_keys.len(),
    };

    ComplianceReport {
        documents,
        minimum_required,
        full_catalog,
    }
}

/// Catalog and language policy bundled for callers that resolve and assess together.
#[derive(Debug, Clone)]
pub struct DocumentRequirementResolver {
    catalog: DocumentCatalog,
    policy: LanguagePolicy,
}

impl DocumentRequirementResolver {
    pub fn new(catalog: DocumentCatalog, policy: LanguagePolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn catalog(&self) -> &DocumentCatalog {
        &self.catalog
    }

    pub fn policy(&self) -> &LanguagePolicy {
        &self.policy
    }

    pub fn resolve(&self, destinations: &BTreeSet<DestinationTag>) -> RequirementMatrix {
        resolve(destinations, &self.catalog)
    }

    pub fn assess(
        &self,
        destinations: &BTreeSet<DestinationTag>,
        records: &[DocumentRecord],
    ) -> ComplianceReport {
        assess(&self.resolve(destinations), records, &self.policy)
    }
}

impl Default for DocumentRequirementResolver {
    fn default() -> Self {
        Self::new(DocumentCatalog::standard(), LanguagePolicy::default())
    }
}
