use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::super::domain::{DestinationTag, DocumentCategory, DocumentKey};
use super::catalog::{DocumentCatalog, DocumentEntry, DocumentGroup};

#[derive(Debug)]
pub enum CatalogImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    UnknownKey { line: u64, value: String },
    UnknownDestination { line: u64, value: String },
    UnknownCategory { line: u64, value: String },
}

impl std::fmt::Display for CatalogImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogImportError::Io(err) => write!(f, "failed to read document catalog: {}", err),
            CatalogImportError::Csv(err) => write!(f, "invalid document catalog CSV: {}", err),
            CatalogImportError::UnknownKey { line, value } => {
                write!(f, "line {}: unknown document key '{}'", line, value)
            }
            CatalogImportError::UnknownDestination { line, value } => {
                write!(f, "line {}: unknown destination '{}'", line, value)
            }
            CatalogImportError::UnknownCategory { line, value } => {
                write!(f, "line {}: unknown document category '{}'", line, value)
            }
        }
    }
}

impl std::error::Error for CatalogImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogImportError::Io(err) => Some(err),
            CatalogImportError::Csv(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CatalogImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for CatalogImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(rename = "Group")]
    group: String,
    #[serde(rename = "Destination", default)]
    destination: String,
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Label")]
    label: String,
    #[serde(rename = "Category")]
    category: String,
    #[serde(rename = "Required", default)]
    required: String,
}

fn parse_required(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "1" | "required"
    )
}

impl DocumentCatalog {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Load groups from a CSV export. Groups keep the order of their first row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, CatalogImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut groups: Vec<DocumentGroup> = Vec::new();

        let headers = csv_reader.headers()?.clone();

        for record in csv_reader.records() {
            let record = record?;
            // first physical line of the record; quoted fields may span several
            let line = record
                .position()
                .map(|position| position.line())
                .unwrap_or_default();
            let row: CatalogRow = record.deserialize(Some(&headers))?;

            let key: DocumentKey = row
                .key
                .parse()
                .map_err(|_| CatalogImportError::UnknownKey {
                    line,
                    value: row.key.clone(),
                })?;
            let category: DocumentCategory =
                row.category
                    .parse()
                    .map_err(|_| CatalogImportError::UnknownCategory {
                        line,
                        value: row.category.clone(),
                    })?;
            let destination = if row.destination.is_empty() {
                None
            } else {
                Some(row.destination.parse::<DestinationTag>().map_err(|_| {
                    CatalogImportError::UnknownDestination {
                        line,
                        value: row.destination.clone(),
                    }
                })?)
            };

            let entry = DocumentEntry {
                key,
                label: row.label,
                category,
                required: parse_required(&row.required),
            };

            match groups
                .iter_mut()
                .find(|group| group.name == row.group && group.destination == destination)
            {
                Some(group) => group.entries.push(entry),
                None => groups.push(DocumentGroup {
                    name: row.group,
                    destination,
                    entries: vec![entry],
                }),
            }
        }

        Ok(DocumentCatalog::new(groups))
    }
}
