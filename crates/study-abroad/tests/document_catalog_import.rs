use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use study_abroad::workflows::application::{
    assess, resolve, CatalogImportError, DestinationTag, DocumentCatalog, DocumentCategory,
    DocumentId, DocumentKey, DocumentRecord, Language, LanguagePolicy, ValidationStatus,
};

const CATALOG_CSV: &str = "Group,Destination,Key,Label,Category,Required\n\
identity,,passport,Passport,identity,yes\n\
identity,,identity_photo,Identity photo,identity,yes\n\
identity,,national_id,National ID,identity,no\n\
belgium,Belgium,equivalence_decision,Equivalence decision,administrative,required\n\
belgium,Belgium,financial_guarantee,Blocked account certificate,financial,yes\n\
canada,canada,acceptance_certificate,Letter of acceptance,academic,yes\n";

fn scratch_file(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("study-abroad-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("scratch dir");
    let path = dir.join(name);
    fs::write(&path, contents).expect("write scratch file");
    path
}

fn record(id: &str, key: DocumentKey, language: Language) -> DocumentRecord {
    DocumentRecord {
        id: DocumentId(id.to_string()),
        key,
        file_name: format!("{}.pdf", key.code()),
        original_language: language,
        translations: Vec::new(),
        validation_status: ValidationStatus::Pending,
    }
}

#[test]
fn imported_catalog_drives_requirement_resolution() {
    let path = scratch_file("catalog.csv", CATALOG_CSV);
    let catalog = DocumentCatalog::from_path(&path).expect("catalog imports");

    assert_eq!(catalog.groups().len(), 3);
    assert_eq!(catalog.base_groups().count(), 1);
    let guarantee = catalog
        .entry(DocumentKey::FinancialGuarantee)
        .expect("guarantee entry");
    assert_eq!(guarantee.category, DocumentCategory::Financial);
    assert_eq!(guarantee.label, "Blocked account certificate");
    assert!(!catalog.entry(DocumentKey::NationalId).expect("national id").required);

    let destinations: BTreeSet<DestinationTag> = [DestinationTag::Belgium].into_iter().collect();
    let matrix = resolve(&destinations, &catalog);
    let required: Vec<DocumentKey> = matrix.required_keys().collect();
    assert_eq!(
        required,
        vec![
            DocumentKey::Passport,
            DocumentKey::IdentityPhoto,
            DocumentKey::EquivalenceDecision,
            DocumentKey::FinancialGuarantee,
        ]
    );
    assert!(!required.contains(&DocumentKey::AcceptanceCertificate));

    let records: Vec<DocumentRecord> = required
        .iter()
        .enumerate()
        .map(|(index, key)| record(&format!("doc-{index}"), *key, Language::english()))
        .collect();
    let report = assess(&matrix, &records, &LanguagePolicy::default());
    assert!(report.required_documents_in(DestinationTag::Belgium));
    assert!(report.is_complete());
    assert_eq!(report.full_catalog.total, 5);

    fs::remove_file(path).ok();
}

#[test]
fn import_errors_name_the_offending_line() {
    let csv = "Group,Destination,Key,Label,Category,Required\n\
identity,,passport,Passport,identity,yes\n\
identity,,visa_sticker,Visa,identity,yes\n";
    match DocumentCatalog::from_csv_reader(csv.as_bytes()) {
        Err(CatalogImportError::UnknownKey { line, value }) => {
            assert_eq!(line, 3);
            assert_eq!(value, "visa_sticker");
        }
        other => panic!("expected unknown key, got {other:?}"),
    }

    let csv = "Group,Destination,Key,Label,Category,Required\n\
finance,france,financial_guarantee,Guarantee,funding,yes\n";
    let err = DocumentCatalog::from_csv_reader(csv.as_bytes()).expect_err("bad category");
    assert_eq!(err.to_string(), "line 2: unknown document category 'funding'");
}

#[test]
fn missing_catalog_file_is_an_io_error() {
    let path = std::env::temp_dir().join("study-abroad-missing-catalog.csv");
    assert!(matches!(
        DocumentCatalog::from_path(path),
        Err(CatalogImportError::Io(_))
    ));
}
