use serde::{Deserialize, Serialize};

use super::super::domain::{DestinationTag, DocumentCategory, DocumentKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub key: DocumentKey,
    pub label: String,
    pub category: DocumentCategory,
    pub required: bool,
}

/// Named run of documents. Groups without a destination apply to every application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentGroup {
    pub name: String,
    #[serde(default)]
    pub destination: Option<DestinationTag>,
    pub entries: Vec<DocumentEntry>,
}

impl DocumentGroup {
    pub fn is_base(&self) -> bool {
        self.destination.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCatalog {
    groups: Vec<DocumentGroup>,
}

impl DocumentCatalog {
    pub fn new(groups: Vec<DocumentGroup>) -> Self {
        Self { groups }
    }

    pub fn standard() -> Self {
        Self::new(standard_groups())
    }

    pub fn groups(&self) -> &[DocumentGroup] {
        &self.groups
    }

    pub fn base_groups(&self) -> impl Iterator<Item = &DocumentGroup> {
        self.groups.iter().filter(|group| group.is_base())
    }

    pub fn groups_for(&self, destination: DestinationTag) -> impl Iterator<Item = &DocumentGroup> {
        self.groups
            .iter()
            .filter(move |group| group.destination == Some(destination))
    }

    pub fn entry(&self, key: DocumentKey) -> Option<&DocumentEntry> {
        self.groups
            .iter()
            .flat_map(|group| group.entries.iter())
            .find(|entry| entry.key == key)
    }
}

fn entry(
    key: DocumentKey,
    label: &str,
    category: DocumentCategory,
    required: bool,
) -> DocumentEntry {
    DocumentEntry {
        key,
        label: label.to_string(),
        category,
        required,
    }
}

fn group(
    name: &str,
    destination: Option<DestinationTag>,
    entries: Vec<DocumentEntry>,
) -> DocumentGroup {
    DocumentGroup {
        name: name.to_string(),
        destination,
        entries,
    }
}

fn standard_groups() -> Vec<DocumentGroup> {
    use DocumentCategory::*;
    use DocumentKey::*;

    vec![
        group(
            "identity",
            None,
            vec![
                entry(Passport, "Passport", Identity, true),
                entry(IdentityPhoto, "Identity photo", Identity, true),
                entry(BirthCertificate, "Birth certificate", Identity, true),
                entry(NationalId, "National identity card", Identity, false),
            ],
        ),
        group(
            "academic",
            None,
            vec![
                entry(BaccalaureateDiploma, "Baccalaureate diploma", Academic, true),
                entry(BaccalaureateTranscript, "Baccalaureate transcript", Academic, true),
                entry(UniversityTranscripts, "University transcripts", Academic, false),
                entry(UniversityDiploma, "University diploma", Academic, false),
                entry(LanguageCertificate, "Language test certificate", Language, true),
                entry(CurriculumVitae, "Curriculum vitae", Administrative, true),
                entry(MotivationLetter, "Motivation letter", Administrative, true),
                entry(RecommendationLetter, "Recommendation letter", Administrative, false),
            ],
        ),
        group(
            "france",
            Some(DestinationTag::France),
            vec![
                entry(CampusFranceForm, "Campus France application form", Administrative, true),
                entry(FinancialGuarantee, "Proof of financial resources", Financial, true),
                entry(HousingAttestation, "Housing attestation", Administrative, false),
            ],
        ),
        group(
            "china",
            Some(DestinationTag::China),
            vec![
                entry(
                    PhysicalExaminationForm,
                    "Foreigner physical examination form",
                    Administrative,
                    true,
                ),
                entry(NonCriminalRecord, "Non-criminal record certificate", Identity, true),
                entry(StudyPlan, "Study plan", Academic, true),
                entry(FinancialGuarantee, "Bank statement", Financial, true),
            ],
        ),
        group(
            "morocco",
            Some(DestinationTag::Morocco),
            vec![
                entry(HousingAttestation, "Housing attestation", Administrative, true),
                entry(NonCriminalRecord, "Criminal record extract", Identity, false),
            ],
        ),
        group(
            "canada",
            Some(DestinationTag::Canada),
            vec![
                entry(
                    AcceptanceCertificate,
                    "Quebec acceptance certificate (CAQ)",
                    Administrative,
                    true,
                ),
                entry(FinancialGuarantee, "Proof of financial support", Financial, true),
                entry(PhysicalExaminationForm, "Immigration medical exam", Administrative, false),
            ],
        ),
        group(
            "belgium",
            Some(DestinationTag::Belgium),
            vec![
                entry(EquivalenceDecision, "Diploma equivalence decision", Academic, true),
                entry(FinancialGuarantee, "Solvency undertaking", Financial, true),
            ],
        ),
    ]
}
