use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::questionnaire::{AnswerMap, AnswerValue};

/// Identifier wrapper for applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Reference to the study programme an application targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgramRef(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TranslationId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualificationId(pub String);

/// Answer id under which the questionnaire and the profile form store destinations.
pub const DESTINATIONS_FIELD: &str = "destinations";

/// Target study country selected by the applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationTag {
    France,
    China,
    Morocco,
    Canada,
    Belgium,
}

impl DestinationTag {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::France,
            Self::China,
            Self::Morocco,
            Self::Canada,
            Self::Belgium,
        ]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::France => "france",
            Self::China => "china",
            Self::Morocco => "morocco",
            Self::Canada => "canada",
            Self::Belgium => "belgium",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::France => "France",
            Self::China => "China",
            Self::Morocco => "Morocco",
            Self::Canada => "Canada",
            Self::Belgium => "Belgium",
        }
    }

    /// Destinations currently selected in an answer snapshot; unknown codes are ignored.
    pub fn from_answers(answers: &AnswerMap) -> BTreeSet<DestinationTag> {
        match answers.get(DESTINATIONS_FIELD) {
            Some(AnswerValue::Choices(codes)) => codes
                .iter()
                .filter_map(|code| code.parse().ok())
                .collect(),
            Some(AnswerValue::Text(code)) => code.parse().ok().into_iter().collect(),
            _ => BTreeSet::new(),
        }
    }
}

impl FromStr for DestinationTag {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ordered()
            .into_iter()
            .find(|tag| tag.code() == normalized)
            .ok_or_else(|| format!("unknown destination '{value}'"))
    }
}

/// Lowercase ISO-639-1 language code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

const KNOWN_LANGUAGES: &[(&str, &str)] = &[
    ("fr", "french"),
    ("en", "english"),
    ("ar", "arabic"),
    ("zh", "chinese"),
    ("es", "spanish"),
    ("de", "german"),
    ("nl", "dutch"),
    ("pt", "portuguese"),
];

impl Language {
    pub fn french() -> Self {
        Self("fr".to_string())
    }

    pub fn english() -> Self {
        Self("en".to_string())
    }

    pub fn arabic() -> Self {
        Self("ar".to_string())
    }

    pub fn chinese() -> Self {
        Self("zh".to_string())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        KNOWN_LANGUAGES
            .iter()
            .find(|(code, name)| *code == normalized || *name == normalized)
            .map(|(code, _)| Self(code.to_string()))
            .ok_or_else(|| format!("unknown language '{value}'"))
    }
}

impl TryFrom<String> for Language {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable document key attached at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKey {
    Passport,
    NationalId,
    IdentityPhoto,
    BirthCertificate,
    BaccalaureateDiploma,
    BaccalaureateTranscript,
    UniversityTranscripts,
    UniversityDiploma,
    LanguageCertificate,
    CurriculumVitae,
    MotivationLetter,
    RecommendationLetter,
    CampusFranceForm,
    FinancialGuarantee,
    HousingAttestation,
    PhysicalExaminationForm,
    NonCriminalRecord,
    StudyPlan,
    AcceptanceCertificate,
    EquivalenceDecision,
}

impl DocumentKey {
    pub const ALL: [DocumentKey; 20] = [
        DocumentKey::Passport,
        DocumentKey::NationalId,
        DocumentKey::IdentityPhoto,
        DocumentKey::BirthCertificate,
        DocumentKey::BaccalaureateDiploma,
        DocumentKey::BaccalaureateTranscript,
        DocumentKey::UniversityTranscripts,
        DocumentKey::UniversityDiploma,
        DocumentKey::LanguageCertificate,
        DocumentKey::CurriculumVitae,
        DocumentKey::MotivationLetter,
        DocumentKey::RecommendationLetter,
        DocumentKey::CampusFranceForm,
        DocumentKey::FinancialGuarantee,
        DocumentKey::HousingAttestation,
        DocumentKey::PhysicalExaminationForm,
        DocumentKey::NonCriminalRecord,
        DocumentKey::StudyPlan,
        DocumentKey::AcceptanceCertificate,
        DocumentKey::EquivalenceDecision,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            DocumentKey::Passport => "passport",
            DocumentKey::NationalId => "national_id",
            DocumentKey::IdentityPhoto => "identity_photo",
            DocumentKey::BirthCertificate => "birth_certificate",
            DocumentKey::BaccalaureateDiploma => "baccalaureate_diploma",
            DocumentKey::BaccalaureateTranscript => "baccalaureate_transcript",
            DocumentKey::UniversityTranscripts => "university_transcripts",
            DocumentKey::UniversityDiploma => "university_diploma",
            DocumentKey::LanguageCertificate => "language_certificate",
            DocumentKey::CurriculumVitae => "curriculum_vitae",
            DocumentKey::MotivationLetter => "motivation_letter",
            DocumentKey::RecommendationLetter => "recommendation_letter",
            DocumentKey::CampusFranceForm => "campus_france_form",
            DocumentKey::FinancialGuarantee => "financial_guarantee",
            DocumentKey::HousingAttestation => "housing_attestation",
            DocumentKey::PhysicalExaminationForm => "physical_examination_form",
            DocumentKey::NonCriminalRecord => "non_criminal_record",
            DocumentKey::StudyPlan => "study_plan",
            DocumentKey::AcceptanceCertificate => "acceptance_certificate",
            DocumentKey::EquivalenceDecision => "equivalence_decision",
        }
    }
}

impl FromStr for DocumentKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|key| key.code() == normalized)
            .ok_or_else(|| format!("unknown document key '{value}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Identity,
    Academic,
    Language,
    Financial,
    Administrative,
}

impl FromStr for DocumentCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "identity" => Ok(Self::Identity),
            "academic" => Ok(Self::Academic),
            "language" => Ok(Self::Language),
            "financial" => Ok(Self::Financial),
            "administrative" => Ok(Self::Administrative),
            other => Err(format!("unknown document category '{other}'")),
        }
    }
}

/// Review state shared by uploaded documents and their translations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

impl ValidationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ValidationStatus::Pending => "pending",
            ValidationStatus::UnderReview => "under_review",
            ValidationStatus::Approved => "approved",
            ValidationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub id: TranslationId,
    pub target_language: Language,
    pub status: ValidationStatus,
}

/// Uploaded document; one record per key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub key: DocumentKey,
    pub file_name: String,
    pub original_language: Language,
    #[serde(default)]
    pub translations: Vec<Translation>,
    pub validation_status: ValidationStatus,
}

impl DocumentRecord {
    /// Original language matches, or a translation into it has not been rejected.
    pub fn available_in(&self, language: &Language) -> bool {
        self.original_language == *language
            || self.translations.iter().any(|translation| {
                translation.target_language == *language
                    && translation.status != ValidationStatus::Rejected
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualificationKind {
    Language,
    Academic,
    Professional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualification {
    pub id: QualificationId,
    pub kind: QualificationKind,
    pub title: String,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
}

/// Qualification fields as entered, before the service assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationDraft {
    pub kind: QualificationKind,
    pub title: String,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
}

/// Application steps. Sections 1–5 gate progress; tracking only reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionId {
    #[serde(rename = "personalInformation")]
    PersonalInformation,
    #[serde(rename = "academicBackground")]
    AcademicBackground,
    #[serde(rename = "documents")]
    Documents,
    #[serde(rename = "preferences")]
    Preferences,
    #[serde(rename = "review")]
    Review,
    #[serde(rename = "tracking")]
    Tracking,
}

impl SectionId {
    pub const GATING: [SectionId; 5] = [
        SectionId::PersonalInformation,
        SectionId::AcademicBackground,
        SectionId::Documents,
        SectionId::Preferences,
        SectionId::Review,
    ];

    /// Sections that must hold before submission.
    pub const BEFORE_SUBMIT: [SectionId; 4] = [
        SectionId::PersonalInformation,
        SectionId::AcademicBackground,
        SectionId::Documents,
        SectionId::Preferences,
    ];

    pub const fn number(self) -> u8 {
        match self {
            SectionId::PersonalInformation => 1,
            SectionId::AcademicBackground => 2,
            SectionId::Documents => 3,
            SectionId::Preferences => 4,
            SectionId::Review => 5,
            SectionId::Tracking => 6,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            SectionId::PersonalInformation => "personalInformation",
            SectionId::AcademicBackground => "academicBackground",
            SectionId::Documents => "documents",
            SectionId::Preferences => "preferences",
            SectionId::Review => "review",
            SectionId::Tracking => "tracking",
        }
    }

    /// Sections persisted when the applicant confirms the step.
    pub const fn confirmed_by_user(self) -> bool {
        matches!(
            self,
            SectionId::PersonalInformation | SectionId::AcademicBackground | SectionId::Documents
        )
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Persisted section gates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionFlags(BTreeMap<SectionId, bool>);

impl SectionFlags {
    pub fn get(&self, section: SectionId) -> bool {
        self.0.get(&section).copied().unwrap_or(false)
    }

    pub fn set(&mut self, section: SectionId, value: bool) {
        self.0.insert(section, value);
    }

    pub fn missing_before_submit(&self) -> Vec<SectionId> {
        SectionId::BEFORE_SUBMIT
            .into_iter()
            .filter(|section| !self.get(*section))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectionId, bool)> + '_ {
        self.0.iter().map(|(section, value)| (*section, *value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
        }
    }
}

/// Frozen copy of the application taken at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedSnapshot {
    pub answers: AnswerMap,
    pub documents: Vec<DocumentRecord>,
    pub qualifications: Vec<Qualification>,
    pub submitted_at: DateTime<Utc>,
    /// Set when an approved modification window rewrote the snapshot.
    #[serde(default)]
    pub revised_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub program: ProgramRef,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub sections: SectionFlags,
    #[serde(default)]
    pub answers: AnswerMap,
    /// Logical timestamp of the last applied save.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub submitted_snapshot: Option<SubmittedSnapshot>,
}

impl Application {
    pub fn draft(id: ApplicationId, program: ProgramRef) -> Self {
        Self {
            id,
            program,
            status: ApplicationStatus::Draft,
            sections: SectionFlags::default(),
            answers: AnswerMap::new(),
            revision: 0,
            submitted_snapshot: None,
        }
    }

    pub fn destinations(&self) -> BTreeSet<DestinationTag> {
        DestinationTag::from_answers(&self.answers)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ModificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ModificationStatus::Pending => "pending",
            ModificationStatus::Approved => "approved",
            ModificationStatus::Rejected => "rejected",
        }
    }
}

/// Externally approved exception allowing edits to a submitted application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationRequest {
    pub application_id: ApplicationId,
    pub reason: String,
    pub status: ModificationStatus,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

impl ModificationRequest {
    pub fn permits_edit(&self, now: DateTime<Utc>) -> bool {
        self.status == ModificationStatus::Approved
            && self.valid_until.map(|until| now < until).unwrap_or(false)
    }
}
