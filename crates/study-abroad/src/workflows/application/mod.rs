//! Application intake: document requirements, section gates, and the orchestrator that
//! talks to the remote services.

mod desk;
pub mod documents;
pub mod domain;
mod orchestrator;
pub mod router;
pub mod saving;
pub mod sections;
pub mod services;

#[cfg(test)]
mod tests;

use axum::http::StatusCode;

use crate::workflows::questionnaire::AnswerError;

pub use desk::DocumentDesk;
pub use documents::{
    assess, resolve, CatalogImportError, Completion, ComplianceReport, DocumentCatalog,
    DocumentCompliance, DocumentEntry, DocumentGroup, DocumentRequirementResolver,
    LanguagePolicy, RequiredDocument, RequirementMatrix,
};
pub use domain::{
    Application, ApplicationId, ApplicationStatus, DestinationTag, DocumentCategory, DocumentId,
    DocumentKey, DocumentRecord, Language, ModificationRequest, ModificationStatus, ProgramRef,
    Qualification, QualificationDraft, QualificationId, QualificationKind, SectionFlags,
    SectionId, SubmittedSnapshot, Translation, TranslationId, ValidationStatus,
};
pub use orchestrator::{ApplicationOrchestrator, OrchestratorSettings, SaveOutcome, TrackingView};
pub use router::engine_router;
pub use saving::{SaveCoalescer, SaveSequencer, UploadLedger};
pub use sections::{
    Progress, SectionContext, SectionValidationEngine, SectionVerdict, ValidationConfig,
};
pub use services::{
    ApplicationService, ApplicationUpdate, DocumentService, ExternalServices, FileUpload,
    ModificationRequestService, QualificationService, ServiceError, SessionMarkers,
    TranslationService, UploadMeta,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApplicationError {
    #[error("required sections are incomplete: {}", section_list(.missing))]
    Validation { missing: Vec<SectionId> },
    #[error("remote save failed, changes kept locally: {0}")]
    Network(String),
    #[error("session expired; sign in again")]
    AuthExpired,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Answer(#[from] AnswerError),
}

fn section_list(sections: &[SectionId]) -> String {
    sections
        .iter()
        .map(|section| section.label())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ApplicationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApplicationError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApplicationError::Network(_) => StatusCode::BAD_GATEWAY,
            ApplicationError::AuthExpired => StatusCode::UNAUTHORIZED,
            ApplicationError::NotFound(_) => StatusCode::NOT_FOUND,
            ApplicationError::Conflict(_) => StatusCode::CONFLICT,
            ApplicationError::Answer(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<ServiceError> for ApplicationError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Network(message) => Self::Network(message),
            ServiceError::AuthExpired => Self::AuthExpired,
            ServiceError::NotFound(message) => Self::NotFound(message),
            ServiceError::Conflict(message) => Self::Conflict(message),
        }
    }
}
