//! Remote collaborators the orchestrator talks to. Implementations live at the edge (HTTP
//! clients in production, in-memory fakes in tests and the demo binary).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationId, DocumentCategory, DocumentId, DocumentKey, DocumentRecord,
    Language, ModificationRequest, ProgramRef, Qualification, QualificationDraft,
    QualificationId, SectionFlags, SubmittedSnapshot, Translation, TranslationId,
};
use crate::workflows::questionnaire::AnswerMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("authentication expired")]
    AuthExpired,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Full draft state sent on every save. `revision` orders saves; the service keeps the newest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationUpdate {
    pub revision: u64,
    pub answers: AnswerMap,
    pub sections: SectionFlags,
    /// Present only while an approved modification window is open.
    #[serde(default)]
    pub submitted_snapshot: Option<SubmittedSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    #[serde(default)]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMeta {
    pub category: DocumentCategory,
    pub key: DocumentKey,
    pub language: Language,
}

#[async_trait]
pub trait ApplicationService: Send + Sync {
    async fn load_or_create(&self, program: &ProgramRef) -> Result<Application, ServiceError>;
    async fn get(&self, id: &ApplicationId) -> Result<Application, ServiceError>;
    async fn update(
        &self,
        id: &ApplicationId,
        update: ApplicationUpdate,
    ) -> Result<Application, ServiceError>;
    async fn submit(
        &self,
        id: &ApplicationId,
        snapshot: SubmittedSnapshot,
    ) -> Result<Application, ServiceError>;
}

#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn list(&self, application: &ApplicationId) -> Result<Vec<DocumentRecord>, ServiceError>;
    async fn upload(
        &self,
        application: &ApplicationId,
        file: FileUpload,
        meta: UploadMeta,
    ) -> Result<DocumentRecord, ServiceError>;
    async fn update(
        &self,
        id: &DocumentId,
        language: Language,
    ) -> Result<DocumentRecord, ServiceError>;
    async fn delete(&self, id: &DocumentId) -> Result<(), ServiceError>;
    async fn fetch_content(&self, id: &DocumentId) -> Result<Vec<u8>, ServiceError>;
}

#[async_trait]
pub trait TranslationService: Send + Sync {
    async fn list(&self, document: &DocumentId) -> Result<Vec<Translation>, ServiceError>;
    async fn upload(
        &self,
        document: &DocumentId,
        file: FileUpload,
        target_language: Language,
    ) -> Result<Translation, ServiceError>;
    async fn update(
        &self,
        id: &TranslationId,
        target_language: Language,
    ) -> Result<Translation, ServiceError>;
    async fn delete(&self, id: &TranslationId) -> Result<(), ServiceError>;
    async fn fetch_content(&self, id: &TranslationId) -> Result<Vec<u8>, ServiceError>;
}

#[async_trait]
pub trait QualificationService: Send + Sync {
    async fn list(&self, application: &ApplicationId)
        -> Result<Vec<Qualification>, ServiceError>;
    async fn add(
        &self,
        application: &ApplicationId,
        draft: QualificationDraft,
    ) -> Result<Qualification, ServiceError>;
    async fn update(
        &self,
        id: &QualificationId,
        draft: QualificationDraft,
    ) -> Result<Qualification, ServiceError>;
    async fn delete(&self, id: &QualificationId) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait ModificationRequestService: Send + Sync {
    async fn create(
        &self,
        application: &ApplicationId,
        reason: &str,
    ) -> Result<ModificationRequest, ServiceError>;
    async fn get_status(
        &self,
        application: &ApplicationId,
    ) -> Result<Option<ModificationRequest>, ServiceError>;
}

/// Local credential and session state cleared when the backend reports an expired session.
pub trait SessionMarkers: Send + Sync {
    fn clear(&self);
}

/// Every collaborator an orchestrator needs.
#[derive(Clone)]
pub struct ExternalServices {
    pub applications: Arc<dyn ApplicationService>,
    pub documents: Arc<dyn DocumentService>,
    pub translations: Arc<dyn TranslationService>,
    pub qualifications: Arc<dyn QualificationService>,
    pub modifications: Arc<dyn ModificationRequestService>,
    pub markers: Arc<dyn SessionMarkers>,
}
