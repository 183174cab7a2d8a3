use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::domain::{
    DocumentCategory, DocumentId, DocumentKey, DocumentRecord, Language, Translation,
    TranslationId,
};
use super::orchestrator::ApplicationOrchestrator;
use super::services::{FileUpload, UploadMeta};
use super::ApplicationError;

/// Document and translation operations for one application.
pub struct DocumentDesk<'a> {
    orchestrator: &'a ApplicationOrchestrator,
}

impl ApplicationOrchestrator {
    pub fn document_desk(&self) -> DocumentDesk<'_> {
        DocumentDesk { orchestrator: self }
    }
}

impl DocumentDesk<'_> {
    /// Upload the document for `key`, replacing any previous record only once the upload
    /// succeeds. A second upload of the same key while one is pending is a conflict.
    pub async fn upload(
        &self,
        key: DocumentKey,
        language: Language,
        file: FileUpload,
        now: DateTime<Utc>,
    ) -> Result<DocumentRecord, ApplicationError> {
        let orchestrator = self.orchestrator;
        let application = orchestrator.mutable_id(now)?;

        let Some(_claim) = orchestrator.uploads.begin(key) else {
            warn!(application = %application.0, key = key.code(), "upload already pending for key");
            return Err(ApplicationError::Conflict(format!(
                "an upload for '{}' is already pending",
                key.code()
            )));
        };

        let category = orchestrator
            .settings
            .resolver
            .catalog()
            .entry(key)
            .map(|entry| entry.category)
            .unwrap_or(DocumentCategory::Administrative);
        debug!(
            application = %application.0,
            key = key.code(),
            file = %file.file_name,
            "uploading document"
        );

        let meta = UploadMeta {
            category,
            key,
            language,
        };
        let record = orchestrator.remote(
            orchestrator
                .services
                .documents
                .upload(&application, file, meta)
                .await,
        )?;

        let mut state = orchestrator.lock();
        state.documents.retain(|existing| existing.key != key);
        state.documents.push(record.clone());
        Ok(record)
    }

    pub async fn set_language(
        &self,
        document: &DocumentId,
        language: Language,
        now: DateTime<Utc>,
    ) -> Result<DocumentRecord, ApplicationError> {
        let orchestrator = self.orchestrator;
        orchestrator.mutable_id(now)?;
        self.known(document)?;

        let updated = orchestrator.remote(
            orchestrator
                .services
                .documents
                .update(document, language)
                .await,
        )?;
        self.replace(updated.clone());
        Ok(updated)
    }

    pub async fn remove(
        &self,
        document: &DocumentId,
        now: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        let orchestrator = self.orchestrator;
        orchestrator.mutable_id(now)?;
        self.known(document)?;

        orchestrator.remote(orchestrator.services.documents.delete(document).await)?;
        orchestrator
            .lock()
            .documents
            .retain(|existing| &existing.id != document);
        Ok(())
    }

    pub async fn fetch_content(&self, document: &DocumentId) -> Result<Vec<u8>, ApplicationError> {
        let orchestrator = self.orchestrator;
        orchestrator.ensure_session()?;
        orchestrator.remote(orchestrator.services.documents.fetch_content(document).await)
    }

    /// Attach a translation; one per target language, the newest replaces an older one.
    pub async fn add_translation(
        &self,
        document: &DocumentId,
        target_language: Language,
        file: FileUpload,
        now: DateTime<Utc>,
    ) -> Result<Translation, ApplicationError> {
        let orchestrator = self.orchestrator;
        orchestrator.mutable_id(now)?;
        self.known(document)?;

        let translation = orchestrator.remote(
            orchestrator
                .services
                .translations
                .upload(document, file, target_language)
                .await,
        )?;

        let mut state = orchestrator.lock();
        if let Some(record) = state
            .documents
            .iter_mut()
            .find(|record| &record.id == document)
        {
            record
                .translations
                .retain(|existing| existing.target_language != translation.target_language);
            record.translations.push(translation.clone());
        }
        Ok(translation)
    }

    pub async fn remove_translation(
        &self,
        document: &DocumentId,
        translation: &TranslationId,
        now: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        let orchestrator = self.orchestrator;
        orchestrator.mutable_id(now)?;
        self.known(document)?;

        orchestrator.remote(orchestrator.services.translations.delete(translation).await)?;
        let mut state = orchestrator.lock();
        if let Some(record) = state
            .documents
            .iter_mut()
            .find(|record| &record.id == document)
        {
            record
                .translations
                .retain(|existing| &existing.id != translation);
        }
        Ok(())
    }

    /// Pull translation statuses from the service, e.g. after a reviewer approved one.
    pub async fn refresh_translations(
        &self,
        document: &DocumentId,
    ) -> Result<Vec<Translation>, ApplicationError> {
        let orchestrator = self.orchestrator;
        orchestrator.ensure_session()?;
        self.known(document)?;

        let translations =
            orchestrator.remote(orchestrator.services.translations.list(document).await)?;
        let mut state = orchestrator.lock();
        if let Some(record) = state
            .documents
            .iter_mut()
            .find(|record| &record.id == document)
        {
            record.translations = translations.clone();
        }
        Ok(translations)
    }

    pub async fn fetch_translation_content(
        &self,
        translation: &TranslationId,
    ) -> Result<Vec<u8>, ApplicationError> {
        let orchestrator = self.orchestrator;
        orchestrator.ensure_session()?;
        orchestrator.remote(
            orchestrator
                .services
                .translations
                .fetch_content(translation)
                .await,
        )
    }

    fn known(&self, document: &DocumentId) -> Result<(), ApplicationError> {
        let state = self.orchestrator.lock();
        if state.documents.iter().any(|record| &record.id == document) {
            Ok(())
        } else {
            Err(ApplicationError::NotFound(format!("document {}", document.0)))
        }
    }

    fn replace(&self, updated: DocumentRecord) {
        let mut state = self.orchestrator.lock();
        match state
            .documents
            .iter_mut()
            .find(|record| record.id == updated.id)
        {
            Some(record) => *record = updated,
            None => state.documents.push(updated),
        }
    }
}
