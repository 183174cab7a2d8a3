use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use study_abroad::workflows::application::{
    Application, ApplicationId, ApplicationService, ApplicationStatus, ApplicationUpdate,
    DestinationTag, DocumentId, DocumentRecord, DocumentService, ExternalServices, FileUpload,
    Language, ModificationRequest, ModificationRequestService, ModificationStatus, ProgramRef,
    Qualification, QualificationDraft, QualificationId, QualificationService, SectionId,
    ServiceError, SessionMarkers, SubmittedSnapshot, Translation, TranslationId,
    TranslationService, UploadMeta, ValidationStatus,
};
use tracing::{debug, info};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-local stand-in for the remote application backend. Saves follow last-write-wins on
/// the revision carried by each update.
#[derive(Default)]
pub(crate) struct InMemoryBackend {
    applications: Mutex<HashMap<ApplicationId, Application>>,
    documents: Mutex<Vec<(ApplicationId, DocumentRecord)>>,
    contents: Mutex<HashMap<String, (String, Vec<u8>)>>,
    qualifications: Mutex<Vec<(ApplicationId, Qualification)>>,
    modifications: Mutex<HashMap<ApplicationId, ModificationRequest>>,
    sequence: AtomicU64,
}

impl InMemoryBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn services(self: &Arc<Self>, markers: Arc<dyn SessionMarkers>) -> ExternalServices {
        ExternalServices {
            applications: self.clone(),
            documents: self.clone(),
            translations: self.clone(),
            qualifications: self.clone(),
            modifications: self.clone(),
            markers,
        }
    }

    /// Reviewer decision on a document, as the back office would record it.
    pub(crate) fn review_document(&self, id: &DocumentId, status: ValidationStatus) {
        for (_, record) in guard(&self.documents).iter_mut() {
            if &record.id == id {
                record.validation_status = status;
            }
        }
    }

    pub(crate) fn review_translation(&self, id: &TranslationId, status: ValidationStatus) {
        for (_, record) in guard(&self.documents).iter_mut() {
            for translation in record.translations.iter_mut() {
                if &translation.id == id {
                    translation.status = status;
                }
            }
        }
    }

    pub(crate) fn decide_modification(
        &self,
        application: &ApplicationId,
        status: ModificationStatus,
        valid_until: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Option<ModificationRequest> {
        let mut modifications = guard(&self.modifications);
        let request = modifications.get_mut(application)?;
        request.status = status;
        request.valid_until = valid_until;
        info!(
            application = %application.0,
            status = status.label(),
            "modification request decided"
        );
        Some(request.clone())
    }

    /// Stored content type of an uploaded document or translation.
    pub(crate) fn content_type(&self, id: &str) -> Option<String> {
        guard(&self.contents)
            .get(id)
            .map(|(content_type, _)| content_type.clone())
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn store_content(&self, id: &str, file: FileUpload) {
        let content_type = if file.content_type.trim().is_empty() {
            content_type_for(&file.file_name)
        } else {
            file.content_type
        };
        guard(&self.contents).insert(id.to_string(), (content_type, file.bytes));
    }

    fn content(&self, id: &str) -> Result<Vec<u8>, ServiceError> {
        guard(&self.contents)
            .get(id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }
}

pub(crate) fn content_type_for(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[async_trait]
impl ApplicationService for InMemoryBackend {
    async fn load_or_create(&self, program: &ProgramRef) -> Result<Application, ServiceError> {
        let mut applications = guard(&self.applications);
        if let Some(existing) = applications
            .values()
            .find(|application| &application.program == program)
        {
            return Ok(existing.clone());
        }
        let application = Application::draft(ApplicationId(self.next_id("app")), program.clone());
        applications.insert(application.id.clone(), application.clone());
        debug!(application = %application.id.0, program = %program.0, "draft created");
        Ok(application)
    }

    async fn get(&self, id: &ApplicationId) -> Result<Application, ServiceError> {
        guard(&self.applications)
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.0.clone()))
    }

    async fn update(
        &self,
        id: &ApplicationId,
        update: ApplicationUpdate,
    ) -> Result<Application, ServiceError> {
        let mut applications = guard(&self.applications);
        let stored = applications
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(id.0.clone()))?;

        if update.revision > stored.revision {
            stored.revision = update.revision;
            stored.answers = update.answers;
            stored.sections = update.sections;
            if let Some(snapshot) = update.submitted_snapshot {
                stored.submitted_snapshot = Some(snapshot);
            }
        } else {
            debug!(
                application = %id.0,
                received = update.revision,
                stored = stored.revision,
                "stale save ignored"
            );
        }
        Ok(stored.clone())
    }

    async fn submit(
        &self,
        id: &ApplicationId,
        snapshot: SubmittedSnapshot,
    ) -> Result<Application, ServiceError> {
        let mut applications = guard(&self.applications);
        let stored = applications
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(id.0.clone()))?;
        if stored.status == ApplicationStatus::Submitted {
            return Err(ServiceError::Conflict(format!(
                "application {} is already submitted",
                id.0
            )));
        }
        stored.status = ApplicationStatus::Submitted;
        stored.sections.set(SectionId::Review, true);
        stored.submitted_snapshot = Some(snapshot);
        Ok(stored.clone())
    }
}

#[async_trait]
impl DocumentService for InMemoryBackend {
    async fn list(&self, application: &ApplicationId) -> Result<Vec<DocumentRecord>, ServiceError> {
        Ok(guard(&self.documents)
            .iter()
            .filter(|(owner, _)| owner == application)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn upload(
        &self,
        application: &ApplicationId,
        file: FileUpload,
        meta: UploadMeta,
    ) -> Result<DocumentRecord, ServiceError> {
        let record = DocumentRecord {
            id: DocumentId(self.next_id("doc")),
            key: meta.key,
            file_name: file.file_name.clone(),
            original_language: meta.language,
            translations: Vec::new(),
            validation_status: ValidationStatus::Pending,
        };
        self.store_content(&record.id.0, file);

        let mut documents = guard(&self.documents);
        documents.retain(|(owner, existing)| !(owner == application && existing.key == meta.key));
        documents.push((application.clone(), record.clone()));
        Ok(record)
    }

    async fn update(
        &self,
        id: &DocumentId,
        language: Language,
    ) -> Result<DocumentRecord, ServiceError> {
        let mut documents = guard(&self.documents);
        let (_, record) = documents
            .iter_mut()
            .find(|(_, record)| &record.id == id)
            .ok_or_else(|| ServiceError::NotFound(id.0.clone()))?;
        record.original_language = language;
        Ok(record.clone())
    }

    async fn delete(&self, id: &DocumentId) -> Result<(), ServiceError> {
        guard(&self.documents).retain(|(_, record)| &record.id != id);
        guard(&self.contents).remove(&id.0);
        Ok(())
    }

    async fn fetch_content(&self, id: &DocumentId) -> Result<Vec<u8>, ServiceError> {
        self.content(&id.0)
    }
}

#[async_trait]
impl TranslationService for InMemoryBackend {
    async fn list(&self, document: &DocumentId) -> Result<Vec<Translation>, ServiceError> {
        guard(&self.documents)
            .iter()
            .find(|(_, record)| &record.id == document)
            .map(|(_, record)| record.translations.clone())
            .ok_or_else(|| ServiceError::NotFound(document.0.clone()))
    }

    async fn upload(
        &self,
        document: &DocumentId,
        file: FileUpload,
        target_language: Language,
    ) -> Result<Translation, ServiceError> {
        let translation = {
            let mut documents = guard(&self.documents);
            let (_, record) = documents
                .iter_mut()
                .find(|(_, record)| &record.id == document)
                .ok_or_else(|| ServiceError::NotFound(document.0.clone()))?;
            let translation = Translation {
                id: TranslationId(self.next_id("tr")),
                target_language,
                status: ValidationStatus::Pending,
            };
            record
                .translations
                .retain(|existing| existing.target_language != translation.target_language);
            record.translations.push(translation.clone());
            translation
        };
        self.store_content(&translation.id.0, file);
        Ok(translation)
    }

    async fn update(
        &self,
        id: &TranslationId,
        target_language: Language,
    ) -> Result<Translation, ServiceError> {
        let mut documents = guard(&self.documents);
        let translation = documents
            .iter_mut()
            .flat_map(|(_, record)| record.translations.iter_mut())
            .find(|translation| &translation.id == id)
            .ok_or_else(|| ServiceError::NotFound(id.0.clone()))?;
        translation.target_language = target_language;
        Ok(translation.clone())
    }

    async fn delete(&self, id: &TranslationId) -> Result<(), ServiceError> {
        for (_, record) in guard(&self.documents).iter_mut() {
            record.translations.retain(|translation| &translation.id != id);
        }
        guard(&self.contents).remove(&id.0);
        Ok(())
    }

    async fn fetch_content(&self, id: &TranslationId) -> Result<Vec<u8>, ServiceError> {
        self.content(&id.0)
    }
}

#[async_trait]
impl QualificationService for InMemoryBackend {
    async fn list(&self, application: &ApplicationId) -> Result<Vec<Qualification>, ServiceError> {
        Ok(guard(&self.qualifications)
            .iter()
            .filter(|(owner, _)| owner == application)
            .map(|(_, qualification)| qualification.clone())
            .collect())
    }

    async fn add(
        &self,
        application: &ApplicationId,
        draft: QualificationDraft,
    ) -> Result<Qualification, ServiceError> {
        let qualification = Qualification {
            id: QualificationId(self.next_id("q")),
            kind: draft.kind,
            title: draft.title,
            institution: draft.institution,
            year: draft.year,
        };
        guard(&self.qualifications).push((application.clone(), qualification.clone()));
        Ok(qualification)
    }

    async fn update(
        &self,
        id: &QualificationId,
        draft: QualificationDraft,
    ) -> Result<Qualification, ServiceError> {
        let mut qualifications = guard(&self.qualifications);
        let (_, stored) = qualifications
            .iter_mut()
            .find(|(_, qualification)| &qualification.id == id)
            .ok_or_else(|| ServiceError::NotFound(id.0.clone()))?;
        stored.kind = draft.kind;
        stored.title = draft.title;
        stored.institution = draft.institution;
        stored.year = draft.year;
        Ok(stored.clone())
    }

    async fn delete(&self, id: &QualificationId) -> Result<(), ServiceError> {
        guard(&self.qualifications).retain(|(_, qualification)| &qualification.id != id);
        Ok(())
    }
}

#[async_trait]
impl ModificationRequestService for InMemoryBackend {
    async fn create(
        &self,
        application: &ApplicationId,
        reason: &str,
    ) -> Result<ModificationRequest, ServiceError> {
        let request = ModificationRequest {
            application_id: application.clone(),
            reason: reason.to_string(),
            status: ModificationStatus::Pending,
            valid_until: None,
        };
        guard(&self.modifications).insert(application.clone(), request.clone());
        Ok(request)
    }

    async fn get_status(
        &self,
        application: &ApplicationId,
    ) -> Result<Option<ModificationRequest>, ServiceError> {
        Ok(guard(&self.modifications).get(application).cloned())
    }
}

/// Session markers for a CLI process: nothing is persisted, so clearing only logs.
#[derive(Default)]
pub(crate) struct LoggingMarkers;

impl SessionMarkers for LoggingMarkers {
    fn clear(&self) {
        info!("session markers cleared");
    }
}

pub(crate) fn parse_destination(raw: &str) -> Result<DestinationTag, String> {
    raw.parse()
}

pub(crate) fn parse_language(raw: &str) -> Result<Language, String> {
    raw.parse()
}
