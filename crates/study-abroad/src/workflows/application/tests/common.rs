use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Notify;

use crate::workflows::application::domain::{
    Application, ApplicationId, ApplicationStatus, DocumentId, DocumentKey, DocumentRecord,
    Language, ModificationRequest, ModificationStatus, ProgramRef, Qualification,
    QualificationDraft, QualificationId, QualificationKind, SectionId, SubmittedSnapshot,
    Translation, TranslationId, ValidationStatus,
};
use crate::workflows::application::services::{
    ApplicationService, ApplicationUpdate, DocumentService, ExternalServices, FileUpload,
    ModificationRequestService, QualificationService, ServiceError, SessionMarkers,
    TranslationService, UploadMeta,
};
use crate::workflows::application::{ApplicationOrchestrator, OrchestratorSettings};
use crate::workflows::questionnaire::{AnswerMap, AnswerValue};

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
}

pub(super) fn later(millis: i64) -> DateTime<Utc> {
    now() + Duration::milliseconds(millis)
}

pub(super) fn program() -> ProgramRef {
    ProgramRef("msc-data-science-paris".to_string())
}

pub(super) fn text(value: &str) -> AnswerValue {
    AnswerValue::text(value)
}

pub(super) fn fields(pairs: &[(&str, AnswerValue)]) -> AnswerMap {
    pairs
        .iter()
        .map(|(field, value)| (field.to_string(), value.clone()))
        .collect()
}

/// Every profile field filled, France as the only destination.
pub(super) fn complete_profile() -> AnswerMap {
    fields(&[
        ("first_name", text("Salma")),
        ("last_name", text("Bennani")),
        ("date_of_birth", text("2002-03-14")),
        ("place_of_birth", text("Rabat")),
        ("gender", text("female")),
        ("nationality", text("Moroccan")),
        ("passport_number", text("UZ4411873")),
        ("email", text("salma.bennani@example.org")),
        ("phone", text("+212 600 112 233")),
        ("address", text("12 Avenue Hassan II")),
        ("city", text("Rabat")),
        ("country", text("Morocco")),
        ("education_level", text("bachelor")),
        ("field_of_study", text("Computer science")),
        ("destinations", AnswerValue::choices(["france"])),
        ("spoken_languages", AnswerValue::choices(["ar", "fr", "en"])),
    ])
}

pub(super) fn record(id: &str, key: DocumentKey, language: Language) -> DocumentRecord {
    DocumentRecord {
        id: DocumentId(id.to_string()),
        key,
        file_name: format!("{}.pdf", key.code()),
        original_language: language,
        translations: Vec::new(),
        validation_status: ValidationStatus::Pending,
    }
}

pub(super) fn translation(id: &str, language: Language, status: ValidationStatus) -> Translation {
    Translation {
        id: TranslationId(id.to_string()),
        target_language: language,
        status,
    }
}

pub(super) fn qualification(kind: QualificationKind, title: &str) -> Qualification {
    Qualification {
        id: QualificationId(format!("q-{title}")),
        kind,
        title: title.to_string(),
        institution: None,
        year: Some(2024),
    }
}

pub(super) fn draft(kind: QualificationKind, title: &str) -> QualificationDraft {
    QualificationDraft {
        kind,
        title: title.to_string(),
        institution: None,
        year: Some(2024),
    }
}

pub(super) fn pdf(name: &str) -> FileUpload {
    FileUpload {
        file_name: name.to_string(),
        content_type: "application/pdf".to_string(),
        bytes: format!("%PDF {name}").into_bytes(),
    }
}

#[derive(Default)]
pub(super) struct RecordingMarkers {
    cleared: AtomicUsize,
}

impl RecordingMarkers {
    pub(super) fn cleared(&self) -> usize {
        self.cleared.load(Ordering::SeqCst)
    }
}

impl SessionMarkers for RecordingMarkers {
    fn clear(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory stand-in for every remote service, with failure injection and gates that hold a
/// call until the test releases it.
#[derive(Default)]
pub(super) struct FakeBackend {
    applications: Mutex<HashMap<ApplicationId, Application>>,
    documents: Mutex<Vec<(ApplicationId, DocumentRecord)>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    qualifications: Mutex<Vec<(ApplicationId, Qualification)>>,
    modifications: Mutex<HashMap<ApplicationId, ModificationRequest>>,
    failures: Mutex<VecDeque<ServiceError>>,
    update_gates: Mutex<HashMap<u64, Arc<Notify>>>,
    upload_gate: Mutex<Option<Arc<Notify>>>,
    updates: Mutex<Vec<ApplicationUpdate>>,
    echo_updates: AtomicBool,
    sequence: AtomicU64,
}

impl FakeBackend {
    pub(super) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next service call fails with `error`.
    pub(super) fn fail_next(&self, error: ServiceError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Hold the update carrying `revision` until the returned handle is notified.
    pub(super) fn hold_update(&self, revision: u64) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.update_gates
            .lock()
            .unwrap()
            .insert(revision, gate.clone());
        gate
    }

    /// Hold the next upload until the returned handle is notified.
    pub(super) fn hold_next_upload(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.upload_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Answer every update with its own payload instead of the stored state.
    pub(super) fn echo_updates(&self) {
        self.echo_updates.store(true, Ordering::SeqCst);
    }

    pub(super) fn updates(&self) -> Vec<ApplicationUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub(super) fn stored(&self, id: &ApplicationId) -> Application {
        self.applications.lock().unwrap()[id].clone()
    }

    pub(super) fn seed_documents(&self, id: &ApplicationId, records: Vec<DocumentRecord>) {
        let mut documents = self.documents.lock().unwrap();
        for record in records {
            documents.push((id.clone(), record));
        }
    }

    pub(super) fn seed_qualifications(
        &self,
        id: &ApplicationId,
        qualifications: Vec<Qualification>,
    ) {
        let mut stored = self.qualifications.lock().unwrap();
        for qualification in qualifications {
            stored.push((id.clone(), qualification));
        }
    }

    pub(super) fn review_translation(&self, id: &TranslationId, status: ValidationStatus) {
        let mut documents = self.documents.lock().unwrap();
        for (_, record) in documents.iter_mut() {
            for translation in record.translations.iter_mut() {
                if &translation.id == id {
                    translation.status = status;
                }
            }
        }
    }

    pub(super) fn decide_modification(
        &self,
        id: &ApplicationId,
        status: ModificationStatus,
        valid_until: Option<DateTime<Utc>>,
    ) {
        let mut modifications = self.modifications.lock().unwrap();
        let request = modifications
            .entry(id.clone())
            .or_insert_with(|| ModificationRequest {
                application_id: id.clone(),
                reason: "correction".to_string(),
                status,
                valid_until,
            });
        request.status = status;
        request.valid_until = valid_until;
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn check(&self) -> Result<(), ServiceError> {
        match self.failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

pub(super) fn services(
    backend: &Arc<FakeBackend>,
    markers: &Arc<RecordingMarkers>,
) -> ExternalServices {
    ExternalServices {
        applications: backend.clone(),
        documents: backend.clone(),
        translations: backend.clone(),
        qualifications: backend.clone(),
        modifications: backend.clone(),
        markers: markers.clone(),
    }
}

pub(super) async fn orchestrator(
    backend: &Arc<FakeBackend>,
    markers: &Arc<RecordingMarkers>,
) -> ApplicationOrchestrator {
    ApplicationOrchestrator::load_or_create(
        program(),
        services(backend, markers),
        Arc::new(OrchestratorSettings::default()),
    )
    .await
    .expect("application loads")
}

/// Draft with every section before review already satisfied and persisted.
pub(super) async fn ready_to_submit(
    backend: &Arc<FakeBackend>,
    markers: &Arc<RecordingMarkers>,
) -> ApplicationOrchestrator {
    let orchestrator = orchestrator(backend, markers).await;
    let id = orchestrator.id();
    backend.seed_qualifications(
        &id,
        vec![
            qualification(QualificationKind::Language, "DELF B2"),
            qualification(QualificationKind::Academic, "Licence Informatique"),
        ],
    );
    backend.seed_documents(
        &id,
        crate::workflows::application::DocumentCatalog::standard()
            .groups()
            .iter()
            .filter(|group| {
                group.destination.is_none()
                    || group.destination
                        == Some(crate::workflows::application::DestinationTag::France)
            })
            .flat_map(|group| group.entries.iter())
            .filter(|entry| entry.required)
            .enumerate()
            .map(|(index, entry)| record(&format!("seed-{index}"), entry.key, Language::french()))
            .collect(),
    );
    orchestrator.refresh().await.expect("refresh");

    let mut answers = complete_profile();
    answers.insert("intake".to_string(), text("september-2026"));
    orchestrator.save(answers, now()).await.expect("save");
    for section in [
        SectionId::PersonalInformation,
        SectionId::AcademicBackground,
        SectionId::Documents,
    ] {
        let verdict = orchestrator
            .confirm_section(section, now())
            .await
            .expect("confirm");
        assert!(verdict.satisfied, "{} should hold: {:?}", section, verdict.missing);
    }
    orchestrator
}

#[async_trait]
impl ApplicationService for FakeBackend {
    async fn load_or_create(&self, program: &ProgramRef) -> Result<Application, ServiceError> {
        self.check()?;
        let mut applications = self.applications.lock().unwrap();
        if let Some(existing) = applications
            .values()
            .find(|application| &application.program == program)
        {
            return Ok(existing.clone());
        }
        let application = Application::draft(ApplicationId(self.next_id("app")), program.clone());
        applications.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    async fn get(&self, id: &ApplicationId) -> Result<Application, ServiceError> {
        self.check()?;
        self.applications
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.0.clone()))
    }

    async fn update(
        &self,
        id: &ApplicationId,
        update: ApplicationUpdate,
    ) -> Result<Application, ServiceError> {
        let gate = self.update_gates.lock().unwrap().remove(&update.revision);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check()?;
        self.updates.lock().unwrap().push(update.clone());

        let mut applications = self.applications.lock().unwrap();
        let stored = applications
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(id.0.clone()))?;

        if self.echo_updates.load(Ordering::SeqCst) {
            let mut echoed = stored.clone();
            echoed.answers = update.answers;
            echoed.sections = update.sections;
            echoed.revision = update.revision;
            return Ok(echoed);
        }

        if update.revision > stored.revision {
            stored.answers = update.answers;
            stored.sections = update.sections;
            stored.revision = update.revision;
            if let Some(snapshot) = update.submitted_snapshot {
                stored.submitted_snapshot = Some(snapshot);
            }
        }
        Ok(stored.clone())
    }

    async fn submit(
        &self,
        id: &ApplicationId,
        snapshot: SubmittedSnapshot,
    ) -> Result<Application, ServiceError> {
        self.check()?;
        let mut applications = self.applications.lock().unwrap();
        let stored = applications
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(id.0.clone()))?;
        stored.status = ApplicationStatus::Submitted;
        stored.sections.set(SectionId::Review, true);
        stored.submitted_snapshot = Some(snapshot);
        Ok(stored.clone())
    }
}

#[async_trait]
impl DocumentService for FakeBackend {
    async fn list(&self, application: &ApplicationId) -> Result<Vec<DocumentRecord>, ServiceError> {
        self.check()?;
        Ok(self
            .documents
            .lock()
            .unwrap()
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
        let gate = self.upload_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check()?;

        let record = DocumentRecord {
            id: DocumentId(self.next_id("doc")),
            key: meta.key,
            file_name: file.file_name,
            original_language: meta.language,
            translations: Vec::new(),
            validation_status: ValidationStatus::Pending,
        };
        self.contents
            .lock()
            .unwrap()
            .insert(record.id.0.clone(), file.bytes);
        let mut documents = self.documents.lock().unwrap();
        documents.retain(|(owner, existing)| !(owner == application && existing.key == meta.key));
        documents.push((application.clone(), record.clone()));
        Ok(record)
    }

    async fn update(
        &self,
        id: &DocumentId,
        language: Language,
    ) -> Result<DocumentRecord, ServiceError> {
        self.check()?;
        let mut documents = self.documents.lock().unwrap();
        let (_, record) = documents
            .iter_mut()
            .find(|(_, record)| &record.id == id)
            .ok_or_else(|| ServiceError::NotFound(id.0.clone()))?;
        record.original_language = language;
        Ok(record.clone())
    }

    async fn delete(&self, id: &DocumentId) -> Result<(), ServiceError> {
        self.check()?;
        self.documents
            .lock()
            .unwrap()
            .retain(|(_, record)| &record.id != id);
        Ok(())
    }

    async fn fetch_content(&self, id: &DocumentId) -> Result<Vec<u8>, ServiceError> {
        self.check()?;
        self.contents
            .lock()
            .unwrap()
            .get(&id.0)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.0.clone()))
    }
}

#[async_trait]
impl TranslationService for FakeBackend {
    async fn list(&self, document: &DocumentId) -> Result<Vec<Translation>, ServiceError> {
        self.check()?;
        self.documents
            .lock()
            .unwrap()
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
        self.check()?;
        let mut documents = self.documents.lock().unwrap();
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
        self.contents
            .lock()
            .unwrap()
            .insert(translation.id.0.clone(), file.bytes);
        Ok(translation)
    }

    async fn update(
        &self,
        id: &TranslationId,
        target_language: Language,
    ) -> Result<Translation, ServiceError> {
        self.check()?;
        let mut documents = self.documents.lock().unwrap();
        let translation = documents
            .iter_mut()
            .flat_map(|(_, record)| record.translations.iter_mut())
            .find(|translation| &translation.id == id)
            .ok_or_else(|| ServiceError::NotFound(id.0.clone()))?;
        translation.target_language = target_language;
        Ok(translation.clone())
    }

    async fn delete(&self, id: &TranslationId) -> Result<(), ServiceError> {
        self.check()?;
        for (_, record) in self.documents.lock().unwrap().iter_mut() {
            record.translations.retain(|translation| &translation.id != id);
        }
        Ok(())
    }

    async fn fetch_content(&self, id: &TranslationId) -> Result<Vec<u8>, ServiceError> {
        self.check()?;
        self.contents
            .lock()
            .unwrap()
            .get(&id.0)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.0.clone()))
    }
}

#[async_trait]
impl QualificationService for FakeBackend {
    async fn list(&self, application: &ApplicationId) -> Result<Vec<Qualification>, ServiceError> {
        self.check()?;
        Ok(self
            .qualifications
            .lock()
            .unwrap()
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
        self.check()?;
        let qualification = Qualification {
            id: QualificationId(self.next_id("q")),
            kind: draft.kind,
            title: draft.title,
            institution: draft.institution,
            year: draft.year,
        };
        self.qualifications
            .lock()
            .unwrap()
            .push((application.clone(), qualification.clone()));
        Ok(qualification)
    }

    async fn update(
        &self,
        id: &QualificationId,
        draft: QualificationDraft,
    ) -> Result<Qualification, ServiceError> {
        self.check()?;
        let mut qualifications = self.qualifications.lock().unwrap();
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
        self.check()?;
        self.qualifications
            .lock()
            .unwrap()
            .retain(|(_, qualification)| &qualification.id != id);
        Ok(())
    }
}

#[async_trait]
impl ModificationRequestService for FakeBackend {
    async fn create(
        &self,
        application: &ApplicationId,
        reason: &str,
    ) -> Result<ModificationRequest, ServiceError> {
        self.check()?;
        let request = ModificationRequest {
            application_id: application.clone(),
            reason: reason.to_string(),
            status: ModificationStatus::Pending,
            valid_until: None,
        };
        self.modifications
            .lock()
            .unwrap()
            .insert(application.clone(), request.clone());
        Ok(request)
    }

    async fn get_status(
        &self,
        application: &ApplicationId,
    ) -> Result<Option<ModificationRequest>, ServiceError> {
        self.check()?;
        Ok(self
            .modifications
            .lock()
            .unwrap()
            .get(application)
            .cloned())
    }
}
