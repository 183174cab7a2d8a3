use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::documents::{
    CatalogImportError, ComplianceReport, DocumentCatalog, DocumentRequirementResolver,
    LanguagePolicy, RequirementMatrix,
};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, DestinationTag, DocumentRecord,
    ModificationRequest, ModificationStatus, ProgramRef, Qualification, QualificationDraft,
    QualificationId, SectionFlags, SectionId, SubmittedSnapshot,
};
use super::saving::{SaveCoalescer, SaveSequencer, UploadLedger};
use super::sections::{Progress, SectionContext, SectionValidationEngine, SectionVerdict};
use super::services::{ApplicationUpdate, ExternalServices, ServiceError};
use super::ApplicationError;
use crate::config::IntakeConfig;
use crate::workflows::questionnaire::{evaluate, AnswerMap, AnswerStore, FlowCatalog};

/// Engine pieces shared by every orchestrator built from the same configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub save_debounce: Duration,
    pub immediate_fields: BTreeSet<String>,
    pub questionnaire: Arc<FlowCatalog>,
    pub resolver: DocumentRequirementResolver,
    pub validator: SectionValidationEngine,
}

impl OrchestratorSettings {
    pub fn from_config(config: &IntakeConfig) -> Result<Self, CatalogImportError> {
        let catalog = match &config.document_catalog_csv {
            Some(path) => DocumentCatalog::from_path(path)?,
            None => DocumentCatalog::standard(),
        };
        Ok(Self::with_catalog(config, catalog))
    }

    fn with_catalog(config: &IntakeConfig, catalog: DocumentCatalog) -> Self {
        Self {
            save_debounce: config.debounce_window(),
            immediate_fields: config.immediate_fields.iter().cloned().collect(),
            questionnaire: Arc::new(FlowCatalog::advisory()),
            resolver: DocumentRequirementResolver::new(
                catalog,
                LanguagePolicy::new(config.default_document_language.clone()),
            ),
            validator: SectionValidationEngine::default(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::with_catalog(&IntakeConfig::default(), DocumentCatalog::standard())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// Nothing was waiting to be sent.
    Idle,
    /// Held by the debounce window.
    Staged,
    /// Sent; `adopted` is false when a newer save had already been applied.
    Dispatched { revision: u64, adopted: bool },
}

/// Section 6 view: where the application stands after submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingView {
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub revised_at: Option<DateTime<Utc>>,
    pub modification_status: Option<ModificationStatus>,
    pub modification_valid_until: Option<DateTime<Utc>>,
    pub edit_window_open: bool,
    pub progress: Progress,
    pub sections: SectionFlags,
}

pub(super) struct DraftState {
    pub(super) application: Application,
    pub(super) store: AnswerStore,
    pub(super) documents: Vec<DocumentRecord>,
    pub(super) qualifications: Vec<Qualification>,
    pub(super) modification: Option<ModificationRequest>,
    pub(super) coalescer: SaveCoalescer,
    pub(super) sequencer: SaveSequencer,
}

/// Drives one application: saves, section gates, submission, and post-submission edits.
/// Every method takes `&self`; the state lock is never held across a remote call.
pub struct ApplicationOrchestrator {
    pub(super) services: ExternalServices,
    pub(super) settings: Arc<OrchestratorSettings>,
    pub(super) state: Mutex<DraftState>,
    pub(super) uploads: UploadLedger,
    expired: AtomicBool,
}

impl ApplicationOrchestrator {
    /// Open the draft for `program`, creating it remotely when none exists.
    pub async fn load_or_create(
        program: ProgramRef,
        services: ExternalServices,
        settings: Arc<OrchestratorSettings>,
    ) -> Result<Self, ApplicationError> {
        let loaded = Self::fetch(&services, &program).await;
        let (application, documents, qualifications, modification) = match loaded {
            Ok(parts) => parts,
            Err(ServiceError::AuthExpired) => {
                warn!(program = %program.0, "session expired while loading application");
                services.markers.clear();
                return Err(ApplicationError::AuthExpired);
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            application = %application.id.0,
            program = %program.0,
            status = application.status.label(),
            documents = documents.len(),
            "application loaded"
        );

        let state = DraftState {
            store: AnswerStore::from_map(application.answers.clone()),
            coalescer: SaveCoalescer::new(settings.save_debounce),
            sequencer: SaveSequencer::new(application.revision),
            application,
            documents,
            qualifications,
            modification,
        };

        Ok(Self {
            services,
            settings,
            state: Mutex::new(state),
            uploads: UploadLedger::new(),
            expired: AtomicBool::new(false),
        })
    }

    async fn fetch(
        services: &ExternalServices,
        program: &ProgramRef,
    ) -> Result<
        (
            Application,
            Vec<DocumentRecord>,
            Vec<Qualification>,
            Option<ModificationRequest>,
        ),
        ServiceError,
    > {
        let application = services.applications.load_or_create(program).await?;
        let documents = services.documents.list(&application.id).await?;
        let qualifications = services.qualifications.list(&application.id).await?;
        let modification = match application.status {
            ApplicationStatus::Submitted => {
                services.modifications.get_status(&application.id).await?
            }
            ApplicationStatus::Draft => None,
        };
        Ok((application, documents, qualifications, modification))
    }

    /// Re-read the application and its collaborators' state. Staged edits stay on top, and
    /// answers older than the last issued save are not adopted.
    pub async fn refresh(&self) -> Result<(), ApplicationError> {
        self.ensure_session()?;
        let id = self.id();
        let application = self.remote(self.services.applications.get(&id).await)?;
        let documents = self.remote(self.services.documents.list(&id).await)?;
        let qualifications = self.remote(self.services.qualifications.list(&id).await)?;

        let mut state = self.lock();
        state.sequencer.adopt(application.revision);
        if application.revision >= state.sequencer.issued() {
            adopt_response(&mut state, application);
        } else {
            debug!(
                application = %id.0,
                server = application.revision,
                issued = state.sequencer.issued(),
                "server copy is behind local saves; keeping local answers"
            );
        }
        state.documents = documents;
        state.qualifications = qualifications;
        Ok(())
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, DraftState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> ApplicationId {
        self.lock().application.id.clone()
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Current application with the locally authoritative answers.
    pub fn application(&self) -> Application {
        let state = self.lock();
        let mut application = state.application.clone();
        application.answers = state.store.snapshot();
        application
    }

    pub fn answers(&self) -> AnswerMap {
        self.lock().store.snapshot()
    }

    pub fn documents(&self) -> Vec<DocumentRecord> {
        self.lock().documents.clone()
    }

    pub fn qualifications(&self) -> Vec<Qualification> {
        self.lock().qualifications.clone()
    }

    pub fn modification(&self) -> Option<ModificationRequest> {
        self.lock().modification.clone()
    }

    pub fn flags(&self) -> SectionFlags {
        self.lock().application.sections.clone()
    }

    pub fn progress(&self) -> Progress {
        Progress::from_flags(&self.lock().application.sections)
    }

    pub fn has_pending_save(&self) -> bool {
        self.lock().coalescer.has_pending()
    }

    pub fn is_session_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    pub fn destinations(&self) -> BTreeSet<DestinationTag> {
        let state = self.lock();
        DestinationTag::from_answers(&self.effective_answers(&state))
    }

    pub fn requirements(&self) -> RequirementMatrix {
        self.settings.resolver.resolve(&self.destinations())
    }

    pub fn compliance(&self) -> ComplianceReport {
        let state = self.lock();
        self.compliance_for(&state)
    }

    /// Pure check of one section against the current snapshot; nothing is persisted.
    pub fn validate(&self, section: SectionId) -> SectionVerdict {
        let state = self.lock();
        self.verdict_for(&state, section)
    }

    pub fn verdicts(&self) -> Vec<SectionVerdict> {
        let state = self.lock();
        SectionId::GATING
            .into_iter()
            .map(|section| self.verdict_for(&state, section))
            .collect()
    }

    pub fn can_edit(&self, now: DateTime<Utc>) -> bool {
        let state = self.lock();
        self.ensure_mutable(&state, now).is_ok()
    }

    /// Merge edited fields. Immediate fields and section 4 changes are dispatched at once;
    /// everything else waits for [`flush`](Self::flush).
    pub async fn save(
        &self,
        partial: AnswerMap,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, ApplicationError> {
        self.ensure_session()?;
        if partial.is_empty() {
            return Ok(SaveOutcome::Idle);
        }

        let immediate = {
            let mut state = self.lock();
            self.ensure_mutable(&state, now)?;
            self.check_shapes(&partial)?;

            state.store.merge(partial.clone());
            let preferences = self.verdict_for(&state, SectionId::Preferences).satisfied;
            let flipped = state.application.sections.get(SectionId::Preferences) != preferences;
            state
                .application
                .sections
                .set(SectionId::Preferences, preferences);

            let immediate = flipped
                || partial
                    .keys()
                    .any(|field| self.settings.immediate_fields.contains(field));
            state.coalescer.stage(partial, now);
            immediate
        };

        if immediate {
            self.dispatch(now).await
        } else {
            Ok(SaveOutcome::Staged)
        }
    }

    /// Send staged edits once the debounce window has passed.
    pub async fn flush(&self, now: DateTime<Utc>) -> Result<SaveOutcome, ApplicationError> {
        if !self.lock().coalescer.is_due(now) {
            return Ok(SaveOutcome::Idle);
        }
        self.dispatch(now).await
    }

    /// Send staged edits regardless of the debounce window.
    pub async fn flush_now(&self, now: DateTime<Utc>) -> Result<SaveOutcome, ApplicationError> {
        if !self.lock().coalescer.has_pending() {
            return Ok(SaveOutcome::Idle);
        }
        self.dispatch(now).await
    }

    async fn dispatch(&self, now: DateTime<Utc>) -> Result<SaveOutcome, ApplicationError> {
        self.ensure_session()?;
        let (id, fields, update) = {
            let mut state = self.lock();
            self.ensure_mutable(&state, now)?;
            let fields = state.coalescer.take();
            let revision = state.sequencer.next();
            let submitted_snapshot = match state.application.status {
                ApplicationStatus::Submitted => state
                    .application
                    .submitted_snapshot
                    .as_ref()
                    .map(|snapshot| SubmittedSnapshot {
                        answers: state.store.snapshot(),
                        documents: state.documents.clone(),
                        qualifications: state.qualifications.clone(),
                        submitted_at: snapshot.submitted_at,
                        revised_at: Some(now),
                    }),
                ApplicationStatus::Draft => None,
            };
            let update = ApplicationUpdate {
                revision,
                answers: state.store.snapshot(),
                sections: state.application.sections.clone(),
                submitted_snapshot,
            };
            (state.application.id.clone(), fields, update)
        };

        let revision = update.revision;
        debug!(
            application = %id.0,
            revision,
            fields = fields.len(),
            "dispatching application save"
        );

        match self.services.applications.update(&id, update).await {
            Ok(application) => {
                let mut state = self.lock();
                let adopted = state.sequencer.adopt(application.revision);
                if adopted {
                    adopt_response(&mut state, application);
                } else {
                    debug!(
                        application = %id.0,
                        revision,
                        latest = state.sequencer.adopted(),
                        "ignoring superseded save response"
                    );
                }
                Ok(SaveOutcome::Dispatched { revision, adopted })
            }
            Err(err) => {
                let mut state = self.lock();
                let restored: AnswerMap = fields
                    .iter()
                    .filter(|(field, _)| !state.coalescer.staged().contains_key(*field))
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect();
                state.store.merge(restored);
                state.coalescer.restage(fields, now);
                drop(state);
                warn!(
                    application = %id.0,
                    revision,
                    error = %err,
                    "application save failed; edits kept locally"
                );
                Err(self.surface(err))
            }
        }
    }

    /// Evaluate and persist one of the user-confirmed sections (1–3).
    pub async fn confirm_section(
        &self,
        section: SectionId,
        now: DateTime<Utc>,
    ) -> Result<SectionVerdict, ApplicationError> {
        self.ensure_session()?;
        if !section.confirmed_by_user() {
            return Err(ApplicationError::Validation {
                missing: vec![section],
            });
        }

        let verdict = {
            let mut state = self.lock();
            self.ensure_mutable(&state, now)?;
            let verdict = self.verdict_for(&state, section);
            state.application.sections.set(section, verdict.satisfied);
            verdict
        };
        debug!(section = section.label(), satisfied = verdict.satisfied, "section confirmed");

        self.dispatch(now).await?;
        Ok(verdict)
    }

    /// Freeze the application. Requires sections 1–4 to be persisted as satisfied.
    pub async fn submit(&self, now: DateTime<Utc>) -> Result<Application, ApplicationError> {
        self.ensure_session()?;
        {
            let state = self.lock();
            if state.application.status == ApplicationStatus::Submitted {
                return Err(ApplicationError::Conflict(
                    "application is already submitted".to_string(),
                ));
            }
            let missing = state.application.sections.missing_before_submit();
            if !missing.is_empty() {
                warn!(
                    application = %state.application.id.0,
                    missing = ?missing.iter().map(|section| section.label()).collect::<Vec<_>>(),
                    "submission blocked by incomplete sections"
                );
                return Err(ApplicationError::Validation { missing });
            }
        }

        self.flush_now(now).await?;

        let (id, snapshot) = {
            let state = self.lock();
            let snapshot = SubmittedSnapshot {
                answers: state.store.snapshot(),
                documents: state.documents.clone(),
                qualifications: state.qualifications.clone(),
                submitted_at: now,
                revised_at: None,
            };
            (state.application.id.clone(), snapshot)
        };

        let mut application = self.remote(
            self.services
                .applications
                .submit(&id, snapshot.clone())
                .await,
        )?;
        application.status = ApplicationStatus::Submitted;
        application.sections.set(SectionId::Review, true);
        if application.submitted_snapshot.is_none() {
            application.submitted_snapshot = Some(snapshot);
        }

        {
            let mut state = self.lock();
            state.sequencer.adopt(application.revision);
            state.application = application;
        }
        info!(application = %id.0, "application submitted");

        Ok(self.application())
    }

    pub async fn add_qualification(
        &self,
        draft: QualificationDraft,
        now: DateTime<Utc>,
    ) -> Result<Qualification, ApplicationError> {
        let id = self.mutable_id(now)?;
        let qualification = self.remote(self.services.qualifications.add(&id, draft).await)?;
        self.lock().qualifications.push(qualification.clone());
        Ok(qualification)
    }

    pub async fn update_qualification(
        &self,
        qualification: &QualificationId,
        draft: QualificationDraft,
        now: DateTime<Utc>,
    ) -> Result<Qualification, ApplicationError> {
        self.mutable_id(now)?;
        let updated = self.remote(
            self.services
                .qualifications
                .update(qualification, draft)
                .await,
        )?;
        let mut state = self.lock();
        match state
            .qualifications
            .iter_mut()
            .find(|existing| existing.id == updated.id)
        {
            Some(existing) => *existing = updated.clone(),
            None => state.qualifications.push(updated.clone()),
        }
        Ok(updated)
    }

    pub async fn remove_qualification(
        &self,
        qualification: &QualificationId,
        now: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        self.mutable_id(now)?;
        self.remote(self.services.qualifications.delete(qualification).await)?;
        self.lock()
            .qualifications
            .retain(|existing| &existing.id != qualification);
        Ok(())
    }

    /// Ask for a post-submission edit window. Approval happens elsewhere.
    pub async fn request_modification(
        &self,
        reason: &str,
    ) -> Result<ModificationRequest, ApplicationError> {
        self.ensure_session()?;
        let id = {
            let state = self.lock();
            if state.application.status != ApplicationStatus::Submitted {
                return Err(ApplicationError::Conflict(
                    "only submitted applications accept modification requests".to_string(),
                ));
            }
            state.application.id.clone()
        };

        let request = self.remote(self.services.modifications.create(&id, reason).await)?;
        info!(application = %id.0, status = request.status.label(), "modification requested");
        self.lock().modification = Some(request.clone());
        Ok(request)
    }

    pub async fn refresh_modification(
        &self,
    ) -> Result<Option<ModificationRequest>, ApplicationError> {
        self.ensure_session()?;
        let id = self.id();
        let request = self.remote(self.services.modifications.get_status(&id).await)?;
        self.lock().modification = request.clone();
        Ok(request)
    }

    pub fn tracking(&self, now: DateTime<Utc>) -> TrackingView {
        let state = self.lock();
        let snapshot = state.application.submitted_snapshot.as_ref();
        TrackingView {
            application_id: state.application.id.clone(),
            status: state.application.status,
            submitted_at: snapshot.map(|snapshot| snapshot.submitted_at),
            revised_at: snapshot.and_then(|snapshot| snapshot.revised_at),
            modification_status: state.modification.as_ref().map(|request| request.status),
            modification_valid_until: state
                .modification
                .as_ref()
                .and_then(|request| request.valid_until),
            edit_window_open: state.application.status == ApplicationStatus::Submitted
                && state
                    .modification
                    .as_ref()
                    .map(|request| request.permits_edit(now))
                    .unwrap_or(false),
            progress: Progress::from_flags(&state.application.sections),
            sections: state.application.sections.clone(),
        }
    }

    pub(super) fn ensure_session(&self) -> Result<(), ApplicationError> {
        if self.is_session_expired() {
            Err(ApplicationError::AuthExpired)
        } else {
            Ok(())
        }
    }

    pub(super) fn ensure_mutable(
        &self,
        state: &DraftState,
        now: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        match state.application.status {
            ApplicationStatus::Draft => Ok(()),
            ApplicationStatus::Submitted
                if state
                    .modification
                    .as_ref()
                    .map(|request| request.permits_edit(now))
                    .unwrap_or(false) =>
            {
                Ok(())
            }
            ApplicationStatus::Submitted => Err(ApplicationError::Conflict(
                "application is submitted and read-only".to_string(),
            )),
        }
    }

    pub(super) fn mutable_id(&self, now: DateTime<Utc>) -> Result<ApplicationId, ApplicationError> {
        self.ensure_session()?;
        let state = self.lock();
        self.ensure_mutable(&state, now)?;
        Ok(state.application.id.clone())
    }

    /// Map a collaborator result, latching the expired session on `AuthExpired`.
    pub(super) fn remote<T>(&self, result: Result<T, ServiceError>) -> Result<T, ApplicationError> {
        result.map_err(|err| self.surface(err))
    }

    fn surface(&self, err: ServiceError) -> ApplicationError {
        if err == ServiceError::AuthExpired && !self.expired.swap(true, Ordering::SeqCst) {
            warn!("session expired; clearing local session markers");
            self.services.markers.clear();
        }
        err.into()
    }

    fn check_shapes(&self, partial: &AnswerMap) -> Result<(), ApplicationError> {
        for (field, value) in partial {
            if let Some(node) = self.settings.questionnaire.node(field) {
                node.kind.accepts(node.id, &node.options, value)?;
            }
        }
        Ok(())
    }

    fn effective_answers(&self, state: &DraftState) -> AnswerMap {
        let answers = state.store.as_map();
        evaluate(&self.settings.questionnaire, answers).effective_answers(answers)
    }

    fn compliance_for(&self, state: &DraftState) -> ComplianceReport {
        let answers = self.effective_answers(state);
        let destinations = DestinationTag::from_answers(&answers);
        self.settings
            .resolver
            .assess(&destinations, &state.documents)
    }

    fn verdict_for(&self, state: &DraftState, section: SectionId) -> SectionVerdict {
        let answers = self.effective_answers(state);
        let destinations = DestinationTag::from_answers(&answers);
        let compliance = self
            .settings
            .resolver
            .assess(&destinations, &state.documents);
        let context = SectionContext {
            answers: &answers,
            qualifications: &state.qualifications,
            compliance: &compliance,
            submitted: state.application.status == ApplicationStatus::Submitted,
        };
        self.settings.validator.verdict(section, &context)
    }
}

/// Take the service's view unless a newer save is still in flight; staged edits stay on top.
fn adopt_response(state: &mut DraftState, application: Application) {
    if application.revision >= state.sequencer.issued() {
        let mut answers = application.answers.clone();
        answers.extend(state.coalescer.staged().clone());
        state.store = AnswerStore::from_map(answers);
        state.application = application;
    } else {
        state.application.revision = application.revision;
    }
}
