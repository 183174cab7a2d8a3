use crate::infra::{content_type_for, parse_destination, InMemoryBackend, LoggingMarkers};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use std::collections::BTreeSet;
use std::sync::Arc;
use study_abroad::error::AppError;
use study_abroad::workflows::application::{
    ApplicationOrchestrator, DestinationTag, FileUpload, Language, ModificationStatus,
    OrchestratorSettings, ProgramRef, QualificationDraft, QualificationKind, SaveOutcome,
    SectionId, TrackingView, ValidationStatus,
};
use study_abroad::workflows::questionnaire::{AnswerMap, AnswerValue};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Program the demo application targets
    #[arg(long, default_value = "msc-data-science-lyon")]
    pub(crate) program: String,
    /// Destination country (repeatable). Defaults to France.
    #[arg(long = "destination", value_parser = parse_destination)]
    pub(crate) destinations: Vec<DestinationTag>,
    /// Stop after submission instead of opening a modification window
    #[arg(long)]
    pub(crate) skip_modification: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        program,
        destinations,
        skip_modification,
    } = args;
    let destinations: BTreeSet<DestinationTag> = if destinations.is_empty() {
        [DestinationTag::France].into_iter().collect()
    } else {
        destinations.into_iter().collect()
    };

    let backend = InMemoryBackend::new();
    let settings = Arc::new(OrchestratorSettings::default());
    let debounce = settings.save_debounce;
    let orchestrator = ApplicationOrchestrator::load_or_create(
        ProgramRef(program.clone()),
        backend.services(Arc::new(LoggingMarkers)),
        settings,
    )
    .await?;
    let mut now = Utc::now();

    println!("Study abroad application demo");
    println!("- Draft {} opened for {}", orchestrator.id().0, program);

    let outcome = orchestrator.save(profile_answers(&destinations), now).await?;
    println!("- Profile saved ({})", describe(outcome));

    let outcome = orchestrator
        .save(single("city", AnswerValue::text("Rabat-Agdal")), now)
        .await?;
    println!("- City edited ({})", describe(outcome));
    now += debounce;
    let outcome = orchestrator.flush(now).await?;
    println!("  after {} ms quiet: {}", debounce.num_milliseconds(), describe(outcome));

    for (kind, title) in [
        (QualificationKind::Language, "DELF B2"),
        (QualificationKind::Academic, "Baccalauréat Sciences Mathématiques"),
    ] {
        orchestrator
            .add_qualification(
                QualificationDraft {
                    kind,
                    title: title.to_string(),
                    institution: None,
                    year: Some(2024),
                },
                now,
            )
            .await?;
    }
    println!("- {} qualifications recorded", orchestrator.qualifications().len());

    upload_required_documents(&orchestrator, &backend, now).await?;
    let compliance = orchestrator.compliance();
    println!(
        "- Documents: {:.0}% of required, {:.0}% of the full catalog",
        compliance.minimum_required.percent(),
        compliance.full_catalog.percent()
    );
    for tag in &destinations {
        println!(
            "  {} requirements met: {}",
            tag.label(),
            compliance.required_documents_in(*tag)
        );
    }

    for section in [
        SectionId::PersonalInformation,
        SectionId::AcademicBackground,
        SectionId::Documents,
    ] {
        let verdict = orchestrator.confirm_section(section, now).await?;
        if verdict.satisfied {
            println!("- Section {} confirmed", section);
        } else {
            println!(
                "- Section {} incomplete: {}",
                section,
                verdict.missing.join(", ")
            );
        }
    }

    let outcome = orchestrator
        .save(single("intake", AnswerValue::text("september-2026")), now)
        .await?;
    println!("- Intake chosen ({})", describe(outcome));

    now += Duration::minutes(5);
    match orchestrator.submit(now).await {
        Ok(application) => println!(
            "- Application {} submitted at {}",
            application.id.0,
            now.format("%Y-%m-%d %H:%M")
        ),
        Err(err) => {
            println!("  Submission blocked: {}", err);
            return Ok(());
        }
    }
    print_tracking(&orchestrator.tracking(now));

    if skip_modification {
        return Ok(());
    }

    let request = orchestrator
        .request_modification("Passport renewed after submission")
        .await?;
    println!("\nModification requested ({})", request.status.label());
    let valid_until = now + Duration::days(2);
    backend.decide_modification(
        &orchestrator.id(),
        ModificationStatus::Approved,
        Some(valid_until),
    );
    orchestrator.refresh_modification().await?;

    now += Duration::hours(1);
    let outcome = orchestrator
        .save(
            single(
                "preference_notes",
                AnswerValue::text("Prefer a campus with evening classes"),
            ),
            now,
        )
        .await?;
    println!("- Edit inside the window ({})", describe(outcome));
    orchestrator.flush_now(now).await?;
    print_tracking(&orchestrator.tracking(now));

    let after = valid_until + Duration::minutes(1);
    if let Err(err) = orchestrator
        .save(single("preference_notes", AnswerValue::text("too late")), after)
        .await
    {
        println!("- Edit after the window: {}", err);
    }

    Ok(())
}

/// Upload every required document in each applicable destination's language, translating
/// where destinations disagree.
async fn upload_required_documents(
    orchestrator: &ApplicationOrchestrator,
    backend: &InMemoryBackend,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let matrix = orchestrator.requirements();
    let policy = orchestrator.settings().resolver.policy().clone();
    let desk = orchestrator.document_desk();

    for document in &matrix.required {
        let applicable = matrix.applicable_destinations(document);
        let mut languages: Vec<Language> = Vec::new();
        for tag in &applicable {
            let language = policy.required_language(*tag).clone();
            if !languages.contains(&language) {
                languages.push(language);
            }
        }
        if languages.is_empty() {
            languages.push(policy.default_language.clone());
        }

        let original = languages.remove(0);
        let file_name = format!("{}.pdf", document.key.code());
        let record = desk
            .upload(document.key, original.clone(), upload(&file_name), now)
            .await?;
        backend.review_document(&record.id, ValidationStatus::Approved);
        println!(
            "  {} uploaded in {} as {}",
            document.label,
            original.code(),
            backend.content_type(&record.id.0).unwrap_or_default()
        );

        for language in languages {
            let name = format!("{}-{}.pdf", document.key.code(), language.code());
            let translation = desk
                .add_translation(&record.id, language.clone(), upload(&name), now)
                .await?;
            backend.review_translation(&translation.id, ValidationStatus::Approved);
            println!("    translated to {}", language.code());
        }
    }
    orchestrator.refresh().await?;
    Ok(())
}

fn upload(file_name: &str) -> FileUpload {
    FileUpload {
        file_name: file_name.to_string(),
        content_type: content_type_for(file_name),
        bytes: format!("demo content for {file_name}").into_bytes(),
    }
}

fn single(field: &str, value: AnswerValue) -> AnswerMap {
    let mut answers = AnswerMap::new();
    answers.insert(field.to_string(), value);
    answers
}

fn profile_answers(destinations: &BTreeSet<DestinationTag>) -> AnswerMap {
    let mut answers = AnswerMap::new();
    for (field, value) in [
        ("first_name", "Yasmine"),
        ("last_name", "El Idrissi"),
        ("date_of_birth", "2003-11-02"),
        ("place_of_birth", "Meknes"),
        ("gender", "female"),
        ("nationality", "Moroccan"),
        ("passport_number", "AB1234567"),
        ("email", "yasmine.elidrissi@example.org"),
        ("phone", "+212 611 223 344"),
        ("address", "7 Rue Ibn Sina"),
        ("city", "Rabat"),
        ("country", "Morocco"),
        ("education_level", "bachelor"),
        ("field_of_study", "Applied mathematics"),
    ] {
        answers.insert(field.to_string(), AnswerValue::text(value));
    }
    answers.insert(
        "destinations".to_string(),
        AnswerValue::choices(destinations.iter().map(|tag| tag.code())),
    );
    answers.insert(
        "spoken_languages".to_string(),
        AnswerValue::choices(["ar", "fr", "en"]),
    );
    answers
}

fn describe(outcome: SaveOutcome) -> String {
    match outcome {
        SaveOutcome::Idle => "nothing to send".to_string(),
        SaveOutcome::Staged => "waiting for the debounce window".to_string(),
        SaveOutcome::Dispatched {
            revision,
            adopted: true,
        } => format!("saved as revision {revision}"),
        SaveOutcome::Dispatched {
            revision,
            adopted: false,
        } => format!("revision {revision} superseded by a newer save"),
    }
}

fn print_tracking(view: &TrackingView) {
    println!(
        "  Tracking: {} | progress {}/{} ({:.0}%)",
        view.status.label(),
        view.progress.completed,
        view.progress.total,
        view.progress.percent()
    );
    if let Some(revised_at) = view.revised_at {
        println!("  Last revised {}", revised_at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(status) = view.modification_status {
        println!(
            "  Modification {} (edit window open: {})",
            status.label(),
            view.edit_window_open
        );
    }
}
