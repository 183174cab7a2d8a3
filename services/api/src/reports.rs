use crate::infra::{parse_destination, parse_language};
use chrono::Utc;
use clap::Args;
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use study_abroad::config::AppConfig;
use study_abroad::error::AppError;
use study_abroad::workflows::application::{
    DestinationTag, DocumentCatalog, DocumentRequirementResolver, Language, LanguagePolicy,
};
use study_abroad::workflows::questionnaire::{
    evaluate, AnswerMap, AnswerValue, FileCheckpointStore, FlowCatalog, QuestionKind,
    QuestionNode, QuestionnaireSession, SessionError,
};

#[derive(Args, Debug)]
pub(crate) struct RequirementsArgs {
    /// Destination country (repeatable): france, china, morocco, canada, belgium
    #[arg(long = "destination", value_parser = parse_destination)]
    pub(crate) destinations: Vec<DestinationTag>,
    /// Load the document catalog from a CSV export instead of the built-in one
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    /// Language required where no destination rule applies (defaults to English)
    #[arg(long, value_parser = parse_language)]
    pub(crate) default_language: Option<Language>,
}

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// JSON object mapping question ids to answers
    #[arg(long)]
    pub(crate) answers: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct ChatArgs {
    /// Checkpoint key; reuse it to continue an earlier session
    #[arg(long, default_value = "cli")]
    pub(crate) session: String,
    /// Directory for checkpoints (defaults to APP_CHECKPOINT_DIR, then ./checkpoints)
    #[arg(long)]
    pub(crate) checkpoint_dir: Option<PathBuf>,
}

pub(crate) fn run_requirements_report(args: RequirementsArgs) -> Result<(), AppError> {
    let RequirementsArgs {
        destinations,
        catalog,
        default_language,
    } = args;

    let catalog = match catalog {
        Some(path) => DocumentCatalog::from_path(path)?,
        None => DocumentCatalog::standard(),
    };
    let policy = LanguagePolicy::new(default_language.unwrap_or_else(Language::english));
    let resolver = DocumentRequirementResolver::new(catalog, policy);
    let destinations: BTreeSet<DestinationTag> = destinations.into_iter().collect();
    let matrix = resolver.resolve(&destinations);

    if destinations.is_empty() {
        println!("Document requirements (no destination selected)");
    } else {
        let labels: Vec<&str> = destinations.iter().map(|tag| tag.label()).collect();
        println!("Document requirements for {}", labels.join(", "));
    }
    println!(
        "- {} required documents across {} groups ({} catalog entries)",
        matrix.required.len(),
        matrix.groups.len(),
        matrix.catalog_keys().len()
    );

    for document in &matrix.required {
        let applicable = matrix.applicable_destinations(document);
        let languages: Vec<String> = if applicable.is_empty() {
            vec![format!(
                "any: {}",
                resolver.policy().default_language.code()
            )]
        } else {
            applicable
                .iter()
                .map(|tag| {
                    format!(
                        "{}: {}",
                        tag.label(),
                        resolver.policy().required_language(*tag).code()
                    )
                })
                .collect()
        };
        let scope = if document.base { "base" } else { "destination" };
        println!(
            "  - {} [{}] ({}) -> {}",
            document.label,
            document.key.code(),
            scope,
            languages.join(", ")
        );
    }

    Ok(())
}

pub(crate) fn run_questionnaire_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let raw = std::fs::read(&args.answers)?;
    let answers: AnswerMap = serde_json::from_slice(&raw)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

    let catalog = FlowCatalog::advisory();
    let flow = evaluate(&catalog, &answers);
    let progress = flow.progress(&answers);

    println!(
        "Active flow: {} nodes | {}/{} required answered ({}%)",
        flow.len(),
        progress.answered,
        progress.total,
        progress.percent()
    );
    for active in flow.nodes() {
        let node = active.node;
        let marker = match answers.get(node.id) {
            _ if !node.is_interactive() => "  ",
            Some(value) if value.is_filled() => "ok",
            _ => "..",
        };
        println!("  [{marker}] {}/{}: {}", active.group, node.id, node.prompt);
        if let Some(value) = answers.get(node.id) {
            if let Err(err) = node.kind.accepts(node.id, &node.options, value) {
                println!("       ! {err}");
            }
        }
    }

    let inert = flow.inert_answers(&answers);
    if !inert.is_empty() {
        println!("Inert answers kept but ignored: {}", inert.join(", "));
    }
    if flow.is_complete(&answers) {
        println!("Questionnaire complete; ready for diagnostic.");
    }

    Ok(())
}

pub(crate) fn run_questionnaire_chat(args: ChatArgs) -> Result<(), AppError> {
    let ChatArgs {
        session,
        checkpoint_dir,
    } = args;
    let root = match checkpoint_dir {
        Some(dir) => dir,
        None => AppConfig::load()?
            .intake
            .checkpoint_dir
            .unwrap_or_else(|| PathBuf::from("checkpoints")),
    };

    let store = Arc::new(FileCheckpointStore::new(&root)?);
    let mut chat = QuestionnaireSession::resume(Arc::new(FlowCatalog::advisory()), session, store)?;
    println!("Type an answer, 'back' to revisit the previous question, or an empty line to pause.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    while !chat.is_complete() {
        let node = chat.current().map_err(SessionError::from)?.clone();
        if !node.is_interactive() {
            break;
        }
        print_question(&node);

        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            println!("Paused; progress is saved under {}.", root.display());
            return Ok(());
        }
        if line.eq_ignore_ascii_case("back") {
            if let Err(err) = chat.back(Utc::now()) {
                println!("  {err}");
            }
            continue;
        }

        match chat.answer_current(parse_answer(node.kind, line), Utc::now()) {
            Ok(()) => {}
            Err(SessionError::Answer(err)) => println!("  {err}"),
            Err(err) => return Err(err.into()),
        }
    }

    if chat.is_complete() {
        let request = chat.diagnostic_request();
        let payload = serde_json::to_string_pretty(&request)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        println!("Diagnostic payload:\n{payload}");
        chat.finish()?;
    }
    Ok(())
}

fn print_question(node: &QuestionNode) {
    println!("\n{}", node.prompt);
    if !node.options.is_empty() {
        println!("  options: {}", node.options.join(" | "));
    }
    if let QuestionKind::MultiSelect = node.kind {
        println!("  (separate several choices with commas)");
    }
    print!("> ");
    io::stdout().flush().ok();
}

/// Shape a raw line for the node's kind; the store validates the result.
fn parse_answer(kind: QuestionKind, line: &str) -> AnswerValue {
    match kind {
        QuestionKind::MultiSelect => AnswerValue::choices(
            line.split(',')
                .map(str::trim)
                .filter(|choice| !choice.is_empty()),
        ),
        QuestionKind::Scale { .. } | QuestionKind::Number => match line.parse::<f64>() {
            Ok(number) => AnswerValue::Number(number),
            Err(_) => AnswerValue::text(line),
        },
        _ => AnswerValue::text(line),
    }
}
