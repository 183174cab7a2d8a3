use crate::demo::{run_demo, DemoArgs};
use crate::reports::{
    run_questionnaire_chat, run_questionnaire_evaluate, run_requirements_report, ChatArgs,
    EvaluateArgs, RequirementsArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use study_abroad::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Study Abroad Intake",
    about = "Run and explore the study-abroad questionnaire and application engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Work with the advisory questionnaire
    Questionnaire {
        #[command(subcommand)]
        command: QuestionnaireCommand,
    },
    /// Inspect document requirements
    Documents {
        #[command(subcommand)]
        command: DocumentsCommand,
    },
    /// Walk one application from draft to submission against in-memory services
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum QuestionnaireCommand {
    /// Evaluate a JSON answer file and print the active flow
    Evaluate(EvaluateArgs),
    /// Answer the questionnaire interactively, resuming from the last checkpoint
    Chat(ChatArgs),
}

#[derive(Subcommand, Debug)]
enum DocumentsCommand {
    /// Print the resolved requirement matrix for a set of destinations
    Requirements(RequirementsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Load the document catalog from a CSV export instead of the built-in one
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Questionnaire {
            command: QuestionnaireCommand::Evaluate(args),
        } => run_questionnaire_evaluate(args),
        Command::Questionnaire {
            command: QuestionnaireCommand::Chat(args),
        } => run_questionnaire_chat(args),
        Command::Documents {
            command: DocumentsCommand::Requirements(args),
        } => run_requirements_report(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
