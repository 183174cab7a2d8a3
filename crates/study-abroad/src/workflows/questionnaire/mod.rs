//! Branching questionnaire used by the advisory chat surface.
//!
//! The catalog is static, the answer store is the only mutable piece, and the active flow is
//! re-derived from answers on every mutation.

pub mod answers;
pub mod catalog;
pub mod checkpoint;
pub mod diagnostic;
pub mod evaluator;
pub mod navigator;
pub mod session;

pub use answers::{AnswerError, AnswerMap, AnswerStore, AnswerValue};
pub use catalog::{BranchPredicate, FlowCatalog, FlowGroup, QuestionKind, QuestionNode};
pub use checkpoint::{
    CheckpointError, CheckpointStore, DraftCheckpoint, FileCheckpointStore, MemoryCheckpointStore,
};
pub use diagnostic::{DiagnosticAnswer, DiagnosticBackend, DiagnosticReport, DiagnosticRequest};
pub use evaluator::{evaluate, ActiveFlow, ActiveNode, FlowProgress, TranscriptEntry};
pub use navigator::{FlowError, FlowState};
pub use session::{QuestionnaireSession, SessionError};
