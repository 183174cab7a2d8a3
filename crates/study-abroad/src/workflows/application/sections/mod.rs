mod config;
mod rules;

pub use config::ValidationConfig;

use serde::Serialize;

use super::documents::ComplianceReport;
use super::domain::{Qualification, SectionFlags, SectionId};
use crate::workflows::questionnaire::AnswerMap;

/// Snapshot the section rules read. `answers` must already exclude inert answers.
#[derive(Debug, Clone, Copy)]
pub struct SectionContext<'a> {
    pub answers: &'a AnswerMap,
    pub qualifications: &'a [Qualification],
    pub compliance: &'a ComplianceReport,
    pub submitted: bool,
}

/// Outcome of one section rule with the ids that kept it from holding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionVerdict {
    pub section: SectionId,
    pub satisfied: bool,
    pub missing: Vec<String>,
}

impl SectionVerdict {
    pub(crate) fn from_missing(section: SectionId, missing: Vec<String>) -> Self {
        Self {
            section,
            satisfied: missing.is_empty(),
            missing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn from_flags(flags: &SectionFlags) -> Self {
        Self {
            completed: SectionId::GATING
                .into_iter()
                .filter(|section| flags.get(*section))
                .count(),
            total: SectionId::GATING.len(),
        }
    }

    pub fn percent(&self) -> f32 {
        self.completed as f32 * 100.0 / self.total as f32
    }
}

/// Stateless rule set deciding whether each application section holds.
#[derive(Debug, Clone, Default)]
pub struct SectionValidationEngine {
    config: ValidationConfig,
}

impl SectionValidationEngine {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn verdict(&self, section: SectionId, context: &SectionContext<'_>) -> SectionVerdict {
        match section {
            SectionId::PersonalInformation => rules::profile(context, &self.config),
            SectionId::AcademicBackground => rules::qualifications(context, &self.config),
            SectionId::Documents => rules::documents(context),
            SectionId::Preferences => rules::preferences(context, &self.config),
            SectionId::Review => rules::review(context),
            // Tracking is informational.
            SectionId::Tracking => SectionVerdict::from_missing(SectionId::Tracking, Vec::new()),
        }
    }

    pub fn validate(&self, section: SectionId, context: &SectionContext<'_>) -> bool {
        self.verdict(section, context).satisfied
    }

    /// Verdicts for the five gating sections, in order.
    pub fn verdicts(&self, context: &SectionContext<'_>) -> Vec<SectionVerdict> {
        SectionId::GATING
            .into_iter()
            .map(|section| self.verdict(section, context))
            .collect()
    }
}

/// Flags as they would stand if every gating section were re-evaluated now.
pub fn evaluated_flags(verdicts: &[SectionVerdict]) -> SectionFlags {
    let mut flags = SectionFlags::default();
    for verdict in verdicts {
        flags.set(verdict.section, verdict.satisfied);
    }
    flags
}
