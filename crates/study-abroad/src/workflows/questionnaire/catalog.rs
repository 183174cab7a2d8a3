use serde::Serialize;

use super::answers::AnswerValue;

/// Answer shape expected by a question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Info,
    SingleSelect,
    MultiSelect,
    Scale { min: f64, max: f64 },
    Number,
    Text,
    Email,
    Tel,
}

impl QuestionKind {
    pub const fn is_interactive(self) -> bool {
        !matches!(self, QuestionKind::Info)
    }

    pub const fn label(self) -> &'static str {
        match self {
            QuestionKind::Info => "info",
            QuestionKind::SingleSelect => "single_select",
            QuestionKind::MultiSelect => "multi_select",
            QuestionKind::Scale { .. } => "scale",
            QuestionKind::Number => "number",
            QuestionKind::Text => "text",
            QuestionKind::Email => "email",
            QuestionKind::Tel => "tel",
        }
    }
}

/// Declarative condition over previously recorded answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum BranchPredicate {
    Always,
    /// The upstream answer is exactly this text value.
    Equals {
        question: &'static str,
        value: &'static str,
    },
    /// The upstream multi-select answer contains this value.
    Includes {
        question: &'static str,
        value: &'static str,
    },
    AllOf {
        predicates: Vec<BranchPredicate>,
    },
}

impl BranchPredicate {
    pub fn holds<'a, F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<&'a AnswerValue>,
    {
        match self {
            BranchPredicate::Always => true,
            BranchPredicate::Equals { question, value } => {
                matches!(lookup(question), Some(AnswerValue::Text(answer)) if answer == value)
            }
            BranchPredicate::Includes { question, value } => match lookup(question) {
                Some(AnswerValue::Choices(choices)) => choices.iter().any(|choice| choice == value),
                _ => false,
            },
            BranchPredicate::AllOf { predicates } => {
                predicates.iter().all(|predicate| predicate.holds(lookup))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionNode {
    pub id: &'static str,
    pub prompt: &'static str,
    pub kind: QuestionKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<&'static str>,
    /// Node-level condition, evaluated after the enclosing group's guard.
    pub condition: BranchPredicate,
    pub required: bool,
}

impl QuestionNode {
    pub fn is_interactive(&self) -> bool {
        self.kind.is_interactive()
    }
}

/// A contiguous run of nodes sharing one guard, e.g. a destination branch.
#[derive(Debug, Clone, Serialize)]
pub struct FlowGroup {
    pub key: &'static str,
    pub guard: BranchPredicate,
    pub nodes: Vec<QuestionNode>,
}

/// Ordered question groups. Declaration order is the only ordering the evaluator honours.
#[derive(Debug, Clone, Serialize)]
pub struct FlowCatalog {
    groups: Vec<FlowGroup>,
}

impl FlowCatalog {
    pub fn new(groups: Vec<FlowGroup>) -> Self {
        Self { groups }
    }

    /// The advisory chat questionnaire.
    pub fn advisory() -> Self {
        Self::new(advisory_groups())
    }

    pub fn groups(&self) -> &[FlowGroup] {
        &self.groups
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&FlowGroup, &QuestionNode)> {
        self.groups
            .iter()
            .flat_map(|group| group.nodes.iter().map(move |node| (group, node)))
    }

    pub fn node(&self, id: &str) -> Option<&QuestionNode> {
        self.nodes()
            .map(|(_, node)| node)
            .find(|node| node.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }
}

const fn always() -> BranchPredicate {
    BranchPredicate::Always
}

fn destination(value: &'static str) -> BranchPredicate {
    BranchPredicate::Includes {
        question: "destinations",
        value,
    }
}

fn info(id: &'static str, prompt: &'static str) -> QuestionNode {
    QuestionNode {
        id,
        prompt,
        kind: QuestionKind::Info,
        options: Vec::new(),
        condition: always(),
        required: false,
    }
}

fn ask(id: &'static str, prompt: &'static str, kind: QuestionKind) -> QuestionNode {
    QuestionNode {
        id,
        prompt,
        kind,
        options: Vec::new(),
        condition: always(),
        required: true,
    }
}

fn pick(
    id: &'static str,
    prompt: &'static str,
    kind: QuestionKind,
    options: &[&'static str],
) -> QuestionNode {
    QuestionNode {
        options: options.to_vec(),
        ..ask(id, prompt, kind)
    }
}

const YES_NO: &[&str] = &["yes", "no"];

fn advisory_groups() -> Vec<FlowGroup> {
    vec![
        FlowGroup {
            key: "welcome",
            guard: always(),
            nodes: vec![
                info(
                    "welcome_banner",
                    "Welcome! A few questions will help an advisor prepare your study plan.",
                ),
                pick(
                    "study_level",
                    "Which level of study are you aiming for?",
                    QuestionKind::SingleSelect,
                    &["bachelor", "master", "doctorate", "language_course"],
                ),
                pick(
                    "destinations",
                    "Which countries are you considering?",
                    QuestionKind::MultiSelect,
                    &["france", "china", "morocco", "canada", "belgium"],
                ),
                pick(
                    "field_of_interest",
                    "Which field would you like to study?",
                    QuestionKind::SingleSelect,
                    &[
                        "engineering",
                        "medicine",
                        "business",
                        "computer_science",
                        "humanities",
                        "other",
                    ],
                ),
            ],
        },
        FlowGroup {
            key: "france",
            guard: destination("france"),
            nodes: vec![
                info(
                    "france_banner",
                    "France: most programmes are taught in French and go through Campus France.",
                ),
                ask(
                    "french_proficiency",
                    "How confident are you in French, from 1 to 5?",
                    QuestionKind::Scale { min: 1.0, max: 5.0 },
                ),
                pick(
                    "campus_france_started",
                    "Have you opened a Campus France file?",
                    QuestionKind::SingleSelect,
                    YES_NO,
                ),
            ],
        },
        FlowGroup {
            key: "china",
            guard: destination("china"),
            nodes: vec![
                info(
                    "china_banner",
                    "China: many programmes are taught in English; a medical check is mandatory.",
                ),
                pick(
                    "china_teaching_language",
                    "Which teaching language do you prefer in China?",
                    QuestionKind::SingleSelect,
                    &["english", "chinese", "either"],
                ),
                pick(
                    "csc_scholarship_interest",
                    "Are you interested in a government scholarship?",
                    QuestionKind::SingleSelect,
                    YES_NO,
                ),
            ],
        },
        FlowGroup {
            key: "morocco",
            guard: destination("morocco"),
            nodes: vec![pick(
                "morocco_city",
                "Which Moroccan city do you prefer?",
                QuestionKind::SingleSelect,
                &["rabat", "casablanca", "marrakech", "fes", "no_preference"],
            )],
        },
        FlowGroup {
            key: "canada",
            guard: destination("canada"),
            nodes: vec![pick(
                "canada_province",
                "Which province are you targeting?",
                QuestionKind::SingleSelect,
                &["quebec", "ontario", "british_columbia", "other"],
            )],
        },
        FlowGroup {
            key: "belgium",
            guard: destination("belgium"),
            nodes: vec![pick(
                "belgium_community",
                "French- or Dutch-speaking institution?",
                QuestionKind::SingleSelect,
                &["french", "dutch", "either"],
            )],
        },
        FlowGroup {
            key: "budget",
            guard: always(),
            nodes: vec![
                ask(
                    "annual_budget_eur",
                    "What yearly budget (in euros) can you dedicate to your studies?",
                    QuestionKind::Number,
                ),
                pick(
                    "funding_source",
                    "How will you fund your studies?",
                    QuestionKind::SingleSelect,
                    &["family", "personal_savings", "scholarship", "loan", "mixed"],
                ),
            ],
        },
        FlowGroup {
            key: "contact",
            guard: always(),
            nodes: vec![
                ask("full_name", "What is your full name?", QuestionKind::Text),
                ask("email", "Which email can we reach you at?", QuestionKind::Email),
                ask("phone", "And a phone number?", QuestionKind::Tel),
                pick(
                    "wants_callback",
                    "Would you like an advisor to call you back?",
                    QuestionKind::SingleSelect,
                    YES_NO,
                ),
                QuestionNode {
                    condition: BranchPredicate::Equals {
                        question: "wants_callback",
                        value: "yes",
                    },
                    ..pick(
                        "callback_slot",
                        "When should we call?",
                        QuestionKind::SingleSelect,
                        &["morning", "afternoon", "evening"],
                    )
                },
                info(
                    "closing_banner",
                    "Thank you! Your diagnostic is being prepared.",
                ),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn advisory_catalog_ids_are_unique() {
        let catalog = FlowCatalog::advisory();
        let mut seen = HashSet::new();
        for (_, node) in catalog.nodes() {
            assert!(seen.insert(node.id), "duplicate node id {}", node.id);
        }
        assert!(catalog.contains("callback_slot"));
        assert!(!catalog.contains("passport_number"));
    }

    #[test]
    fn destination_options_match_branch_guards() {
        let catalog = FlowCatalog::advisory();
        let destinations = catalog.node("destinations").expect("destinations node");
        for group in catalog.groups() {
            if let BranchPredicate::Includes { question, value } = &group.guard {
                assert_eq!(*question, "destinations");
                assert!(destinations.options.contains(value), "{value} missing");
            }
        }
    }

    #[test]
    fn predicates_read_through_lookup() {
        let yes = AnswerValue::text("yes");
        let picked = AnswerValue::choices(["china"]);
        let lookup = |id: &str| match id {
            "wants_callback" => Some(&yes),
            "destinations" => Some(&picked),
            _ => None,
        };

        assert!(BranchPredicate::Equals {
            question: "wants_callback",
            value: "yes"
        }
        .holds(&lookup));
        assert!(destination("china").holds(&lookup));
        assert!(!destination("france").holds(&lookup));
        assert!(!BranchPredicate::AllOf {
            predicates: vec![destination("china"), destination("france")],
        }
        .holds(&lookup));
    }
}
