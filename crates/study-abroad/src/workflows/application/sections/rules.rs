use super::super::domain::{QualificationKind, SectionId};
use super::config::ValidationConfig;
use super::{SectionContext, SectionVerdict};

pub(crate) fn profile(context: &SectionContext<'_>, config: &ValidationConfig) -> SectionVerdict {
    let missing = config
        .profile_fields
        .iter()
        .filter(|field| {
            !context
                .answers
                .get(field.as_str())
                .map(|value| value.is_filled())
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    SectionVerdict::from_missing(SectionId::PersonalInformation, missing)
}

pub(crate) fn qualifications(
    context: &SectionContext<'_>,
    config: &ValidationConfig,
) -> SectionVerdict {
    let has = |kind: QualificationKind, markers: &[String]| {
        context
            .qualifications
            .iter()
            .filter(|qualification| qualification.kind == kind)
            .any(|qualification| title_matches(&qualification.title, markers))
    };

    let mut missing = Vec::new();
    if !has(QualificationKind::Language, &config.language_test_markers) {
        missing.push("language_test".to_string());
    }
    if !has(QualificationKind::Academic, &config.diploma_markers) {
        missing.push("academic_diploma".to_string());
    }
    SectionVerdict::from_missing(SectionId::AcademicBackground, missing)
}

pub(crate) fn documents(context: &SectionContext<'_>) -> SectionVerdict {
    let missing = context
        .compliance
        .non_compliant()
        .map(|key| key.code().to_string())
        .collect();
    SectionVerdict::from_missing(SectionId::Documents, missing)
}

pub(crate) fn preferences(
    context: &SectionContext<'_>,
    config: &ValidationConfig,
) -> SectionVerdict {
    let filled = |field: &str| {
        context
            .answers
            .get(field)
            .map(|value| value.is_filled())
            .unwrap_or(false)
    };

    let missing = if filled(&config.intake_field) || filled(&config.notes_field) {
        Vec::new()
    } else {
        vec![config.intake_field.clone(), config.notes_field.clone()]
    };
    SectionVerdict::from_missing(SectionId::Preferences, missing)
}

pub(crate) fn review(context: &SectionContext<'_>) -> SectionVerdict {
    let missing = if context.submitted {
        Vec::new()
    } else {
        vec!["submission".to_string()]
    };
    SectionVerdict::from_missing(SectionId::Review, missing)
}

/// A title matches when one of its tokens equals a marker, or starts with a marker of at least
/// four characters.
pub(crate) fn title_matches(title: &str, markers: &[String]) -> bool {
    let tokens = tokens(title);
    markers.iter().any(|marker| {
        let marker = fold(marker);
        tokens.iter().any(|token| {
            *token == marker || (marker.chars().count() >= 4 && token.starts_with(&marker))
        })
    })
}

fn tokens(value: &str) -> Vec<String> {
    fold(value)
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn fold(value: &str) -> String {
    value
        .chars()
        .flat_map(|ch| ch.to_lowercase())
        .map(|ch| match ch {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'ç' => 'c',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ñ' => 'n',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ý' | 'ÿ' => 'y',
            other => other,
        })
        .collect()
}
