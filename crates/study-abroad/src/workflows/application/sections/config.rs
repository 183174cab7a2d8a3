use serde::{Deserialize, Serialize};

const PROFILE_FIELDS: [&str; 16] = [
    "first_name",
    "last_name",
    "date_of_birth",
    "place_of_birth",
    "gender",
    "nationality",
    "passport_number",
    "email",
    "phone",
    "address",
    "city",
    "country",
    "education_level",
    "field_of_study",
    "destinations",
    "spoken_languages",
];

const LANGUAGE_TEST_MARKERS: [&str; 9] = [
    "tcf", "tef", "delf", "dalf", "ielts", "toefl", "toeic", "hsk", "cambridge",
];

const DIPLOMA_MARKERS: [&str; 8] = [
    "bac",
    "baccalaureat",
    "licence",
    "bachelor",
    "master",
    "diploma",
    "diplome",
    "degree",
];

/// Field ids and title markers the section rules read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub profile_fields: Vec<String>,
    pub language_test_markers: Vec<String>,
    pub diploma_markers: Vec<String>,
    pub intake_field: String,
    pub notes_field: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let owned = |values: &[&str]| values.iter().map(|value| value.to_string()).collect();
        Self {
            profile_fields: owned(&PROFILE_FIELDS),
            language_test_markers: owned(&LANGUAGE_TEST_MARKERS),
            diploma_markers: owned(&DIPLOMA_MARKERS),
            intake_field: "intake".to_string(),
            notes_field: "preference_notes".to_string(),
        }
    }
}
