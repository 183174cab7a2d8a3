pub mod application;
pub mod questionnaire;
