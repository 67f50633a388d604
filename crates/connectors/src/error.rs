use model::execution::validation::Violation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Unsupported format: {0}")]
    Unsupported(String),

    #[error("Content is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Malformed document: {}", summarize(.0))]
    Structure(Vec<Violation>),
}

impl FormatError {
    pub fn violations(&self) -> Vec<Violation> {
        match self {
            FormatError::Structure(violations) => violations.clone(),
            other => vec![Violation::file(
                model::execution::validation::ViolationCode::Malformed,
                other.to_string(),
            )],
        }
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
