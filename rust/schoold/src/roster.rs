#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("failed to persist roster: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl RosterError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        RosterError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RosterError::Validation { .. } => "bad_params",
            RosterError::NotFound(_) => "not_found",
            RosterError::Storage(_) => "db_update_failed",
        }
    }
}

/// Trims and rejects empty values for fields the forms mark as required.
pub fn required(field: &str, raw: &str) -> Result<String, RosterError> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(RosterError::validation(field, "must not be empty"));
    }
    Ok(t.to_string())
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
