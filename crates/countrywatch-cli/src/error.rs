use countrywatch_core::{
    FailureClass, PublishError, RefreshError, RepositoryError, ServiceError, ValidationError,
    WarehouseError,
};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("country '{name}' not found")]
    NotFound { name: String },

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ServiceError> for CliError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation(error) => Self::Validation(error),
            ServiceError::Repository(error) => Self::Repository(error),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::NotFound { .. } => 2,
            Self::Refresh(error) => match error.failure_class() {
                FailureClass::ServiceUnavailable => 3,
                FailureClass::Internal => 11,
            },
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
            Self::Repository(_) | Self::Warehouse(_) | Self::Publish(_) => 11,
        }
    }
}

#[cfg(test)]
mod tests {
    use countrywatch_core::SourceError;

    use super::*;

    #[test]
    fn source_failures_exit_with_service_unavailable_code() {
        let error = CliError::from(RefreshError::from(SourceError::timeout("countries")));
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn missing_country_is_a_usage_error() {
        let error = CliError::NotFound {
            name: String::from("Atlantis"),
        };
        assert_eq!(error.exit_code(), 2);
        assert_eq!(error.to_string(), "country 'Atlantis' not found");
    }
}
