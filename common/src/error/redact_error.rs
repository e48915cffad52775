use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when a redacted value is handed to a serializer.
#[derive(Debug, ThisError)]
pub enum RedactError {
    #[error("Redaction Error: {type_name} refuses serialization, call expose() explicitly {location}")]
    SerializationRefused {
        type_name: &'static str,
        location: ErrorLocation,
    },
}

impl RedactError {
    #[track_caller]
    pub fn serialization_refused(type_name: &'static str) -> Self {
        RedactError::SerializationRefused {
            type_name,
            location: ErrorLocation::from(std::panic::Location::caller()),
        }
    }
}
