pub mod notification;
pub mod quota;

use beacon_core::error::CoreError;
use validator::Validate;

/// Run `validator` rules on a request body.
pub(crate) fn validate_body<T: Validate>(body: &T) -> Result<(), CoreError> {
    body.validate()
        .map_err(|e| CoreError::Validation(e.to_string()))
}
