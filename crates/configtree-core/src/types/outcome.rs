//! Code + message result envelope for callers that relay results over a wire

use serde::{Deserialize, Serialize};

use crate::codecs::{CodecError, CodecResult};

/// Code carried by a successful outcome
pub const SUCCESS_CODE: i32 = 0;

/// Serializable outcome of a codec operation
///
/// `code` is `0` on success and the error's class code otherwise; `data`
/// is only present on success.
///
/// # Example
///
/// ```
/// use configtree_core::{ConfigTree, Outcome};
///
/// let outcome = Outcome::from_result(Ok::<_, configtree_core::CodecError>(ConfigTree::new("a.json")));
/// assert!(outcome.is_success());
/// assert_eq!(outcome.message, "OK");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Outcome<T> {
    /// Successful outcome carrying `data`
    pub fn ok(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            message: "OK".to_string(),
            data: Some(data),
        }
    }

    /// Failed outcome built from an error
    pub fn failure(error: &CodecError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
            data: None,
        }
    }

    pub fn from_result(result: CodecResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failure(&e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// The payload, if the outcome succeeded
    pub fn into_data(self) -> Option<T> {
        if self.is_success() {
            self.data
        } else {
            None
        }
    }
}

impl<T> From<CodecResult<T>> for Outcome<T> {
    fn from(result: CodecResult<T>) -> Self {
        Self::from_result(result)
    }
}
