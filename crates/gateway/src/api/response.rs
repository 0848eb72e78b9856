//! Response envelope helpers.
//!
//! Every JSON response uses the same shape: `{code, message, data}`.
//! `code` 0 means success; 500 means failure, with the error text in
//! `message` and `data` null.

use serde::Serialize;

/// Success code.
pub const CODE_SUCCESS: i32 = 0;

/// Generic failure code.
pub const CODE_FAIL: i32 = 500;

/// The uniform JSON response body.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    /// A successful response carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_SUCCESS,
            message: "ok".to_string(),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    /// A failure response with a user-facing message and no data.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            code: CODE_FAIL,
            message: message.into(),
            data: None,
        }
    }
}
