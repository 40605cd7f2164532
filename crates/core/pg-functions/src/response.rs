//! Serializable `{ data, error }` envelope for operation results

use crate::error::Error;

/// Operation result in envelope form
///
/// Exactly one of `data` and `error` is set.
///
/// ## Example JSON
/// ```json
/// {
///   "data": null,
///   "error": {
///     "code": "FUNCTION_NOT_FOUND",
///     "message": "Cannot find a function with ID 16390"
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Response<T> {
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
}

/// Error side of a [`Response`]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code in SCREAMING_SNAKE_CASE format, see [`Error::error_code`]
    pub code: String,

    /// Human-readable message; for execution errors, the server's message verbatim
    pub message: String,
}

impl<T> Response<T> {
    /// Whether the operation succeeded
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl From<&Error> for ErrorBody {
    fn from(error: &Error) -> Self {
        ErrorBody {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

impl<T> From<Result<T, Error>> for Response<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(data) => Response {
                data: Some(data),
                error: None,
            },
            Err(err) => Response {
                data: None,
                error: Some(ErrorBody::from(&err)),
            },
        }
    }
}
