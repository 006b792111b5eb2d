//! Typed errors for the SCM client.
//!
//! Every non-success HTTP response maps to exactly one [`ApiError`]
//! variant. Classification is a total function of status code, content
//! type and body; it never depends on the request method or the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content type the backend uses for structured error bodies.
///
/// Matched by prefix, so a changed version parameter still classifies.
pub const ERROR_CONTENT_TYPE: &str = "application/vnd.scmm-error+json;v=2";

const ERROR_CONTENT_TYPE_PREFIX: &str = "application/vnd.scmm-error";

/// Reserved machine code the backend sends when the bearer token expired.
pub const TOKEN_EXPIRED_ERROR_CODE: &str = "4jR7UzV0w1";

/// Context entry of a backend error, pointing at the affected entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
  #[serde(rename = "type")]
  pub entry_type: String,
  pub id: String,
}

/// Single constraint violation, usually tied to one request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalMessage {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub key: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
}

/// Structured error body as sent by the backend.
///
/// Carries enough detail (machine code, violations) for a display layer
/// to render field-level messages without parsing free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendError {
  pub transaction_id: String,
  pub error_code: String,
  pub message: String,
  #[serde(default)]
  pub context: Vec<ContextEntry>,
  #[serde(default)]
  pub violations: Vec<Violation>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub additional_messages: Option<Vec<AdditionalMessage>>,
  /// HTTP status of the response this body arrived with. Not part of the
  /// wire format, attached during classification.
  #[serde(skip)]
  pub status: u16,
}

impl std::fmt::Display for BackendError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{} (code {}, transaction {})",
      self.message, self.error_code, self.transaction_id
    )
  }
}

/// Closed error taxonomy of the client.
///
/// The HTTP-derived variants mirror the backend's behavior one to one;
/// `Network` and `Decode` cover transport failures below the HTTP layer.
/// All variants are `Clone` so coalesced cache waiters can share one
/// failure, which is why transport errors carry rendered messages instead
/// of source errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,
  #[error("token expired")]
  TokenExpired,
  #[error("forbidden")]
  Forbidden,
  #[error("bad gateway")]
  BadGateway,
  #[error("not found: {0}")]
  NotFound(BackendError),
  #[error("conflict: {0}")]
  Conflict(BackendError),
  #[error("backend error: {0}")]
  Backend(BackendError),
  #[error("server returned status code {status}")]
  Generic { status: u16 },
  #[error("missing link: {0}")]
  MissingLink(String),
  #[error("Server does not return required Location header")]
  MissingLocationHeader,
  #[error("network error: {0}")]
  Network(String),
  #[error("failed to decode response: {0}")]
  Decode(String),
}

impl ApiError {
  /// HTTP status associated with this error, if it came from a response.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Unauthorized | ApiError::TokenExpired => Some(401),
      ApiError::Forbidden => Some(403),
      ApiError::BadGateway => Some(502),
      ApiError::NotFound(content) | ApiError::Conflict(content) | ApiError::Backend(content) => {
        Some(content.status)
      }
      ApiError::Generic { status } => Some(*status),
      ApiError::MissingLink(_)
      | ApiError::MissingLocationHeader
      | ApiError::Network(_)
      | ApiError::Decode(_) => None,
    }
  }

  /// Structured backend content, when the server sent one.
  pub fn backend_content(&self) -> Option<&BackendError> {
    match self {
      ApiError::NotFound(content) | ApiError::Conflict(content) | ApiError::Backend(content) => {
        Some(content)
      }
      _ => None,
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(error: reqwest::Error) -> Self {
    if error.is_decode() {
      ApiError::Decode(error.to_string())
    } else {
      ApiError::Network(error.to_string())
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(error: serde_json::Error) -> Self {
    ApiError::Decode(error.to_string())
  }
}

/// Classify a non-success response from its status and parsed backend
/// body. Pure; the response adapter lives in [`fail_on_error`].
pub fn classify(status: u16, content: Option<BackendError>) -> ApiError {
  match (status, content) {
    (401, Some(content)) if content.error_code == TOKEN_EXPIRED_ERROR_CODE => {
      ApiError::TokenExpired
    }
    (401, _) => ApiError::Unauthorized,
    (403, _) => ApiError::Forbidden,
    (502, _) => ApiError::BadGateway,
    (404, Some(content)) => ApiError::NotFound(content),
    (409, Some(content)) => ApiError::Conflict(content),
    (_, Some(content)) => ApiError::Backend(content),
    (status, None) => ApiError::Generic { status },
  }
}

fn is_backend_error(response: &reqwest::Response) -> bool {
  response
    .headers()
    .get(reqwest::header::CONTENT_TYPE)
    .and_then(|value| value.to_str().ok())
    .map(|content_type| content_type.starts_with(ERROR_CONTENT_TYPE_PREFIX))
    .unwrap_or(false)
}

/// Turn a non-success response into its typed error, passing successful
/// responses through untouched.
pub(crate) async fn fail_on_error(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
  if response.status().is_success() {
    return Ok(response);
  }

  let status = response.status().as_u16();
  let content = if is_backend_error(&response) {
    // an unparseable error body degrades to the generic variant
    response.json::<BackendError>().await.ok().map(|mut content| {
      content.status = status;
      content
    })
  } else {
    None
  };

  Err(classify(status, content))
}
