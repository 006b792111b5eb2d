//! URL construction for the request pipeline.

use crate::http::session::{CLIENT_ID, CLIENT_PARAMETER, SESSION_PARAMETER};

/// Path segment prefixed to every relative resource path.
pub const API_PATH: &str = "/api/v2";

/// Normalize a resource path into a full request URL.
///
/// Absolute URLs (anything carrying a scheme separator) pass through
/// unchanged, so hypermedia links returned by the server can be used
/// directly. Relative paths get the API root prefixed exactly once,
/// regardless of a leading slash.
pub fn create_url(base: &str, url: &str) -> String {
  if url.contains("://") {
    return url.to_string();
  }

  let base = base.trim_end_matches('/');
  if url.starts_with('/') {
    format!("{}{}{}", base, API_PATH, url)
  } else {
    format!("{}{}/{}", base, API_PATH, url)
  }
}

/// Normalized URL with the client type and session id appended as query
/// parameters, used for subscription channels.
pub fn create_url_with_identifiers(base: &str, url: &str, session_id: &str) -> String {
  format!(
    "{}?{}={}&{}={}",
    create_url(base, url),
    CLIENT_PARAMETER,
    CLIENT_ID,
    SESSION_PARAMETER,
    session_id
  )
}

/// Join a base URL with further path segments.
pub fn concat(base: &str, parts: &[&str]) -> String {
  let mut url = base.to_string();
  for part in parts {
    url.push('/');
    url.push_str(part);
  }
  url
}

/// Build an encoded query string from key/value pairs.
pub fn create_query_string(params: &[(&str, String)]) -> String {
  let mut serializer = url::form_urlencoded::Serializer::new(String::new());
  for (key, value) in params {
    serializer.append_pair(key, value);
  }
  serializer.finish()
}

/// Percent-encode a single path component (revisions may contain slashes).
pub fn encode_component(value: &str) -> String {
  let mut encoded = String::with_capacity(value.len());
  for byte in value.bytes() {
    match byte {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
        encoded.push(byte as char)
      }
      _ => encoded.push_str(&format!("%{:02X}", byte)),
    }
  }
  encoded
}
