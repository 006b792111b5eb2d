//! Session identity and XSRF token extraction.
//!
//! Every client instance carries one session identifier for its lifetime.
//! The XSRF token is not stored anywhere; it is re-derived from the
//! bearer cookie before each request.

use base64::Engine;
use sha2::{Digest, Sha256};

/// Header identifying the client type.
pub const CLIENT_HEADER: &str = "X-SCM-Client";
/// Header carrying the per-session identifier.
pub const SESSION_HEADER: &str = "X-SCM-Session-ID";
/// Header carrying the XSRF token extracted from the bearer cookie.
pub const XSRF_HEADER: &str = "X-XSRF-Token";
/// Client type value sent with every request.
pub const CLIENT_ID: &str = "WUI";
/// Query parameter variants of the identification headers.
pub const CLIENT_PARAMETER: &str = "X-SCM-Client";
pub const SESSION_PARAMETER: &str = "X-SCM-Session-ID";

const BEARER_COOKIE: &str = "X-Bearer-Token";
const INIT_TOKEN_COOKIE: &str = "X-SCM-Init-Token";

/// Generate the per-session identifier: millisecond timestamp in base 36
/// plus a short pseudo-random suffix, uppercased.
pub fn generate_session_id() -> String {
  let now = chrono::Utc::now();
  let mut id = to_base36(now.timestamp_millis().unsigned_abs());
  id.push_str(&random_suffix(now.timestamp_nanos_opt().unwrap_or_default()));
  id.to_uppercase()
}

fn to_base36(mut value: u64) -> String {
  const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
  if value == 0 {
    return "0".to_string();
  }
  let mut encoded = Vec::new();
  while value > 0 {
    encoded.push(DIGITS[(value % 36) as usize]);
    value /= 36;
  }
  encoded.reverse();
  String::from_utf8_lossy(&encoded).into_owned()
}

fn random_suffix(seed: i64) -> String {
  let mut hasher = Sha256::new();
  hasher.update(seed.to_be_bytes());
  hasher.update(std::process::id().to_be_bytes());
  let digest = hasher.finalize();
  hex::encode(&digest[..3])[..5].to_string()
}

/// Extract the XSRF token from a cookie header string.
///
/// Looks for the bearer (or initial setup) token cookie and reads the
/// `xsrf` claim from its JWT payload. A missing cookie or a malformed
/// token yields `None`, never an error.
pub fn extract_xsrf_token_from_cookie(cookie_string: Option<&str>) -> Option<String> {
  let cookies = cookie_string?;
  for cookie in cookies.split(';') {
    let mut parts = cookie.trim().splitn(2, '=');
    let name = parts.next().unwrap_or_default();
    if name == BEARER_COOKIE || name == INIT_TOKEN_COOKIE {
      return extract_xsrf_token_from_jwt(parts.next().unwrap_or_default());
    }
  }
  None
}

fn extract_xsrf_token_from_jwt(jwt: &str) -> Option<String> {
  let parts: Vec<&str> = jwt.split('.').collect();
  if parts.len() != 3 {
    return None;
  }
  let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
    .decode(parts[1])
    .ok()?;
  let claims: serde_json::Value = serde_json::from_slice(&payload).ok()?;
  claims.get("xsrf")?.as_str().map(String::from)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn jwt_with_payload(payload: &str) -> String {
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload);
    format!("header.{}.signature", encoded)
  }

  #[test]
  fn test_session_id_is_uppercase_and_nonempty() {
    let id = generate_session_id();
    assert!(!id.is_empty());
    assert_eq!(id, id.to_uppercase());
  }

  #[test]
  fn test_extract_without_bearer_cookie() {
    assert_eq!(extract_xsrf_token_from_cookie(None), None);
    assert_eq!(
      extract_xsrf_token_from_cookie(Some("JSESSIONID=abc; theme=dark")),
      None
    );
  }

  #[test]
  fn test_extract_from_wellformed_token() {
    let cookie = format!("X-Bearer-Token={}", jwt_with_payload(r#"{"xsrf":"X"}"#));
    assert_eq!(
      extract_xsrf_token_from_cookie(Some(&cookie)),
      Some("X".to_string())
    );
  }

  #[test]
  fn test_extract_from_init_token_cookie() {
    let cookie = format!(
      "other=1; X-SCM-Init-Token={}",
      jwt_with_payload(r#"{"xsrf":"initial"}"#)
    );
    assert_eq!(
      extract_xsrf_token_from_cookie(Some(&cookie)),
      Some("initial".to_string())
    );
  }

  #[test]
  fn test_malformed_token_yields_none() {
    // not a three segment token
    assert_eq!(
      extract_xsrf_token_from_cookie(Some("X-Bearer-Token=justonesegment")),
      None
    );
    // three segments but garbage payload
    assert_eq!(
      extract_xsrf_token_from_cookie(Some("X-Bearer-Token=a.%%%%.c")),
      None
    );
    // valid payload without xsrf claim
    let cookie = format!("X-Bearer-Token={}", jwt_with_payload(r#"{"sub":"trillian"}"#));
    assert_eq!(extract_xsrf_token_from_cookie(Some(&cookie)), None);
  }

  #[test]
  fn test_base36_encoding() {
    assert_eq!(to_base36(0), "0");
    assert_eq!(to_base36(35), "z");
    assert_eq!(to_base36(36), "10");
  }
}
