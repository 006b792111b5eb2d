//! HTTP request pipeline shared by every resource module.
//!
//! One [`ApiClient`] is constructed per application session and passed to
//! all consumers; it is cheap to clone. The pipeline normalizes paths,
//! attaches the identification headers, executes the call and classifies
//! failures into [`ApiError`] values. Errors pass through the registered
//! error listeners exactly once before they are returned.

use std::sync::{Arc, Mutex, RwLock};

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE};
use reqwest::multipart::Form;
use reqwest::{Method, Response};
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{fail_on_error, ApiError};
use crate::http::session::{
  extract_xsrf_token_from_cookie, generate_session_id, CLIENT_HEADER, CLIENT_ID, SESSION_HEADER,
  XSRF_HEADER,
};
use crate::http::urls;

/// Listener invoked before a request is issued.
pub type RequestListener = Box<dyn Fn(&str, &Method) + Send + Sync>;
/// Listener invoked once for every error raised by the pipeline.
pub type ErrorListener = Box<dyn Fn(&ApiError) + Send + Sync>;

enum Body {
  Empty,
  Json(String),
  Text(String),
  Multipart(Form),
}

/// Client for the SCM-Manager REST API.
#[derive(Clone)]
pub struct ApiClient {
  inner: Arc<ClientInner>,
}

struct ClientInner {
  http: reqwest::Client,
  base_url: String,
  session_id: String,
  cookies: RwLock<Option<String>>,
  request_listeners: Mutex<Vec<RequestListener>>,
  error_listeners: Mutex<Vec<ErrorListener>>,
}

impl ApiClient {
  /// Create a client for the server at `base_url` (the context path,
  /// without the API root segment).
  pub fn new(base_url: &str) -> Result<Self, ApiError> {
    let http = reqwest::Client::builder()
      .build()
      .map_err(ApiError::from)?;

    Ok(Self {
      inner: Arc::new(ClientInner {
        http,
        base_url: base_url.trim_end_matches('/').to_string(),
        session_id: generate_session_id(),
        cookies: RwLock::new(None),
        request_listeners: Mutex::new(Vec::new()),
        error_listeners: Mutex::new(Vec::new()),
      }),
    })
  }

  /// Create a client from a loaded [`Config`], picking up the session
  /// cookie from the environment when present.
  pub fn from_config(config: &Config) -> Result<Self, ApiError> {
    let client = Self::new(&config.server.url)?;
    if let Ok(cookie) = Config::get_session_cookie() {
      client.set_cookies(Some(cookie));
    }
    Ok(client)
  }

  pub fn base_url(&self) -> &str {
    &self.inner.base_url
  }

  /// Identifier generated once for this client instance.
  pub fn session_id(&self) -> &str {
    &self.inner.session_id
  }

  /// Replace the cookie header sent with every request. The XSRF token is
  /// re-derived from it on each call.
  pub fn set_cookies(&self, cookies: Option<String>) {
    let mut guard = self
      .inner
      .cookies
      .write()
      .unwrap_or_else(std::sync::PoisonError::into_inner);
    *guard = cookies;
  }

  /// Register a listener notified before each request is issued.
  pub fn on_request(&self, listener: RequestListener) {
    self
      .inner
      .request_listeners
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
      .push(listener);
  }

  /// Register a listener notified once per raised error.
  pub fn on_error(&self, listener: ErrorListener) {
    self
      .inner
      .error_listeners
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
      .push(listener);
  }

  pub async fn get(&self, url: &str) -> Result<Response, ApiError> {
    self.execute(Method::GET, url, Body::Empty, None, &[]).await
  }

  pub async fn head(&self, url: &str) -> Result<Response, ApiError> {
    self.execute(Method::HEAD, url, Body::Empty, None, &[]).await
  }

  pub async fn delete(&self, url: &str) -> Result<Response, ApiError> {
    self
      .execute(Method::DELETE, url, Body::Empty, None, &[])
      .await
  }

  /// POST without a payload (trigger-style mutations like archive).
  pub async fn post(&self, url: &str) -> Result<Response, ApiError> {
    self
      .execute(Method::POST, url, Body::Empty, Some("application/json"), &[])
      .await
  }

  pub async fn post_json<T: Serialize + ?Sized>(
    &self,
    url: &str,
    payload: &T,
    content_type: &str,
    extra_headers: &[(&str, &str)],
  ) -> Result<Response, ApiError> {
    let body = serde_json::to_string(payload)?;
    self
      .execute(
        Method::POST,
        url,
        Body::Json(body),
        Some(content_type),
        extra_headers,
      )
      .await
  }

  pub async fn put_json<T: Serialize + ?Sized>(
    &self,
    url: &str,
    payload: &T,
    content_type: &str,
    extra_headers: &[(&str, &str)],
  ) -> Result<Response, ApiError> {
    let body = serde_json::to_string(payload)?;
    self
      .execute(
        Method::PUT,
        url,
        Body::Json(body),
        Some(content_type),
        extra_headers,
      )
      .await
  }

  pub async fn post_text(
    &self,
    url: &str,
    payload: &str,
    extra_headers: &[(&str, &str)],
  ) -> Result<Response, ApiError> {
    self
      .execute(
        Method::POST,
        url,
        Body::Text(payload.to_string()),
        Some("text/plain"),
        extra_headers,
      )
      .await
  }

  pub async fn put_text(
    &self,
    url: &str,
    payload: &str,
    extra_headers: &[(&str, &str)],
  ) -> Result<Response, ApiError> {
    self
      .execute(
        Method::PUT,
        url,
        Body::Text(payload.to_string()),
        Some("text/plain"),
        extra_headers,
      )
      .await
  }

  /// POST a multipart form; the appender callback attaches the parts.
  pub async fn post_binary(
    &self,
    url: &str,
    appender: impl FnOnce(Form) -> Form,
    extra_headers: &[(&str, &str)],
  ) -> Result<Response, ApiError> {
    let form = appender(Form::new());
    self
      .execute(Method::POST, url, Body::Multipart(form), None, extra_headers)
      .await
  }

  /// PUT a multipart form; the appender callback attaches the parts.
  pub async fn put_binary(
    &self,
    url: &str,
    appender: impl FnOnce(Form) -> Form,
    extra_headers: &[(&str, &str)],
  ) -> Result<Response, ApiError> {
    let form = appender(Form::new());
    self
      .execute(Method::PUT, url, Body::Multipart(form), None, extra_headers)
      .await
  }

  pub(super) fn http(&self) -> reqwest::Client {
    self.inner.http.clone()
  }

  async fn execute(
    &self,
    method: Method,
    url: &str,
    body: Body,
    content_type: Option<&str>,
    extra_headers: &[(&str, &str)],
  ) -> Result<Response, ApiError> {
    match self
      .try_execute(method, url, body, content_type, extra_headers)
      .await
    {
      Ok(response) => Ok(response),
      Err(error) => {
        self.notify_error_listeners(&error);
        Err(error)
      }
    }
  }

  async fn try_execute(
    &self,
    method: Method,
    url: &str,
    body: Body,
    content_type: Option<&str>,
    extra_headers: &[(&str, &str)],
  ) -> Result<Response, ApiError> {
    let full_url = urls::create_url(&self.inner.base_url, url);
    self.notify_request_listeners(&full_url, &method);
    debug!(method = %method, url = %full_url, "issuing request");

    let mut request = self
      .inner
      .http
      .request(method, &full_url)
      .headers(self.request_headers());

    for (name, value) in extra_headers {
      request = request.header(*name, *value);
    }
    if let Some(content_type) = content_type {
      request = request.header(CONTENT_TYPE, content_type);
    }
    request = match body {
      Body::Empty => request,
      Body::Json(payload) => request.body(payload),
      Body::Text(payload) => request.body(payload),
      Body::Multipart(form) => request.multipart(form),
    };

    let response = request.send().await.map_err(ApiError::from)?;
    fail_on_error(response).await
  }

  /// Headers attached to every request: cache disable, client identity,
  /// session id, and cookie plus XSRF token when a session cookie is set.
  pub(super) fn request_headers(&self) -> HeaderMap {
    let mut headers = HeaderMap::new();
    // disable caching for now
    headers.insert("Cache", HeaderValue::from_static("no-cache"));
    // identify the request as ajax request
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
    headers.insert(CLIENT_HEADER, HeaderValue::from_static(CLIENT_ID));
    if let Ok(session) = HeaderValue::from_str(&self.inner.session_id) {
      headers.insert(SESSION_HEADER, session);
    }

    let cookies = self
      .inner
      .cookies
      .read()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
      .clone();
    if let Some(cookies) = cookies {
      if let Ok(value) = HeaderValue::from_str(&cookies) {
        headers.insert(COOKIE, value);
      }
      if let Some(xsrf) = extract_xsrf_token_from_cookie(Some(&cookies)) {
        if let Ok(value) = HeaderValue::from_str(&xsrf) {
          headers.insert(XSRF_HEADER, value);
        }
      }
    }

    headers
  }

  fn notify_request_listeners(&self, url: &str, method: &Method) {
    let listeners = self
      .inner
      .request_listeners
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner);
    for listener in listeners.iter() {
      listener(url, method);
    }
  }

  fn notify_error_listeners(&self, error: &ApiError) {
    let listeners = self
      .inner
      .error_listeners
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner);
    for listener in listeners.iter() {
      listener(error);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ERROR_CONTENT_TYPE;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use wiremock::matchers::{header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn bearer_cookie() -> String {
    use base64::Engine;
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(r#"{"xsrf":"marvin"}"#);
    format!("X-Bearer-Token=header.{}.signature", payload)
  }

  #[tokio::test]
  async fn test_identification_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v2/me"))
      .and(header("Cache", "no-cache"))
      .and(header("X-SCM-Client", "WUI"))
      .and(header("X-Requested-With", "XMLHttpRequest"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
      .expect(1)
      .mount(&server)
      .await;

    let client = ApiClient::new(&server.uri()).unwrap();
    let response = client.get("/me").await.unwrap();
    assert!(response.status().is_success());
  }

  #[tokio::test]
  async fn test_xsrf_header_derived_from_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v2/me"))
      .and(header("X-XSRF-Token", "marvin"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
      .expect(1)
      .mount(&server)
      .await;

    let client = ApiClient::new(&server.uri()).unwrap();
    client.set_cookies(Some(bearer_cookie()));
    client.get("/me").await.unwrap();
  }

  #[tokio::test]
  async fn test_error_listeners_notified_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v2/missing"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    let client = ApiClient::new(&server.uri()).unwrap();
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    client.on_error(Box::new(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
    }));

    let error = client.get("/missing").await.unwrap_err();
    assert_eq!(error, ApiError::Generic { status: 500 });
    assert_eq!(notified.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_backend_error_body_is_classified() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
      "transactionId": "4pR7X2NEB1",
      "errorCode": "2wR7UzV0w1",
      "message": "repository not found",
      "context": [],
      "violations": []
    });
    Mock::given(method("GET"))
      .and(path("/api/v2/repositories/spaceships/lost"))
      .respond_with(
        ResponseTemplate::new(404)
          .set_body_raw(serde_json::to_vec(&body).unwrap(), ERROR_CONTENT_TYPE),
      )
      .mount(&server)
      .await;

    let client = ApiClient::new(&server.uri()).unwrap();
    let error = client
      .get("/repositories/spaceships/lost")
      .await
      .unwrap_err();
    match error {
      ApiError::NotFound(content) => {
        assert_eq!(content.message, "repository not found");
        assert_eq!(content.status, 404);
      }
      other => panic!("expected not found, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_post_binary_builds_multipart_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/v2/repositories/import"))
      .respond_with(ResponseTemplate::new(200))
      .expect(1)
      .mount(&server)
      .await;

    let client = ApiClient::new(&server.uri()).unwrap();
    client
      .post_binary(
        "/repositories/import",
        |form| form.text("bundle", "not really a bundle"),
        &[],
      )
      .await
      .unwrap();

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
      .headers
      .get("Content-Type")
      .and_then(|value| value.to_str().ok())
      .unwrap_or_default();
    assert!(content_type.starts_with("multipart/form-data"));
  }

  #[tokio::test]
  async fn test_request_listener_sees_full_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
      .mount(&server)
      .await;

    let client = ApiClient::new(&server.uri()).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let urls = Arc::clone(&seen);
    client.on_request(Box::new(move |url, _| {
      urls.lock().unwrap().push(url.to_string());
    }));

    client.get("/users").await.unwrap();
    let recorded = seen.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].ends_with("/api/v2/users"));
  }
}
