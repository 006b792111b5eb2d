//! Server-push subscriptions over server-sent events.
//!
//! A subscription is a long-lived one-way channel keyed by URL. Named
//! events are dispatched to registered listeners; the returned handle
//! closes the channel, and closing twice is safe.

use std::collections::HashMap;
use std::sync::Mutex;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{fail_on_error, ApiError};
use crate::http::client::ApiClient;
use crate::http::urls;

/// One server-push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
  /// Event name; `message` when the server did not name the event.
  pub event: String,
  pub data: String,
  pub last_event_id: Option<String>,
}

pub type MessageListener = Box<dyn Fn(Message) + Send>;
pub type OpenListener = Box<dyn Fn() + Send>;
pub type SubscriptionErrorListener = Box<dyn Fn(ApiError) + Send>;

/// Listener registration for [`ApiClient::subscribe`].
///
/// Either a plain map of event name to listener, or the structured form
/// with open and error callbacks on top. A bare `HashMap` converts into
/// the structured form, so both shapes are accepted interchangeably.
#[derive(Default)]
pub struct SubscriptionHandlers {
  pub on_message: HashMap<String, MessageListener>,
  pub on_open: Option<OpenListener>,
  pub on_error: Option<SubscriptionErrorListener>,
}

impl SubscriptionHandlers {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn on_message(mut self, event: impl Into<String>, listener: MessageListener) -> Self {
    self.on_message.insert(event.into(), listener);
    self
  }

  pub fn on_open(mut self, listener: OpenListener) -> Self {
    self.on_open = Some(listener);
    self
  }

  pub fn on_error(mut self, listener: SubscriptionErrorListener) -> Self {
    self.on_error = Some(listener);
    self
  }
}

impl From<HashMap<String, MessageListener>> for SubscriptionHandlers {
  fn from(on_message: HashMap<String, MessageListener>) -> Self {
    Self {
      on_message,
      on_open: None,
      on_error: None,
    }
  }
}

/// Handle for an open subscription.
pub struct Subscription {
  task: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
  /// Close the channel. Idempotent; later calls are no-ops.
  pub fn cancel(&self) {
    let mut guard = self
      .task
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(task) = guard.take() {
      task.abort();
    }
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.cancel();
  }
}

impl ApiClient {
  /// Open a server-sent-events channel to `url`, carrying the client type
  /// and session id as query parameters. Returns a handle whose
  /// [`Subscription::cancel`] closes the channel.
  pub fn subscribe(&self, url: &str, handlers: impl Into<SubscriptionHandlers>) -> Subscription {
    let handlers = handlers.into();
    let full_url = urls::create_url_with_identifiers(self.base_url(), url, self.session_id());
    let headers = self.request_headers();
    let http = self.http();

    let task = tokio::spawn(async move {
      let request = http
        .get(&full_url)
        .headers(headers)
        .header(reqwest::header::ACCEPT, "text/event-stream");

      let response = match request.send().await {
        Ok(response) => response,
        Err(error) => {
          notify_error(&handlers, ApiError::from(error));
          return;
        }
      };
      let response = match fail_on_error(response).await {
        Ok(response) => response,
        Err(error) => {
          notify_error(&handlers, error);
          return;
        }
      };

      if let Some(on_open) = &handlers.on_open {
        on_open();
      }

      let mut stream = response.bytes_stream();
      let mut parser = EventParser::default();
      while let Some(chunk) = stream.next().await {
        match chunk {
          Ok(bytes) => {
            for message in parser.push(&bytes) {
              if let Some(listener) = handlers.on_message.get(&message.event) {
                listener(message);
              } else {
                debug!(event = %message.event, "no listener for subscription event");
              }
            }
          }
          Err(error) => {
            notify_error(&handlers, ApiError::from(error));
            break;
          }
        }
      }
    });

    Subscription {
      task: Mutex::new(Some(task)),
    }
  }
}

fn notify_error(handlers: &SubscriptionHandlers, error: ApiError) {
  if let Some(on_error) = &handlers.on_error {
    on_error(error);
  }
}

/// Incremental parser for the SSE wire format.
#[derive(Default)]
struct EventParser {
  buffer: String,
  event: Option<String>,
  data: Vec<String>,
  last_event_id: Option<String>,
}

impl EventParser {
  fn push(&mut self, chunk: &[u8]) -> Vec<Message> {
    self.buffer.push_str(&String::from_utf8_lossy(chunk));

    let mut messages = Vec::new();
    while let Some(position) = self.buffer.find('\n') {
      let line = self.buffer[..position].trim_end_matches('\r').to_string();
      self.buffer.drain(..=position);
      if let Some(message) = self.process_line(&line) {
        messages.push(message);
      }
    }
    messages
  }

  fn process_line(&mut self, line: &str) -> Option<Message> {
    if line.is_empty() {
      return self.dispatch();
    }
    if line.starts_with(':') {
      return None;
    }

    let (field, value) = match line.split_once(':') {
      Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
      None => (line, ""),
    };
    match field {
      "event" => self.event = Some(value.to_string()),
      "data" => self.data.push(value.to_string()),
      "id" => self.last_event_id = Some(value.to_string()),
      _ => {}
    }
    None
  }

  fn dispatch(&mut self) -> Option<Message> {
    if self.data.is_empty() {
      self.event = None;
      return None;
    }
    Some(Message {
      event: self.event.take().unwrap_or_else(|| "message".to_string()),
      data: std::mem::take(&mut self.data).join("\n"),
      last_event_id: self.last_event_id.clone(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::time::Duration;
  use tokio::sync::mpsc;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[test]
  fn test_parser_named_and_default_events() {
    let mut parser = EventParser::default();
    let raw = "event: created\ndata: {\"id\":1}\n\ndata: plain\n\n";
    let messages = parser.push(raw.as_bytes());

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].event, "created");
    assert_eq!(messages[0].data, "{\"id\":1}");
    assert_eq!(messages[1].event, "message");
    assert_eq!(messages[1].data, "plain");
  }

  #[test]
  fn test_parser_handles_split_chunks_and_comments() {
    let mut parser = EventParser::default();
    assert!(parser.push(b": keep-alive\nevent: upd").is_empty());
    assert!(parser.push(b"ated\ndata: 1\ndata: 2\n").is_empty());
    let messages = parser.push(b"\n");

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].event, "updated");
    assert_eq!(messages[0].data, "1\n2");
  }

  #[test]
  fn test_parser_tracks_last_event_id() {
    let mut parser = EventParser::default();
    let messages = parser.push(b"id: 42\ndata: x\n\ndata: y\n\n");
    assert_eq!(messages[0].last_event_id.as_deref(), Some("42"));
    // the id is sticky until the server sends a new one
    assert_eq!(messages[1].last_event_id.as_deref(), Some("42"));
  }

  #[tokio::test]
  async fn test_subscribe_dispatches_named_events() {
    let server = MockServer::start().await;
    let body = "event: notification\ndata: first\n\nevent: notification\ndata: second\n\n";
    Mock::given(method("GET"))
      .and(path("/api/v2/notifications"))
      .and(query_param("X-SCM-Client", "WUI"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_raw(body, "text/event-stream"),
      )
      .mount(&server)
      .await;

    let client = ApiClient::new(&server.uri()).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let opened = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let opened_flag = Arc::clone(&opened);

    let handlers = SubscriptionHandlers::new()
      .on_open(Box::new(move || {
        opened_flag.store(true, std::sync::atomic::Ordering::SeqCst);
      }))
      .on_message(
        "notification",
        Box::new(move |message| {
          let _ = tx.send(message.data);
        }),
      );

    let subscription = client.subscribe("/notifications", handlers);

    let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
      .await
      .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
      .await
      .unwrap();
    assert_eq!(first.as_deref(), Some("first"));
    assert_eq!(second.as_deref(), Some("second"));
    assert!(opened.load(std::sync::atomic::Ordering::SeqCst));

    subscription.cancel();
    // cancel must be idempotent
    subscription.cancel();
  }

  #[tokio::test]
  async fn test_subscribe_accepts_plain_listener_map() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_raw("data: ping\n\n", "text/event-stream"))
      .mount(&server)
      .await;

    let client = ApiClient::new(&server.uri()).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut listeners: HashMap<String, MessageListener> = HashMap::new();
    listeners.insert(
      "message".to_string(),
      Box::new(move |message| {
        let _ = tx.send(message.data);
      }),
    );

    let _subscription = client.subscribe("/events", listeners);
    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
      .await
      .unwrap();
    assert_eq!(received.as_deref(), Some("ping"));
  }
}
