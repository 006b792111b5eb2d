//! Request pipeline: URL normalization, identification headers, typed
//! failure classification and server-push subscriptions.

mod client;
pub mod session;
mod subscribe;
pub mod urls;

pub use client::{ApiClient, ErrorListener, RequestListener};
pub use subscribe::{
  Message, MessageListener, OpenListener, Subscription, SubscriptionErrorListener,
  SubscriptionHandlers,
};
