//! Asynchronous client for SCM-Manager compatible servers.
//!
//! The crate is organized around four pieces:
//! - [`http`]: the request pipeline shared by every resource (URL
//!   normalization, identification headers, typed failure classification)
//!   plus server-push subscriptions
//! - [`cache`]: a key-addressed store of resource snapshots with
//!   stale-while-revalidate access and per-mutation invalidation rules
//! - [`fetch`]: cursor-driven paging and polling of resources the server
//!   is still computing
//! - [`scm`]: typed resource modules behind the [`ScmClient`] facade
//!
//! ```no_run
//! use scm_client::ScmClient;
//!
//! # async fn run() -> Result<(), scm_client::ApiError> {
//! let client = ScmClient::new("https://scm.hitchhiker.com/scm")?;
//! let repositories = client.repositories().list(&Default::default()).await?;
//! for repository in repositories.embedded.repositories {
//!   println!("{}/{}", repository.namespace, repository.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod scm;

pub use cache::{CacheEntry, CacheKey, EntryState, MutationEffects, ResourceCache};
pub use config::{Config, ConfigError};
pub use error::{ApiError, BackendError};
pub use http::{ApiClient, Subscription, SubscriptionHandlers};
pub use scm::ScmClient;
