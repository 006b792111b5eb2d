//! Incremental fetching of large or server-computed resources.
//!
//! Two concerns share one page-cursor protocol: merging explicit page
//! advances into a single logical value, and polling resources whose
//! leaves the server is still computing.

mod pager;
mod poller;

pub use pager::{PagedRepresentation, Pager};
pub use poller::{Partiality, PollState, Poller};
