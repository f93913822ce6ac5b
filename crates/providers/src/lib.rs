//! Fetch clients for layer sources.
//!
//! - [`series`]: generic time-series provider (cached per `entity:variable`)
//! - [`regional`]: regional statistics routed through the local proxy
//!
//! Both clients sit behind object-safe traits so the aggregator can be driven
//! by in-memory providers in tests.

pub mod cache;
pub mod error;
pub mod protocol;
pub mod regional;
pub mod series;

use std::future::Future;
use std::pin::Pin;

pub use cache::*;
pub use error::*;
pub use protocol::*;
pub use regional::*;
pub use series::*;

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
