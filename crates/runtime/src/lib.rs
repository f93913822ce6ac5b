pub mod generation;
pub mod store;
pub mod task;
pub mod timeline;

pub use generation::*;
pub use store::*;
pub use task::*;
pub use timeline::*;
