//! Map-side state: the immutable view state, the overlay synchronizer, the
//! search presenter and the session that ties them to the aggregator.

pub mod headless;
pub mod overlay;
pub mod popup;
pub mod search;
pub mod session;
pub mod state;
pub mod surface;
pub mod symbology;

pub use headless::*;
pub use overlay::*;
pub use search::*;
pub use session::*;
pub use state::*;
pub use surface::*;
pub use symbology::*;
