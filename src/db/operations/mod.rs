pub mod activity_log;
pub mod catalog;
pub mod plans;
pub mod progress;

pub use activity_log::*;
pub use catalog::*;
pub use plans::*;
pub use progress::*;
