pub mod concert;
pub mod messages;
pub mod outcome;
pub mod registration;
pub mod schemas;

pub use concert::*;
pub use messages::*;
pub use outcome::*;
pub use registration::*;
pub use schemas::*;
