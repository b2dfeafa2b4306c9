pub mod booking;
pub mod broker;
pub mod config;
pub mod config_parser;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod kafka;
pub mod metrics;
pub mod shutdown;
pub mod store;
pub mod transport;

pub use booking::*;
pub use broker::*;
pub use config::*;
pub use config_parser::*;
pub use dispatcher::*;
pub use domain::*;
pub use error::*;
pub use kafka::*;
pub use metrics::*;
pub use shutdown::*;
pub use store::*;
pub use transport::*;
