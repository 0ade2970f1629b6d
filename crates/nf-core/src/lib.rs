pub mod collector;
pub mod config;
pub mod error;
pub mod model;
pub mod query;

pub use collector::*;
pub use config::*;
pub use error::*;
pub use model::*;
pub use query::*;
