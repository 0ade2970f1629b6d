pub mod plugin;
pub mod prom;
pub mod report;

pub use plugin::*;
pub use prom::*;
pub use report::*;
