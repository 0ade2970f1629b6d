pub mod client;
pub mod parse;

pub use client::*;
pub use parse::*;
