pub mod client;
pub mod error;
pub mod labels;
pub mod objects;

pub use client::*;
pub use error::*;
pub use labels::*;
pub use objects::*;
