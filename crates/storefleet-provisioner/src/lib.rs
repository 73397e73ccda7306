pub mod engine;
pub mod error;
pub mod ops;
pub mod registry;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use engine::*;
pub use error::*;
pub use ops::*;
pub use registry::*;
pub use store::*;
