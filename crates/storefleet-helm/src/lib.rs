pub mod error;
pub mod helm;
pub mod woocommerce;

pub use error::*;
pub use helm::*;
pub use woocommerce::*;
