pub mod dib;
pub mod error;
pub mod winres;

pub use error::{Error, Result};
