pub mod error;
pub mod types;

pub use error::{Error, ParseErrorKind, Result, Step};
pub use types::{Engine, Version};
