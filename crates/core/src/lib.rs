pub mod application;
pub mod artifact;
pub mod compactor;
pub mod domain;
pub mod error;
pub mod ports;
pub mod session;
pub mod utils;

pub use error::{Error, LoadError, ModelError};
