// revget Core - Domain Types, Error Taxonomy & Ports
// NO infrastructure dependencies (Hexagonal Architecture)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{Result, RetrievalError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
