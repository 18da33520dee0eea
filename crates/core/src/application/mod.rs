// Application Layer - Backend selection and shared limits

pub mod constants;
pub mod registry;

// Re-exports
pub use registry::{BackendRegistry, BackendRegistryBuilder};
