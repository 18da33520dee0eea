// ID Provider Port (for deterministic testing)

/// ID provider interface (allows deterministic scratch names in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new process-unique identifier
    fn generate_id(&self) -> String;
}

/// UUID v4 provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}
