//! Repository layer encapsulating SeaORM operations.

pub mod audit;
pub mod settings;

pub use audit::AuditRepository;
pub use settings::SettingsRepository;
