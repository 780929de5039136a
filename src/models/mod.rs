//! SeaORM entity models.

pub mod audit_entry;
pub mod user_settings;
