//! Row models for inventory tables.

pub mod inventory_record;
pub mod record_relationship;

pub use inventory_record::InventoryRecordRow;
pub use record_relationship::RecordRelationshipRow;
