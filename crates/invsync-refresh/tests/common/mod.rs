//! Shared fixtures for invsync-refresh integration tests.
//!
//! Tests run against `MemoryStore`, whose operation counters make write
//! amplification observable.

#![allow(dead_code)]

use std::sync::Once;

use invsync_core::{MemoryStore, ModelClass, PersistedRecord, RecordId, RecordRef};
use invsync_refresh::{AttributeValue, InventoryObject, LazyRef};
use serde_json::{json, Value as JsonValue};

static INIT: Once = Once::new();

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub fn ems() -> PersistedRecord {
    PersistedRecord::new(&ModelClass::new("ExtManagementSystem"))
        .with_attribute("name", json!("vc-1"))
}

pub fn host_class() -> ModelClass {
    ModelClass::new("Host")
}

pub fn folder_class() -> ModelClass {
    ModelClass::new("EmsFolder")
}

/// Incoming host with a name derived from its reference.
pub fn host(ems_ref: &str) -> InventoryObject {
    InventoryObject::new()
        .with("ems_ref", ems_ref)
        .with("name", AttributeValue::Value(json!(format!("esx-{ems_ref}"))))
        .with("type", "VmwareHost")
}

pub fn host_under(ems_ref: &str, folder_uid: &str) -> InventoryObject {
    host(ems_ref).with("parent", LazyRef::to("ems_folders", folder_uid))
}

pub fn folder(uid: &str, parent: Option<&str>) -> InventoryObject {
    let object = InventoryObject::new()
        .with("uid_ems", uid)
        .with("name", AttributeValue::Value(json!(format!("folder {uid}"))));
    match parent {
        Some(parent) => object.with("parent", LazyRef::to("ems_folders", parent)),
        None => object,
    }
}

/// Persisted record with the given owner and attributes.
pub fn record(
    model: &ModelClass,
    owner: Option<RecordId>,
    attributes: &[(&str, JsonValue)],
) -> PersistedRecord {
    attributes
        .iter()
        .fold(PersistedRecord::new(model).with_owner(owner), |record, (name, value)| {
            record.with_attribute(*name, value.clone())
        })
}

/// Seed a persisted record and return it.
pub async fn seed(
    store: &MemoryStore,
    model: &ModelClass,
    owner: Option<RecordId>,
    attributes: &[(&str, JsonValue)],
) -> PersistedRecord {
    let record = record(model, owner, attributes);
    store.insert(record.clone()).await;
    record
}

pub fn reference(record: &PersistedRecord) -> RecordRef {
    record.record_ref()
}
