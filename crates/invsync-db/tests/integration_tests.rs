//! Integration tests for the PostgreSQL record store.
//!
//! These tests require a running PostgreSQL instance.
//! Run with: `cargo test -p invsync-db --features integration`

#![cfg(feature = "integration")]

mod common;

use common::TestContext;
use invsync_core::{
    ModelClass, PersistedRecord, RecordId, RecordQuery, RecordRef, RecordStore, RelationshipKind,
    TypeFilter,
};
use serde_json::json;

#[tokio::test]
async fn test_save_and_find_by_ids() {
    let ctx = TestContext::new().await;
    let model = TestContext::unique_model("Host");
    let record = PersistedRecord::new(&ModelClass::with_base("VmwareHost", &model))
        .with_attribute("ems_ref", json!("host-1"));

    ctx.store.save(&record).await.unwrap();
    let found = ctx.store.find_by_ids(&model, &[record.id]).await.unwrap();

    assert_eq!(found, vec![record]);
}

#[tokio::test]
async fn test_save_updates_existing_row() {
    let ctx = TestContext::new().await;
    let model = TestContext::unique_model("Host");
    let mut record =
        PersistedRecord::new(&ModelClass::new(&model)).with_attribute("name", json!("old"));
    ctx.store.save(&record).await.unwrap();

    record.attributes.insert("name".into(), json!("new"));
    record.owner_id = Some(RecordId::new());
    ctx.store.save(&record).await.unwrap();

    let found = ctx.store.find_by_ids(&model, &[record.id]).await.unwrap();
    assert_eq!(found[0].attribute("name"), Some(&json!("new")));
    assert_eq!(found[0].owner_id, record.owner_id);
}

#[tokio::test]
async fn test_orphan_query_with_attribute_filter() {
    let ctx = TestContext::new().await;
    let model = TestContext::unique_model("Host");
    let class = ModelClass::new(&model);
    let owner = RecordId::new();

    let orphan = PersistedRecord::new(&class).with_attribute("ems_ref", json!("host-42"));
    let owned = PersistedRecord::new(&class)
        .with_attribute("ems_ref", json!("host-42"))
        .with_owner(Some(owner));
    let other = PersistedRecord::new(&class).with_attribute("ems_ref", json!("host-7"));
    for record in [&orphan, &owned, &other] {
        ctx.store.save(record).await.unwrap();
    }

    let query = RecordQuery::unowned().with_attribute_in("ems_ref", vec![json!("host-42")]);
    let found = ctx.store.find_where(&model, &query).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, orphan.id);

    assert_eq!(
        ctx.store
            .count_where(&model, &RecordQuery::unowned())
            .await
            .unwrap(),
        2
    );
    assert_eq!(
        ctx.store
            .count_where(&model, &RecordQuery::owned_by(owner))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_record_type_filters() {
    let ctx = TestContext::new().await;
    let base = TestContext::unique_model("VmOrTemplate");
    let vm = PersistedRecord::new(&ModelClass::with_base("Vm", &base));
    let template = PersistedRecord::new(&ModelClass::with_base("MiqTemplate", &base));
    let plain = PersistedRecord::new(&ModelClass::new(&base));
    for record in [&vm, &template, &plain] {
        ctx.store.save(record).await.unwrap();
    }

    let vms = RecordQuery::unowned().with_record_type(TypeFilter::OneOf(vec![Some("Vm".into())]));
    let found = ctx.store.find_where(&base, &vms).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, vm.id);

    let with_plain = RecordQuery::all().with_record_type(TypeFilter::OneOf(vec![
        None,
        Some("Vm".into()),
    ]));
    assert_eq!(ctx.store.count_where(&base, &with_plain).await.unwrap(), 2);

    let not_templates =
        RecordQuery::all().with_record_type(TypeFilter::NoneOf(vec!["MiqTemplate".into()]));
    let mut ids: Vec<_> = ctx
        .store
        .find_where(&base, &not_templates)
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();
    ids.sort();
    let mut expected = vec![vm.id, plain.id];
    expected.sort();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_relationship_transaction_commit() {
    let ctx = TestContext::new().await;
    let folder_model = TestContext::unique_model("EmsFolder");
    let kind = RelationshipKind::ems_metadata();
    let parent = RecordRef::new(&ModelClass::new(&folder_model), RecordId::new());
    let children = vec![
        RecordRef::new(&ModelClass::new(&folder_model), RecordId::new()),
        RecordRef::new(&ModelClass::new(&folder_model), RecordId::new()),
    ];

    let mut tx = ctx.store.begin().await.unwrap();
    tx.add_children(&parent, &kind, &children).await.unwrap();
    assert_eq!(
        tx.current_parent(&children[0], &kind, &folder_model)
            .await
            .unwrap(),
        Some(parent.clone())
    );
    tx.commit().await.unwrap();

    let mut stored = ctx.store.children(&parent, &kind).await.unwrap();
    stored.sort();
    let mut expected = children.clone();
    expected.sort();
    assert_eq!(stored, expected);

    let mut tx = ctx.store.begin().await.unwrap();
    tx.remove_children(&parent, &kind, &children[..1]).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(ctx.store.children(&parent, &kind).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_relationship_transaction_rollback() {
    let ctx = TestContext::new().await;
    let folder_model = TestContext::unique_model("EmsFolder");
    let kind = RelationshipKind::ems_metadata();
    let parent = RecordRef::new(&ModelClass::new(&folder_model), RecordId::new());
    let child = RecordRef::new(&ModelClass::new(&folder_model), RecordId::new());

    let mut tx = ctx.store.begin().await.unwrap();
    tx.add_children(&parent, &kind, &[child]).await.unwrap();
    tx.rollback().await.unwrap();

    assert!(ctx.store.children(&parent, &kind).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_removes_rows_and_edges() {
    let ctx = TestContext::new().await;
    let model = TestContext::unique_model("EmsFolder");
    let class = ModelClass::new(&model);
    let kind = RelationshipKind::ems_metadata();
    let root = PersistedRecord::new(&class);
    let leaf = PersistedRecord::new(&class);
    ctx.store.save(&root).await.unwrap();
    ctx.store.save(&leaf).await.unwrap();

    let mut tx = ctx.store.begin().await.unwrap();
    tx.add_children(&root.record_ref(), &kind, &[leaf.record_ref()])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(ctx.store.delete(&model, &[leaf.id]).await.unwrap(), 1);
    assert!(ctx
        .store
        .children(&root.record_ref(), &kind)
        .await
        .unwrap()
        .is_empty());
    assert!(ctx.store.find_by_ids(&model, &[leaf.id]).await.unwrap().is_empty());
}
