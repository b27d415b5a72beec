//! Inventory record rows.
//!
//! Maps `inventory_records` onto [`PersistedRecord`]. Attribute filters are
//! evaluated with `attributes ->> name`, so filter values are compared in
//! their JSON text form.

use chrono::{DateTime, Utc};
use invsync_core::{OwnerFilter, PersistedRecord, RecordId, RecordQuery, TypeFilter};
use serde_json::Value as JsonValue;
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const SELECT_COLUMNS: &str =
    "SELECT id, model, record_type, owner_id, attributes, created_at, updated_at FROM inventory_records";

/// A row of `inventory_records`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InventoryRecordRow {
    pub id: Uuid,
    pub model: String,
    pub record_type: Option<String>,
    pub owner_id: Option<Uuid>,
    pub attributes: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecordRow {
    /// Convert into the shared record model.
    pub fn into_record(self) -> DbResult<PersistedRecord> {
        let JsonValue::Object(attributes) = self.attributes else {
            return Err(DbError::InvalidRow(format!(
                "attributes of {} {} is not an object",
                self.model, self.id
            )));
        };
        Ok(PersistedRecord {
            id: RecordId::from_uuid(self.id),
            model: self.model,
            record_type: self.record_type,
            owner_id: self.owner_id.map(RecordId::from_uuid),
            attributes,
        })
    }

    /// Load rows of `model` by primary id.
    pub async fn find_by_ids<'e, E>(executor: E, model: &str, ids: &[RecordId]) -> DbResult<Vec<Self>>
    where
        E: PgExecutor<'e>,
    {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query_as::<_, Self>(&format!(
            "{SELECT_COLUMNS} WHERE model = $1 AND id = ANY($2) ORDER BY id"
        ))
        .bind(model)
        .bind(&ids)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Load rows of `model` matching `query`.
    pub async fn find_where<'e, E>(executor: E, model: &str, query: &RecordQuery) -> DbResult<Vec<Self>>
    where
        E: PgExecutor<'e>,
    {
        let mut builder = QueryBuilder::<Postgres>::new(SELECT_COLUMNS);
        push_conditions(&mut builder, model, query);
        builder.push(" ORDER BY created_at, id");
        Ok(builder.build_query_as::<Self>().fetch_all(executor).await?)
    }

    /// Count rows of `model` matching `query`.
    pub async fn count_where<'e, E>(executor: E, model: &str, query: &RecordQuery) -> DbResult<i64>
    where
        E: PgExecutor<'e>,
    {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM inventory_records");
        push_conditions(&mut builder, model, query);
        let (count,) = builder
            .build_query_as::<(i64,)>()
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    /// Insert or update a record by id.
    pub async fn upsert<'e, E>(executor: E, record: &PersistedRecord) -> DbResult<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            INSERT INTO inventory_records (id, model, record_type, owner_id, attributes)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                record_type = EXCLUDED.record_type,
                owner_id = EXCLUDED.owner_id,
                attributes = EXCLUDED.attributes,
                updated_at = NOW()
            ",
        )
        .bind(record.id.as_uuid())
        .bind(&record.model)
        .bind(&record.record_type)
        .bind(record.owner_id.map(|id| *id.as_uuid()))
        .bind(JsonValue::Object(record.attributes.clone()))
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Delete rows of `model` by id.
    pub async fn delete<'e, E>(executor: E, model: &str, ids: &[RecordId]) -> DbResult<u64>
    where
        E: PgExecutor<'e>,
    {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let result = sqlx::query("DELETE FROM inventory_records WHERE model = $1 AND id = ANY($2)")
            .bind(model)
            .bind(&ids)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

fn push_conditions(builder: &mut QueryBuilder<'_, Postgres>, model: &str, query: &RecordQuery) {
    builder.push(" WHERE model = ");
    builder.push_bind(model.to_string());

    match query.owner {
        Some(OwnerFilter::Unowned) => {
            builder.push(" AND owner_id IS NULL");
        }
        Some(OwnerFilter::OwnedBy(owner)) => {
            builder.push(" AND owner_id = ");
            builder.push_bind(*owner.as_uuid());
        }
        None => {}
    }

    match &query.record_type {
        Some(TypeFilter::OneOf(types)) => {
            let named: Vec<String> = types.iter().flatten().cloned().collect();
            builder.push(" AND (record_type = ANY(");
            builder.push_bind(named);
            builder.push(") OR (");
            builder.push_bind(types.contains(&None));
            builder.push(" AND record_type IS NULL))");
        }
        Some(TypeFilter::NoneOf(types)) => {
            builder.push(" AND (record_type IS NULL OR NOT (record_type = ANY(");
            builder.push_bind(types.clone());
            builder.push(")))");
        }
        None => {}
    }

    if let Some(filter) = &query.attribute_in {
        let values: Vec<String> = filter.values.iter().filter_map(json_text).collect();
        builder.push(" AND attributes ->> ");
        builder.push_bind(filter.name.clone());
        builder.push(" = ANY(");
        builder.push_bind(values);
        builder.push(")");
    }
}

/// Text form of a JSON value as produced by the `->>` operator.
pub(crate) fn json_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(attributes: JsonValue) -> InventoryRecordRow {
        InventoryRecordRow {
            id: Uuid::new_v4(),
            model: "Host".to_string(),
            record_type: Some("VmwareHost".to_string()),
            owner_id: None,
            attributes,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_into_record_maps_columns() {
        let r = row(json!({"ems_ref": "host-42"}));
        let id = r.id;
        let record = r.into_record().unwrap();
        assert_eq!(*record.id.as_uuid(), id);
        assert_eq!(record.model, "Host");
        assert_eq!(record.record_type.as_deref(), Some("VmwareHost"));
        assert!(record.is_orphan());
        assert_eq!(record.attribute("ems_ref"), Some(&json!("host-42")));
    }

    #[test]
    fn test_into_record_rejects_non_object_attributes() {
        let err = row(json!([1, 2])).into_record().unwrap_err();
        assert!(matches!(err, DbError::InvalidRow(_)));
    }

    #[test]
    fn test_json_text_matches_arrow_operator() {
        assert_eq!(json_text(&json!("host-42")), Some("host-42".to_string()));
        assert_eq!(json_text(&json!(42)), Some("42".to_string()));
        assert_eq!(json_text(&json!(true)), Some("true".to_string()));
        assert_eq!(json_text(&JsonValue::Null), None);
    }
}
