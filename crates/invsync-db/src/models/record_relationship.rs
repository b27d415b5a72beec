//! Hierarchy edge rows.
//!
//! Edges are written in bulk with `UNNEST` so attaching or detaching any
//! number of children under one parent costs one statement.

use chrono::{DateTime, Utc};
use invsync_core::{RecordId, RecordRef, RelationshipKind};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::DbResult;

/// A row of `record_relationships`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecordRelationshipRow {
    pub id: Uuid,
    pub kind: String,
    pub parent_model: String,
    pub parent_id: Uuid,
    pub child_model: String,
    pub child_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl RecordRelationshipRow {
    #[must_use]
    pub fn parent(&self) -> RecordRef {
        RecordRef {
            model: self.parent_model.clone(),
            id: RecordId::from_uuid(self.parent_id),
        }
    }

    #[must_use]
    pub fn child(&self) -> RecordRef {
        RecordRef {
            model: self.child_model.clone(),
            id: RecordId::from_uuid(self.child_id),
        }
    }

    /// The oldest parent of `child` for `kind` stored under `parent_model`.
    pub async fn find_parent<'e, E>(
        executor: E,
        kind: &RelationshipKind,
        child: &RecordRef,
        parent_model: &str,
    ) -> DbResult<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, Self>(
            r"
            SELECT id, kind, parent_model, parent_id, child_model, child_id, created_at
            FROM record_relationships
            WHERE kind = $1 AND child_model = $2 AND child_id = $3 AND parent_model = $4
            ORDER BY created_at, id
            LIMIT 1
            ",
        )
        .bind(kind.as_str())
        .bind(&child.model)
        .bind(child.id.as_uuid())
        .bind(parent_model)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    /// Children attached under `parent` for `kind`.
    pub async fn find_children<'e, E>(
        executor: E,
        kind: &RelationshipKind,
        parent: &RecordRef,
    ) -> DbResult<Vec<Self>>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, Self>(
            r"
            SELECT id, kind, parent_model, parent_id, child_model, child_id, created_at
            FROM record_relationships
            WHERE kind = $1 AND parent_model = $2 AND parent_id = $3
            ORDER BY created_at, id
            ",
        )
        .bind(kind.as_str())
        .bind(&parent.model)
        .bind(parent.id.as_uuid())
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Attach `children` under `parent`. Existing edges are left untouched.
    pub async fn insert_children<'e, E>(
        executor: E,
        kind: &RelationshipKind,
        parent: &RecordRef,
        children: &[RecordRef],
    ) -> DbResult<u64>
    where
        E: PgExecutor<'e>,
    {
        let (models, ids) = split_refs(children);
        let result = sqlx::query(
            r"
            INSERT INTO record_relationships (kind, parent_model, parent_id, child_model, child_id)
            SELECT $1, $2, $3, c.model, c.id
            FROM UNNEST($4::varchar[], $5::uuid[]) AS c(model, id)
            ON CONFLICT ON CONSTRAINT uq_record_relationships_edge DO NOTHING
            ",
        )
        .bind(kind.as_str())
        .bind(&parent.model)
        .bind(parent.id.as_uuid())
        .bind(&models)
        .bind(&ids)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Detach `children` from `parent`.
    pub async fn delete_children<'e, E>(
        executor: E,
        kind: &RelationshipKind,
        parent: &RecordRef,
        children: &[RecordRef],
    ) -> DbResult<u64>
    where
        E: PgExecutor<'e>,
    {
        let (models, ids) = split_refs(children);
        let result = sqlx::query(
            r"
            DELETE FROM record_relationships r
            USING UNNEST($4::varchar[], $5::uuid[]) AS c(model, id)
            WHERE r.kind = $1 AND r.parent_model = $2 AND r.parent_id = $3
              AND r.child_model = c.model AND r.child_id = c.id
            ",
        )
        .bind(kind.as_str())
        .bind(&parent.model)
        .bind(parent.id.as_uuid())
        .bind(&models)
        .bind(&ids)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Drop every edge touching the given records of `model`.
    pub async fn delete_for_records<'e, E>(executor: E, model: &str, ids: &[RecordId]) -> DbResult<u64>
    where
        E: PgExecutor<'e>,
    {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let result = sqlx::query(
            r"
            DELETE FROM record_relationships
            WHERE (child_model = $1 AND child_id = ANY($2))
               OR (parent_model = $1 AND parent_id = ANY($2))
            ",
        )
        .bind(model)
        .bind(&ids)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

fn split_refs(refs: &[RecordRef]) -> (Vec<String>, Vec<Uuid>) {
    refs.iter()
        .map(|r| (r.model.clone(), *r.id.as_uuid()))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_refs() {
        let row = RecordRelationshipRow {
            id: Uuid::new_v4(),
            kind: RelationshipKind::EMS_METADATA.to_string(),
            parent_model: "EmsFolder".to_string(),
            parent_id: Uuid::new_v4(),
            child_model: "EmsCluster".to_string(),
            child_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        assert_eq!(row.parent().model, "EmsFolder");
        assert_eq!(*row.child().id.as_uuid(), row.child_id);
    }

    #[test]
    fn test_split_refs_preserves_order() {
        let a = RecordRef {
            model: "Host".to_string(),
            id: RecordId::new(),
        };
        let b = RecordRef {
            model: "Vm".to_string(),
            id: RecordId::new(),
        };
        let (models, ids) = split_refs(&[a.clone(), b.clone()]);
        assert_eq!(models, vec!["Host", "Vm"]);
        assert_eq!(ids, vec![*a.id.as_uuid(), *b.id.as_uuid()]);
    }
}
