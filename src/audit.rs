use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Append an entry to the audit trail.
pub async fn log_audit(
    pool: &DbPool,
    actor_id: Option<Uuid>,
    action: &str,
    resource: &str,
    resource_id: Option<Uuid>,
    metadata: Option<Value>,
) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, actor_id, action, resource, resource_id, metadata)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(actor_id)
    .bind(action)
    .bind(resource)
    .bind(resource_id)
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}

/// Audit without failing the caller; the business write already committed.
pub async fn record(
    pool: &DbPool,
    actor_id: Option<Uuid>,
    action: &str,
    resource: &str,
    resource_id: Option<Uuid>,
    metadata: Option<Value>,
) {
    if let Err(err) = log_audit(pool, actor_id, action, resource, resource_id, metadata).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
