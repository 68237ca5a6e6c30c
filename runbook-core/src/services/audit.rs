/// Read access to the audit log
///
/// Entries are only ever written inside the transaction of the operation
/// they describe; this service has no append.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::audit_log::{AuditLogEntry, ResourceType};

/// Largest page `recent` returns
pub const MAX_RECENT: i64 = 1000;

#[derive(Debug, Clone)]
pub struct AuditTrail {
    pool: SqlitePool,
}

impl AuditTrail {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Newest entries first; `limit` is clamped to `1..=1000`
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditLogEntry>> {
        Ok(AuditLogEntry::recent(&self.pool, clamp_limit(limit)).await?)
    }

    /// History of one resource, oldest first
    pub async fn for_resource(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>> {
        Ok(AuditLogEntry::for_resource(&self.pool, resource_type, resource_id).await?)
    }

    pub async fn by_actor(&self, actor_id: Uuid) -> Result<Vec<AuditLogEntry>> {
        Ok(AuditLogEntry::by_actor(&self.pool, actor_id).await?)
    }

    pub async fn count(&self) -> Result<i64> {
        Ok(AuditLogEntry::count(&self.pool).await?)
    }
}

fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_RECENT)
}
