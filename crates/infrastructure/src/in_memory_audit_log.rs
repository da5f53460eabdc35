use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keystone_application::{
    AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository,
};
use keystone_core::{AppResult, TenantId};
use tokio::sync::RwLock;
use uuid::Uuid;

const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone)]
struct StoredEvent {
    event_id: Uuid,
    tenant_id: TenantId,
    created_at: DateTime<Utc>,
    event: AuditEvent,
}

/// Process-local append-only audit log.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    events: RwLock<Vec<StoredEvent>>,
}

impl InMemoryAuditLog {
    /// Creates an empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditLog {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.write().await.push(StoredEvent {
            event_id: Uuid::new_v4(),
            tenant_id: event.tenant_id,
            created_at: Utc::now(),
            event,
        });
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLog {
    async fn list_recent_entries(
        &self,
        tenant_id: TenantId,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        let events = self.events.read().await;

        Ok(events
            .iter()
            .rev()
            .filter(|stored| stored.tenant_id == tenant_id)
            .filter(|stored| {
                query
                    .action
                    .as_deref()
                    .is_none_or(|action| stored.event.action.as_str() == action)
            })
            .filter(|stored| {
                query
                    .actor_id
                    .is_none_or(|actor_id| stored.event.actor_id == actor_id)
            })
            .skip(query.offset)
            .take(limit)
            .map(|stored| AuditLogEntry {
                event_id: stored.event_id,
                actor_id: stored.event.actor_id,
                action: stored.event.action.as_str().to_owned(),
                resource_type: stored.event.resource_type.clone(),
                resource_id: stored.event.resource_id.clone(),
                detail: stored.event.detail.clone(),
                created_at: stored.created_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use keystone_application::{AuditEvent, AuditLogQuery, AuditLogRepository, AuditRepository};
    use keystone_core::{PrincipalId, TenantId};
    use keystone_domain::AuditAction;

    use super::InMemoryAuditLog;

    fn event(tenant_id: TenantId, actor_id: PrincipalId, action: AuditAction) -> AuditEvent {
        AuditEvent {
            tenant_id,
            actor_id,
            action,
            resource_type: "role".to_owned(),
            resource_id: "mechanic".to_owned(),
            detail: None,
        }
    }

    #[tokio::test]
    async fn entries_are_tenant_scoped_newest_first_and_filterable() {
        let log = InMemoryAuditLog::new();
        let tenant_id = TenantId::new();
        let actor_id = PrincipalId::new();
        let other_actor = PrincipalId::new();

        for appended in [
            event(tenant_id, actor_id, AuditAction::RoleCreated),
            event(tenant_id, other_actor, AuditAction::RoleAssigned),
            event(TenantId::new(), actor_id, AuditAction::RoleCreated),
        ] {
            assert!(log.append_event(appended).await.is_ok());
        }

        let Ok(all) = log
            .list_recent_entries(tenant_id, AuditLogQuery::default())
            .await
        else {
            panic!("listing should succeed");
        };
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].action, AuditAction::RoleAssigned.as_str());

        let Ok(by_actor) = log
            .list_recent_entries(
                tenant_id,
                AuditLogQuery {
                    actor_id: Some(actor_id),
                    ..AuditLogQuery::default()
                },
            )
            .await
        else {
            panic!("filtered listing should succeed");
        };
        assert_eq!(by_actor.len(), 1);
        assert_eq!(by_actor[0].actor_id, actor_id);

        let Ok(by_action) = log
            .list_recent_entries(
                tenant_id,
                AuditLogQuery {
                    action: Some(AuditAction::RoleCreated.as_str().to_owned()),
                    ..AuditLogQuery::default()
                },
            )
            .await
        else {
            panic!("filtered listing should succeed");
        };
        assert_eq!(by_action.len(), 1);
    }
}
