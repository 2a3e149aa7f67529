use ahash::AHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::{
    event::{Event, OperationType, ResourceType},
    handler::{Handler, HandlerError},
};

/// Counts events by resource type and operation. Events themselves are not kept.
#[derive(Default)]
pub struct EventCounter {
    total: AtomicU64,
    counts: RwLock<AHashMap<(ResourceType, OperationType), u64>>,
}

impl EventCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Per resource type totals, largest first.
    pub async fn by_resource_type(&self) -> Vec<(ResourceType, u64)> {
        let counts = self.counts.read().await;
        let mut totals: AHashMap<&ResourceType, u64> = AHashMap::new();
        for ((resource_type, _), count) in counts.iter() {
            *totals.entry(resource_type).or_default() += count;
        }
        let mut totals: Vec<(ResourceType, u64)> = totals
            .into_iter()
            .map(|(resource_type, count)| (resource_type.clone(), count))
            .collect();
        totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        totals
    }

    pub async fn count(&self, resource_type: &ResourceType, operation_type: &OperationType) -> u64 {
        self.counts
            .read()
            .await
            .get(&(resource_type.clone(), operation_type.clone()))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Handler for EventCounter {
    fn name(&self) -> &str {
        "counter"
    }

    async fn handle(&self, _ctx: &CancellationToken, event: &Event) -> Result<(), HandlerError> {
        let key = (event.resource_type.clone(), event.operation_type.clone());
        *self.counts.write().await.entry(key).or_default() += 1;
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(event_id = %event.id, total, "Counted event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, resource_type: ResourceType, operation_type: OperationType) -> Event {
        Event {
            id: id.to_string(),
            resource_type,
            operation_type,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_counts() {
        let counter = EventCounter::new();
        let ctx = CancellationToken::new();
        for event in [
            event("1", ResourceType::User, OperationType::Create),
            event("2", ResourceType::User, OperationType::Update),
            event("3", ResourceType::User, OperationType::Update),
            event("4", ResourceType::Group, OperationType::Delete),
            event("5", ResourceType::Other("NEW".to_string()), OperationType::Action),
        ] {
            counter.handle(&ctx, &event).await.unwrap();
        }

        assert_eq!(counter.total(), 5);
        assert_eq!(
            counter.count(&ResourceType::User, &OperationType::Update).await,
            2
        );
        assert_eq!(
            counter.count(&ResourceType::Client, &OperationType::Create).await,
            0
        );
        assert_eq!(
            counter.by_resource_type().await,
            vec![
                (ResourceType::User, 3),
                (ResourceType::Group, 1),
                (ResourceType::Other("NEW".to_string()), 1),
            ]
        );
    }
}
