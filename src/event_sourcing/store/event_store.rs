use std::collections::HashMap;
use std::marker::PhantomData;
use tokio::sync::RwLock;
use uuid::Uuid;
use anyhow::Result;

use crate::event_sourcing::core::{
    deserialize_event, serialize_event, Aggregate, DomainEvent, EventEnvelope,
};
use crate::utils::IsTransient;

// ============================================================================
// Generic Event Store - Repository for Events
// ============================================================================
//
// In-memory, append-only event store. Payloads are kept serialized, exactly
// as a database-backed store would hold them, so anything that round-trips
// here round-trips through real storage too.
//
// Responsibilities:
// 1. Append events (append-only)
// 2. Load event history for aggregates
// 3. Optimistic concurrency control
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Concurrency conflict on {aggregate_id}: expected version {expected}, but current is {actual}")]
    ConcurrencyConflict {
        aggregate_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Cannot append empty event list")]
    EmptyAppend,

    #[error("Aggregate not found: {0}")]
    NotFound(Uuid),

    #[error("Event serialization failed: {0}")]
    Serialization(String),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

impl IsTransient for anyhow::Error {
    fn is_transient(&self) -> bool {
        self.downcast_ref::<StoreError>()
            .is_some_and(IsTransient::is_transient)
    }
}

#[derive(Default)]
struct Streams {
    events: HashMap<Uuid, Vec<EventEnvelope<String>>>,
    // aggregate ids in creation order
    created: Vec<Uuid>,
}

pub struct EventStore<E: DomainEvent> {
    streams: RwLock<Streams>,
    aggregate_type_name: String,  // e.g., "Order"
    _phantom: PhantomData<E>,
}

impl<E: DomainEvent> EventStore<E> {
    pub fn new(aggregate_type_name: &str) -> Self {
        Self {
            streams: RwLock::new(Streams::default()),
            aggregate_type_name: aggregate_type_name.to_string(),
            _phantom: PhantomData,
        }
    }

    pub fn aggregate_type_name(&self) -> &str {
        &self.aggregate_type_name
    }

    /// Append events to the event store
    /// Returns the new version number after appending
    pub async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64, StoreError> {
        if events.is_empty() {
            return Err(StoreError::EmptyAppend);
        }

        let mut rows = Vec::with_capacity(events.len());
        let mut new_version = expected_version;

        for envelope in events {
            new_version += 1;

            let payload = serialize_event(&envelope.event_data)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            rows.push(EventEnvelope {
                event_id: envelope.event_id,
                aggregate_id,
                sequence_number: new_version,
                event_type: envelope.event_type,
                event_version: envelope.event_version,
                event_data: payload,
                causation_id: envelope.causation_id,
                correlation_id: envelope.correlation_id,
                user_id: envelope.user_id,
                timestamp: envelope.timestamp,
            });
        }

        let event_count = rows.len();
        let mut streams = self.streams.write().await;

        let current_version = streams
            .events
            .get(&aggregate_id)
            .map_or(0, |stream| stream.len() as i64);

        if current_version != expected_version {
            tracing::warn!(
                aggregate_id = %aggregate_id,
                expected = expected_version,
                actual = current_version,
                "Concurrency conflict"
            );
            return Err(StoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        if current_version == 0 {
            streams.created.push(aggregate_id);
        }
        streams.events.entry(aggregate_id).or_default().extend(rows);

        tracing::info!(
            aggregate_id = %aggregate_id,
            aggregate_type = %self.aggregate_type_name,
            new_version = new_version,
            event_count = event_count,
            "Appended events to event store"
        );

        Ok(new_version)
    }

    /// Load all events for an aggregate, in sequence order
    pub async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope<E>>> {
        let streams = self.streams.read().await;

        let Some(stream) = streams.events.get(&aggregate_id) else {
            return Ok(Vec::new());
        };

        let mut events = Vec::with_capacity(stream.len());
        for row in stream {
            let event_data: E = deserialize_event(&row.event_data)?;

            events.push(EventEnvelope {
                event_id: row.event_id,
                aggregate_id: row.aggregate_id,
                sequence_number: row.sequence_number,
                event_type: row.event_type.clone(),
                event_version: row.event_version,
                event_data,
                causation_id: row.causation_id,
                correlation_id: row.correlation_id,
                user_id: row.user_id,
                timestamp: row.timestamp,
            });
        }

        tracing::debug!("Loaded {} events for aggregate {}", events.len(), aggregate_id);
        Ok(events)
    }

    /// Get current version of aggregate (0 when it does not exist)
    pub async fn get_current_version(&self, aggregate_id: Uuid) -> i64 {
        self.streams
            .read()
            .await
            .events
            .get(&aggregate_id)
            .map_or(0, |stream| stream.len() as i64)
    }

    /// Load aggregate from events
    pub async fn load_aggregate<A>(&self, aggregate_id: Uuid) -> Result<A>
    where
        A: Aggregate<Event = E>,
        <A as Aggregate>::Error: std::fmt::Display,
    {
        let events = self.load_events(aggregate_id).await?;

        if events.is_empty() {
            return Err(StoreError::NotFound(aggregate_id).into());
        }

        A::load_from_events(events)
    }

    pub async fn aggregate_exists(&self, aggregate_id: Uuid) -> bool {
        self.get_current_version(aggregate_id).await > 0
    }

    /// Most recently created aggregate
    pub async fn latest_aggregate_id(&self) -> Option<Uuid> {
        self.streams.read().await.created.last().copied()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct Counted {
        by: i64,
    }

    impl DomainEvent for Counted {
        fn event_type() -> &'static str { "Counted" }
    }

    struct Counter {
        id: Uuid,
        version: i64,
        total: i64,
    }

    impl Aggregate for Counter {
        type Event = Counted;
        type Command = i64;
        type Error = String;
        type Context = ();

        fn apply_first_event(event: &Counted) -> Result<Self, String> {
            Ok(Self { id: Uuid::nil(), version: 0, total: event.by })
        }

        fn apply_event(&mut self, event: &Counted) -> Result<(), String> {
            self.total += event.by;
            Ok(())
        }

        fn handle_command(&self, command: &i64, _: &()) -> Result<Vec<Counted>, String> {
            Ok(vec![Counted { by: *command }])
        }

        fn aggregate_id(&self) -> Uuid {
            self.id
        }

        fn version(&self) -> i64 {
            self.version
        }

        fn set_version(&mut self, version: i64) {
            self.version = version;
        }
    }

    fn envelope(aggregate_id: Uuid, by: i64) -> EventEnvelope<Counted> {
        EventEnvelope::new(aggregate_id, 0, "Counted".to_string(), Counted { by }, Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_append_and_load_events_in_order() {
        let store = EventStore::<Counted>::new("Counter");
        let id = Uuid::new_v4();

        let version = store
            .append_events(id, 0, vec![envelope(id, 1), envelope(id, 2)])
            .await
            .unwrap();
        assert_eq!(version, 2);

        let version = store.append_events(id, 2, vec![envelope(id, 3)]).await.unwrap();
        assert_eq!(version, 3);

        let events = store.load_events(id).await.unwrap();
        let sequence: Vec<_> = events.iter().map(|e| e.sequence_number).collect();
        let data: Vec<_> = events.iter().map(|e| e.event_data.by).collect();

        assert_eq!(sequence, vec![1, 2, 3]);
        assert_eq!(data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stale_expected_version_conflicts() {
        let store = EventStore::<Counted>::new("Counter");
        let id = Uuid::new_v4();

        store.append_events(id, 0, vec![envelope(id, 1)]).await.unwrap();
        let err = store.append_events(id, 0, vec![envelope(id, 1)]).await.unwrap_err();

        assert!(matches!(err, StoreError::ConcurrencyConflict { expected: 0, actual: 1, .. }));
        assert!(err.is_transient());
        assert_eq!(store.get_current_version(id).await, 1);

        // still recognised once wrapped at the orchestration layer
        let wrapped = anyhow::Error::from(err).context("persisting counter");
        assert!(wrapped.is_transient());
        assert!(!anyhow::anyhow!("boom").is_transient());
    }

    #[tokio::test]
    async fn test_empty_append_rejected() {
        let store = EventStore::<Counted>::new("Counter");
        let err = store.append_events(Uuid::new_v4(), 0, vec![]).await.unwrap_err();

        assert!(matches!(err, StoreError::EmptyAppend));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_load_aggregate_sets_version() {
        let store = EventStore::<Counted>::new("Counter");
        let id = Uuid::new_v4();

        store
            .append_events(id, 0, vec![envelope(id, 5), envelope(id, 7)])
            .await
            .unwrap();

        let counter: Counter = store.load_aggregate(id).await.unwrap();
        assert_eq!(counter.total, 12);
        assert_eq!(counter.version(), 2);
    }

    #[tokio::test]
    async fn test_missing_aggregate() {
        let store = EventStore::<Counted>::new("Counter");
        let id = Uuid::new_v4();

        assert!(!store.aggregate_exists(id).await);
        assert!(store.load_events(id).await.unwrap().is_empty());
        assert!(store.load_aggregate::<Counter>(id).await.is_err());
    }

    #[tokio::test]
    async fn test_latest_aggregate_tracks_creation_order() {
        let store = EventStore::<Counted>::new("Counter");
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert_eq!(store.latest_aggregate_id().await, None);

        store.append_events(first, 0, vec![envelope(first, 1)]).await.unwrap();
        store.append_events(second, 0, vec![envelope(second, 1)]).await.unwrap();
        store.append_events(first, 1, vec![envelope(first, 1)]).await.unwrap();

        assert_eq!(store.latest_aggregate_id().await, Some(second));
        assert_eq!(store.aggregate_type_name(), "Counter");
    }
}
