use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{TapError, TapResult};
use crate::wootric::entity::Entity;

/// Replication checkpoint: per-entity high-water-mark timestamps.
///
/// Bookmarks only move forward. A bookmark is advanced after the
/// corresponding record has been written to the sink, so a crash mid-run
/// can re-deliver records but never skip them.
#[derive(Debug, Clone)]
pub struct SyncState {
    start_date: DateTime<Utc>,
    bookmarks: BTreeMap<String, DateTime<Utc>>,
}

impl SyncState {
    pub fn new(start_date: DateTime<Utc>) -> Self {
        Self {
            start_date,
            bookmarks: BTreeMap::new(),
        }
    }

    /// Build state from a previously emitted STATE snapshot
    /// (entity name -> ISO-8601 bookmark string).
    pub fn from_value(start_date: DateTime<Utc>, value: &Value) -> TapResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| TapError::Config("state must be a JSON object".to_string()))?;

        let mut bookmarks = BTreeMap::new();
        for (entity, raw) in map {
            let ts = raw
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| {
                    TapError::Config(format!("invalid bookmark for {entity}: {raw}"))
                })?;
            bookmarks.insert(entity.clone(), ts);
        }

        Ok(Self {
            start_date,
            bookmarks,
        })
    }

    /// The entity's resume position. Defaults to (and records) the
    /// configured start date when no bookmark exists yet.
    pub fn get_start(&mut self, entity: Entity) -> DateTime<Utc> {
        *self
            .bookmarks
            .entry(entity.name().to_string())
            .or_insert(self.start_date)
    }

    /// Advance the bookmark to the greater of the current value and `ts`.
    pub fn update(&mut self, entity: Entity, ts: DateTime<Utc>) {
        let slot = self
            .bookmarks
            .entry(entity.name().to_string())
            .or_insert(self.start_date);
        if ts > *slot {
            *slot = ts;
        }
    }

    pub fn bookmark(&self, entity: Entity) -> Option<DateTime<Utc>> {
        self.bookmarks.get(entity.name()).copied()
    }

    /// Complete snapshot in the shape persisted downstream.
    pub fn snapshot(&self) -> Value {
        let map: serde_json::Map<String, Value> = self
            .bookmarks
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    Value::String(v.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
                )
            })
            .collect();
        Value::Object(map)
    }
}
