//! Per-resource record collections.
//!
//! A [`ResourceCollection`] is the cache for one resource: the records themselves in
//! insertion order, their last-modified and last-saved stamps, the snapshot each record
//! had when it was last saved (for change tracking), and the bookkeeping for completed
//! collection queries.
//!
//! Collections are plain data. All locking happens in [`DataStore`](crate::store::DataStore).

use serde_json::{Map, Value};
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicI64, Ordering as AtomicOrdering},
};

use crate::{
    evaluator::execute_query,
    id::RecordId,
    query::{Query, QuerySignature},
    record::{Record, deep_mix_in, record_id},
};

/// Strictly increasing millisecond clock.
///
/// Two stamps taken within the same millisecond still differ, so "modified after saved"
/// comparisons stay meaningful.
#[derive(Debug, Default)]
pub(crate) struct Clock {
    last: AtomicI64,
}

impl Clock {
    pub(crate) fn tick(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let next = |last: i64| if now <= last { last + 1 } else { now };

        match self.last.fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |last| Some(next(last))) {
            Ok(last) | Err(last) => next(last),
        }
    }
}

/// Attribute-level differences between a record and its last saved state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    /// Attributes present now but not in the saved state.
    pub added: Map<String, Value>,
    /// Attributes whose value differs from the saved state (current values).
    pub changed: Map<String, Value>,
    /// Attributes present in the saved state but gone now (saved values).
    pub removed: Map<String, Value>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    /// Computes the differences of `current` relative to `previous`.
    pub fn between(previous: &Record, current: &Record) -> Self {
        let mut changes = Changes::default();

        for (key, value) in current {
            match previous.get(key) {
                None => {
                    changes.added.insert(key.clone(), value.clone());
                }
                Some(old) if old != value => {
                    changes.changed.insert(key.clone(), value.clone());
                }
                Some(_) => {}
            }
        }

        for (key, value) in previous {
            if !current.contains_key(key) {
                changes.removed.insert(key.clone(), value.clone());
            }
        }

        changes
    }

    /// The attributes that would have to be sent to bring the backend up to date.
    pub fn to_attrs(&self) -> Map<String, Value> {
        self.added
            .iter()
            .chain(self.changed.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(self.removed.keys().map(|k| (k.clone(), Value::Null)))
            .collect()
    }
}

#[derive(Debug)]
pub struct ResourceCollection {
    id_attribute: String,
    order: Vec<RecordId>,
    index: HashMap<RecordId, Record>,
    previous: HashMap<RecordId, Record>,
    modified: HashMap<RecordId, i64>,
    saved: HashMap<RecordId, i64>,
    completed_queries: HashMap<QuerySignature, i64>,
    collection_modified: Option<i64>,
    collection_saved: Option<i64>,
}

impl ResourceCollection {
    pub fn new(id_attribute: impl Into<String>) -> Self {
        Self {
            id_attribute: id_attribute.into(),
            order: Vec::new(),
            index: HashMap::new(),
            previous: HashMap::new(),
            modified: HashMap::new(),
            saved: HashMap::new(),
            completed_queries: HashMap::new(),
            collection_modified: None,
            collection_saved: None,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.index.get(id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.index.contains_key(id)
    }

    /// All records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.order.iter().filter_map(|id| self.index.get(id))
    }

    /// Evaluates `query` against the cached records.
    pub fn filter(&self, query: &Query) -> Vec<Record> {
        execute_query(query, self.records())
    }

    /// Inserts `record` or deep-merges it into the existing record with the same id,
    /// returning the stored state.
    pub(crate) fn merge(&mut self, id: RecordId, record: Record, stamp: i64) -> &Record {
        self.modified.insert(id.clone(), stamp);
        self.collection_modified = Some(stamp);

        if !self.index.contains_key(&id) {
            self.order.push(id.clone());
        }

        let stored = self.index.entry(id).or_default();
        deep_mix_in(stored, &record);
        stored
    }

    /// Remembers the current state of `id` as the baseline for change tracking.
    pub(crate) fn snapshot(&mut self, id: &RecordId) {
        if let Some(record) = self.index.get(id) {
            self.previous.insert(id.clone(), record.clone());
        }
    }

    /// Records the current state of `id` as saved.
    pub(crate) fn mark_saved(&mut self, id: &RecordId, stamp: i64) {
        if self.index.contains_key(id) {
            self.snapshot(id);
            self.saved.insert(id.clone(), stamp);
            self.collection_saved = Some(stamp);
        }
    }

    /// Replaces the stored record with the result of `f`, bumping its modified stamp.
    pub(crate) fn modify<F>(&mut self, id: &RecordId, stamp: i64, f: F) -> Option<&Record>
    where
        F: FnOnce(&mut Record),
    {
        let record = self.index.get_mut(id)?;
        f(record);
        self.modified.insert(id.clone(), stamp);
        self.collection_modified = Some(stamp);
        self.index.get(id)
    }

    pub(crate) fn remove(&mut self, id: &RecordId, stamp: i64) -> Option<Record> {
        let record = self.index.remove(id)?;
        self.order.retain(|existing| existing != id);
        self.previous.remove(id);
        self.modified.remove(id);
        self.saved.remove(id);
        self.collection_modified = Some(stamp);
        Some(record)
    }

    /// Removes every record matching `query`, returning them in insertion order.
    pub(crate) fn remove_matching(&mut self, query: &Query, stamp: i64) -> Vec<Record> {
        let doomed = self
            .filter(query)
            .iter()
            .filter_map(|record| record_id(record, &self.id_attribute))
            .collect::<HashSet<_>>();

        let ids = self
            .order
            .iter()
            .filter(|id| doomed.contains(*id))
            .cloned()
            .collect::<Vec<_>>();

        ids.iter()
            .filter_map(|id| self.remove(id, stamp))
            .collect()
    }

    pub fn previous(&self, id: &RecordId) -> Option<&Record> {
        self.previous.get(id)
    }

    /// Changes made to `id` since it was last saved. `None` if the record is unknown.
    pub fn changes(&self, id: &RecordId) -> Option<Changes> {
        let current = self.index.get(id)?;

        Some(match self.previous.get(id) {
            Some(previous) => Changes::between(previous, current),
            None => Changes::between(&Record::new(), current),
        })
    }

    /// Last-modified stamp of one record, or of the collection as a whole.
    pub fn last_modified(&self, id: Option<&RecordId>) -> Option<i64> {
        match id {
            Some(id) => self.modified.get(id).copied(),
            None => self.collection_modified,
        }
    }

    /// Last-saved stamp of one record, or of the collection as a whole.
    pub fn last_saved(&self, id: Option<&RecordId>) -> Option<i64> {
        match id {
            Some(id) => self.saved.get(id).copied(),
            None => self.collection_saved,
        }
    }

    pub fn is_query_completed(&self, signature: &QuerySignature) -> bool {
        self.completed_queries.contains_key(signature)
    }

    pub(crate) fn complete_query(&mut self, signature: QuerySignature, stamp: i64) {
        self.completed_queries.insert(signature, stamp);
    }

    pub(crate) fn forget_query(&mut self, signature: &QuerySignature) {
        self.completed_queries.remove(signature);
    }

    pub(crate) fn forget_all_queries(&mut self) {
        self.completed_queries.clear();
    }
}
