use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard},
};

use dashmap::DashMap;
use serde_json::Value;

use super::{Filter, Kind, Store, StoreError, Write};

/// Process-local store.
///
/// Batches are staged under the write half of `gate` and only published
/// once every write and guard has succeeded; reads hold the read half, so a
/// batch is seen entirely or not at all.
pub struct MemoryStore {
    tables: HashMap<Kind, DashMap<String, Value>>,
    gate: RwLock<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Kind::ALL.iter().map(|k| (*k, DashMap::new())).collect(),
            gate: RwLock::new(()),
        }
    }

    fn table(&self, kind: Kind) -> &DashMap<String, Value> {
        &self.tables[&kind]
    }

    fn reading(&self) -> Result<RwLockReadGuard<'_, ()>, StoreError> {
        self.gate
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

/// Uncommitted view of a batch: `None` marks a staged delete.
struct Staged<'a> {
    store: &'a MemoryStore,
    changes: HashMap<(Kind, String), Option<Value>>,
}

impl<'a> Staged<'a> {
    fn get(&self, kind: Kind, id: &str) -> Option<Value> {
        match self.changes.get(&(kind, id.to_owned())) {
            Some(staged) => staged.clone(),
            None => self.store.table(kind).get(id).map(|v| v.clone()),
        }
    }

    fn docs(&self, kind: Kind) -> Vec<Value> {
        let mut docs: Vec<Value> = self
            .store
            .table(kind)
            .iter()
            .filter(|e| !self.changes.contains_key(&(kind, e.key().clone())))
            .map(|e| e.value().clone())
            .collect();
        docs.extend(
            self.changes
                .iter()
                .filter(|((k, _), _)| *k == kind)
                .filter_map(|(_, v)| v.clone()),
        );
        docs
    }

    fn email_taken(&self, doc: &Value, id: &str) -> bool {
        let Some(email) = doc.get("email") else {
            return false;
        };
        self.docs(Kind::User)
            .iter()
            .any(|u| u.get("email") == Some(email) && u.get("id").and_then(Value::as_str) != Some(id))
    }

    fn put(&mut self, kind: Kind, id: String, doc: Value) -> Result<(), StoreError> {
        if kind == Kind::User && self.email_taken(&doc, &id) {
            return Err(StoreError::Duplicate("User with this email already exists".into()));
        }
        self.changes.insert((kind, id), Some(doc));
        Ok(())
    }

    fn apply(&mut self, write: Write) -> Result<(), StoreError> {
        match write {
            Write::Insert { kind, doc } => {
                let id = doc
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| StoreError::Backend("document without id".into()))?
                    .to_owned();
                if self.get(kind, &id).is_some() {
                    return Err(StoreError::Duplicate(format!("{} {id} already exists", kind.table())));
                }
                self.put(kind, id, doc)
            }
            Write::Update { kind, id, set } => {
                let Some(mut doc) = self.get(kind, &id) else {
                    return Err(StoreError::Conflict(format!("{} {id} no longer exists", kind.table())));
                };
                if let Value::Object(map) = &mut doc {
                    map.extend(set);
                }
                self.put(kind, id, doc)
            }
            Write::Increment { kind, id, deltas } => {
                let Some(mut doc) = self.get(kind, &id) else {
                    return Err(StoreError::Conflict(format!("{} {id} no longer exists", kind.table())));
                };
                if let Value::Object(map) = &mut doc {
                    for (field, delta) in deltas {
                        let next = delta.add_to(map.get(field))?;
                        map.insert(field.to_owned(), next);
                    }
                }
                self.changes.insert((kind, id), Some(doc));
                Ok(())
            }
            Write::Delete { kind, id } => {
                self.changes.insert((kind, id), None);
                Ok(())
            }
            Write::Expect {
                kind,
                filter,
                bound,
                reason,
            } => {
                let count = self.docs(kind).iter().filter(|d| filter.matches(d)).count();
                if bound.holds(count as u64) {
                    Ok(())
                } else {
                    Err(StoreError::Conflict(reason))
                }
            }
        }
    }
}

impl Store for MemoryStore {
    fn get(&self, kind: Kind, id: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.reading()?;
        Ok(self.table(kind).get(id).map(|v| v.clone()))
    }

    fn find(&self, kind: Kind, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let _guard = self.reading()?;
        Ok(self
            .table(kind)
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect())
    }

    fn count(&self, kind: Kind, filter: &Filter) -> Result<u64, StoreError> {
        let _guard = self.reading()?;
        Ok(self.table(kind).iter().filter(|e| filter.matches(e.value())).count() as u64)
    }

    fn apply(&self, batch: Vec<Write>) -> Result<(), StoreError> {
        let _guard = self
            .gate
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut staged = Staged {
            store: self,
            changes: HashMap::new(),
        };
        for write in batch {
            staged.apply(write)?;
        }
        for ((kind, id), change) in staged.changes {
            match change {
                Some(doc) => {
                    self.table(kind).insert(id, doc);
                }
                None => {
                    self.table(kind).remove(&id);
                }
            }
        }
        Ok(())
    }
}
