mod memory;
mod populate;
mod sql;
mod table;

pub use memory::MemoryStore;
pub use sql::MysqlStore;
pub use populate::{populate, Ref};

use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// 集合（表）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    User,
    Lead,
    Customer,
    Deal,
    Task,
}

impl Kind {
    pub const ALL: [Kind; 5] = [Kind::User, Kind::Lead, Kind::Customer, Kind::Deal, Kind::Task];

    pub fn table(self) -> &'static str {
        match self {
            Kind::User => "user",
            Kind::Lead => "lead",
            Kind::Customer => "customer",
            Kind::Deal => "deal",
            Kind::Task => "task",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// 唯一约束冲突
    #[error("{0}")]
    Duplicate(String),
    /// a guarded batch found the store in an unexpected state
    #[error("{0}")]
    Conflict(String),
    #[error("malformed document: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage backend: {0}")]
    Backend(String),
}

/// Conjunction of field equality clauses over a document.
///
/// Field names are fixed by the code that builds the filter, never taken
/// from a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(&'static str, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }
    pub fn by_id(id: &str) -> Self {
        Self::all().eq("id", id)
    }
    pub fn eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.clauses.push((field, value.into()));
        self
    }
    pub fn clauses(&self) -> &[(&'static str, Value)] {
        &self.clauses
    }
    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(field, value)| doc.get(*field).unwrap_or(&Value::Null) == value)
    }
}

/// 批量写入的守卫条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Zero,
    AtLeast(u64),
}

impl Bound {
    pub fn holds(self, count: u64) -> bool {
        match self {
            Bound::Zero => count == 0,
            Bound::AtLeast(n) => count >= n,
        }
    }
}

/// One step of an atomic batch.
#[derive(Debug, Clone)]
pub enum Write {
    Insert {
        kind: Kind,
        doc: Value,
    },
    /// field level set, untouched fields keep their stored value
    Update {
        kind: Kind,
        id: String,
        set: Map<String, Value>,
    },
    /// in-place numeric add against the stored value
    Increment {
        kind: Kind,
        id: String,
        deltas: Vec<(&'static str, Delta)>,
    },
    Delete {
        kind: Kind,
        id: String,
    },
    /// aborts the whole batch with [`StoreError::Conflict`] when the number
    /// of matching documents violates `bound`
    Expect {
        kind: Kind,
        filter: Filter,
        bound: Bound,
        reason: String,
    },
}

impl Write {
    pub fn insert<D: Document>(doc: &D) -> Result<Self, StoreError> {
        Ok(Write::Insert {
            kind: D::KIND,
            doc: serde_json::to_value(doc)?,
        })
    }
    pub fn update<D: Document>(id: &str, set: Map<String, Value>) -> Self {
        Write::Update {
            kind: D::KIND,
            id: id.to_owned(),
            set,
        }
    }
    pub fn delete<D: Document>(id: &str) -> Self {
        Write::Delete {
            kind: D::KIND,
            id: id.to_owned(),
        }
    }
    pub fn expect<D: Document>(filter: Filter, bound: Bound, reason: impl Into<String>) -> Self {
        Write::Expect {
            kind: D::KIND,
            filter,
            bound,
            reason: reason.into(),
        }
    }
}

/// Persistence contract for the five document kinds.
pub trait Store: Send + Sync {
    fn get(&self, kind: Kind, id: &str) -> Result<Option<Value>, StoreError>;
    fn find(&self, kind: Kind, filter: &Filter) -> Result<Vec<Value>, StoreError>;
    fn count(&self, kind: Kind, filter: &Filter) -> Result<u64, StoreError>;
    /// Runs every write or none of them.
    fn apply(&self, batch: Vec<Write>) -> Result<(), StoreError>;
}

/// A typed document living in one [`Kind`] collection.
pub trait Document: Serialize + DeserializeOwned {
    const KIND: Kind;
    fn id(&self) -> &str;
}

pub fn fetch<D: Document>(store: &dyn Store, id: &str) -> Result<Option<D>, StoreError> {
    match store.get(D::KIND, id)? {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}

pub fn select<D: Document>(store: &dyn Store, filter: &Filter) -> Result<Vec<D>, StoreError> {
    store
        .find(D::KIND, filter)?
        .into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
        .collect()
}

pub fn write_one(store: &dyn Store, write: Write) -> Result<(), StoreError> {
    store.apply(vec![write])
}

/// Serializes a patch struct into the set of fields it carries.
pub fn patch_fields<P: Serialize>(patch: &P) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(patch)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Amount added to one numeric field by [`Write::Increment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    /// integral counter
    Count(i64),
    /// exact decimal amount
    Amount(Decimal),
}

impl Delta {
    /// The field value after adding `self` to `current`; a missing field
    /// counts as zero.
    pub(crate) fn add_to(self, current: Option<&Value>) -> Result<Value, StoreError> {
        let current = current.filter(|v| !v.is_null());
        match self {
            Delta::Count(n) => {
                let base = match current {
                    None => 0,
                    Some(v) => v
                        .as_i64()
                        .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                        .ok_or_else(|| StoreError::Backend(format!("not a counter: {v}")))?,
                };
                Ok(Value::from(base + n))
            }
            Delta::Amount(d) => {
                let base = match current {
                    None => Decimal::ZERO,
                    Some(v) => serde_json::from_value::<Decimal>(v.clone())?,
                };
                Ok(serde_json::to_value(base + d)?)
            }
        }
    }
}

/// 成功提交，失败回滚
#[macro_export]
macro_rules! commit_or_rollback {
    ($fn:expr, $conn:expr, $params:expr) => {{
        ::mysql::prelude::Queryable::query_drop($conn, "BEGIN")?;
        match $fn($conn, $params) {
            Ok(ok) => {
                ::mysql::prelude::Queryable::query_drop($conn, "COMMIT")?;
                Ok(ok)
            }
            Err(e) => {
                ::mysql::prelude::Queryable::query_drop($conn, "ROLLBACK")?;
                Err(e)
            }
        }
    }};
}
