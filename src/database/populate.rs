use std::collections::HashMap;

use serde_json::{Map, Value};

use super::{Kind, Store, StoreError};

/// A reference field to resolve on read.
#[derive(Debug, Clone, Copy)]
pub struct Ref {
    pub field: &'static str,
    pub kind: Kind,
    /// projected fields, empty means the whole document
    pub select: &'static [&'static str],
}

impl Ref {
    pub const ASSIGNED_TO: Ref = Ref {
        field: "assignedTo",
        kind: Kind::User,
        select: &["name", "email"],
    };
    pub const CREATED_BY: Ref = Ref {
        field: "createdBy",
        kind: Kind::User,
        select: &["name", "email"],
    };
    pub const CUSTOMER: Ref = Ref {
        field: "customer",
        kind: Kind::Customer,
        select: &["name", "email", "company"],
    };
    pub const LEAD: Ref = Ref {
        field: "leadId",
        kind: Kind::Lead,
        select: &[],
    };
}

fn project(doc: &Value, r: &Ref) -> Value {
    let Value::Object(fields) = doc else {
        return Value::Null;
    };
    if r.select.is_empty() {
        let mut full = fields.clone();
        full.remove("password");
        return Value::Object(full);
    }
    let mut out = Map::new();
    if let Some(id) = fields.get("id") {
        out.insert("id".into(), id.clone());
    }
    for key in r.select {
        if let Some(v) = fields.get(*key) {
            out.insert((*key).to_owned(), v.clone());
        }
    }
    Value::Object(out)
}

/// 填充外键：用被引用文档的投影替换 id，找不到时置为 null
pub fn populate(store: &dyn Store, docs: &mut [Value], refs: &[Ref]) -> Result<(), StoreError> {
    for r in refs {
        let mut resolved: HashMap<String, Value> = HashMap::new();
        for doc in docs.iter_mut() {
            let Some(id) = doc.get(r.field).and_then(Value::as_str).map(str::to_owned) else {
                continue;
            };
            let value = match resolved.get(&id) {
                Some(v) => v.clone(),
                None => {
                    let v = store
                        .get(r.kind, &id)?
                        .map_or(Value::Null, |target| project(&target, r));
                    resolved.insert(id, v.clone());
                    v
                }
            };
            if let Value::Object(map) = doc {
                map.insert(r.field.to_owned(), value);
            }
        }
    }
    Ok(())
}
