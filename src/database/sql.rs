use mysql::{prelude::Queryable, Pool, PooledConn, Value as SqlValue};
use serde_json::{Map, Value};

use super::{table::create_table, Delta, Filter, Kind, Store, StoreError, Write};
use crate::commit_or_rollback;

/// 主键已存在
const DUPLICATE_KEY_ERROR_CODE: u16 = 1062;

/// MySQL backed store, one JSON document per row.
pub struct MysqlStore {
    pool: Pool,
}

impl From<mysql::Error> for StoreError {
    fn from(value: mysql::Error) -> Self {
        match value {
            mysql::Error::MySqlError(e) if e.code == DUPLICATE_KEY_ERROR_CODE => {
                StoreError::Duplicate("User with this email already exists".into())
            }
            e => StoreError::Backend(e.to_string()),
        }
    }
}

impl MysqlStore {
    /// 连接数据库并建表
    pub fn connect(uri: &str) -> Result<Self, StoreError> {
        let pool = Pool::new(uri)?;
        let mut conn = pool.get_conn()?;
        create_table(&mut conn)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConn, StoreError> {
        Ok(self.pool.get_conn()?)
    }
}

/// `WHERE` clause comparing JSON paths against JSON-encoded parameters.
fn where_clause(filter: &Filter) -> (String, Vec<SqlValue>) {
    let mut sql = String::from("WHERE 1 = 1");
    let mut params = Vec::with_capacity(filter.clauses().len());
    for (field, value) in filter.clauses() {
        if value.is_null() {
            sql.push_str(&format!(
                " AND (JSON_EXTRACT(body, '$.{field}') IS NULL OR JSON_TYPE(JSON_EXTRACT(body, '$.{field}')) = 'NULL')"
            ));
        } else {
            sql.push_str(&format!(" AND JSON_EXTRACT(body, '$.{field}') = CAST(? AS JSON)"));
            params.push(SqlValue::from(value.to_string()));
        }
    }
    (sql, params)
}

fn parse_rows(rows: Vec<String>) -> Result<Vec<Value>, StoreError> {
    rows.iter()
        .map(|row| serde_json::from_str(row).map_err(StoreError::from))
        .collect()
}

fn count_rows(
    conn: &mut PooledConn,
    kind: Kind,
    filter: &Filter,
    lock: bool,
) -> Result<u64, StoreError> {
    let (clause, params) = where_clause(filter);
    let suffix = if lock { " FOR UPDATE" } else { "" };
    let count: Option<u64> = conn.exec_first(
        format!("SELECT COUNT(*) FROM {} {clause}{suffix}", kind.table()),
        params,
    )?;
    Ok(count.unwrap_or(0))
}

/// 字段名来自结构体序列化结果，只允许标识符字符
fn check_field(field: &str) -> Result<(), StoreError> {
    if !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(StoreError::Backend(format!("invalid field name {field}")))
    }
}

fn update_sql(
    kind: Kind,
    id: &str,
    set: &Map<String, Value>,
) -> Result<(String, Vec<SqlValue>), StoreError> {
    let mut paths = Vec::with_capacity(set.len());
    let mut params: Vec<SqlValue> = Vec::with_capacity(set.len() + 1);
    for (field, value) in set {
        check_field(field)?;
        paths.push(format!("'$.{field}', CAST(? AS JSON)"));
        params.push(SqlValue::from(value.to_string()));
    }
    params.push(SqlValue::from(id));
    let sql = format!(
        "UPDATE {} SET body = JSON_SET(body, {}) WHERE id = ?",
        kind.table(),
        paths.join(", ")
    );
    Ok((sql, params))
}

/// Counters add as SIGNED and amounts as DECIMAL, never as DOUBLE.
fn increment_sql(
    kind: Kind,
    id: &str,
    field: &str,
    delta: Delta,
) -> Result<(String, Vec<SqlValue>), StoreError> {
    check_field(field)?;
    let current = format!("IFNULL(JSON_EXTRACT(body, '$.{field}'), 0)");
    let (sum, param) = match delta {
        Delta::Count(n) => (
            format!("CAST({current} AS SIGNED) + ?"),
            SqlValue::from(n),
        ),
        Delta::Amount(d) => (
            format!("CAST({current} AS DECIMAL(20, 2)) + CAST(? AS DECIMAL(20, 2))"),
            SqlValue::from(d.to_string()),
        ),
    };
    let sql = format!(
        "UPDATE {} SET body = JSON_SET(body, '$.{field}', {sum}) WHERE id = ?",
        kind.table()
    );
    Ok((sql, vec![param, SqlValue::from(id)]))
}

/// Locks the row; `affected_rows` alone cannot tell a missing row from an
/// unchanged one.
fn require_row(conn: &mut PooledConn, kind: Kind, id: &str) -> Result<(), StoreError> {
    if count_rows(conn, kind, &Filter::by_id(id), true)? == 0 {
        return Err(StoreError::Conflict(format!("{} {id} no longer exists", kind.table())));
    }
    Ok(())
}

fn __apply_write(conn: &mut PooledConn, write: Write) -> Result<(), StoreError> {
    match write {
        Write::Insert { kind, doc } => {
            let id = doc
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| StoreError::Backend("document without id".into()))?
                .to_owned();
            conn.exec_drop(
                format!("INSERT INTO {} (id, body) VALUES (?, ?)", kind.table()),
                (id, doc.to_string()),
            )?;
        }
        Write::Update { kind, id, set } => {
            require_row(conn, kind, &id)?;
            if set.is_empty() {
                return Ok(());
            }
            let (sql, params) = update_sql(kind, &id, &set)?;
            conn.exec_drop(sql, params)?;
        }
        Write::Increment { kind, id, deltas } => {
            require_row(conn, kind, &id)?;
            for (field, delta) in deltas {
                let (sql, params) = increment_sql(kind, &id, field, delta)?;
                conn.exec_drop(sql, params)?;
            }
        }
        Write::Delete { kind, id } => {
            conn.exec_drop(format!("DELETE FROM {} WHERE id = ?", kind.table()), (id,))?;
        }
        Write::Expect {
            kind,
            filter,
            bound,
            reason,
        } => {
            let count = count_rows(conn, kind, &filter, true)?;
            if !bound.holds(count) {
                return Err(StoreError::Conflict(reason));
            }
        }
    }
    Ok(())
}

fn __apply_batch(conn: &mut PooledConn, batch: Vec<Write>) -> Result<(), StoreError> {
    for write in batch {
        __apply_write(conn, write)?;
    }
    Ok(())
}

impl Store for MysqlStore {
    fn get(&self, kind: Kind, id: &str) -> Result<Option<Value>, StoreError> {
        let mut conn = self.conn()?;
        let row: Option<String> = conn.exec_first(
            format!("SELECT body FROM {} WHERE id = ? LIMIT 1", kind.table()),
            (id,),
        )?;
        match row {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    fn find(&self, kind: Kind, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let mut conn = self.conn()?;
        let (clause, params) = where_clause(filter);
        let rows: Vec<String> =
            conn.exec(format!("SELECT body FROM {} {clause}", kind.table()), params)?;
        parse_rows(rows)
    }

    fn count(&self, kind: Kind, filter: &Filter) -> Result<u64, StoreError> {
        let mut conn = self.conn()?;
        count_rows(&mut conn, kind, filter, false)
    }

    fn apply(&self, batch: Vec<Write>) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        commit_or_rollback!(__apply_batch, &mut conn, batch)
    }
}
