use mysql::{prelude::Queryable, PooledConn};

use super::Kind;

pub struct Table;

// 每张表只有 id 与 JSON 文档两列，用户表额外生成 email 列用于唯一约束

impl Table {
    pub const USER_TABLE: &'static str = "CREATE TABLE IF NOT EXISTS user(
            id VARCHAR(40) NOT NULL,
            body JSON NOT NULL,
            email VARCHAR(255) AS (JSON_UNQUOTE(JSON_EXTRACT(body, '$.email'))) STORED,
            PRIMARY KEY (id),
            UNIQUE KEY user_email (email)
        )
    ";
    pub const LEAD_TABLE: &'static str = "CREATE TABLE IF NOT EXISTS lead(
            id VARCHAR(40) NOT NULL,
            body JSON NOT NULL,
            PRIMARY KEY (id)
        )
    ";
    /// totalDeals / totalRevenue 只由商机流程以增量方式修改
    pub const CUSTOMER_TABLE: &'static str = "CREATE TABLE IF NOT EXISTS customer(
            id VARCHAR(40) NOT NULL,
            body JSON NOT NULL,
            PRIMARY KEY (id)
        )
    ";
    pub const DEAL_TABLE: &'static str = "CREATE TABLE IF NOT EXISTS deal(
            id VARCHAR(40) NOT NULL,
            body JSON NOT NULL,
            PRIMARY KEY (id)
        )
    ";
    pub const TASK_TABLE: &'static str = "CREATE TABLE IF NOT EXISTS task(
            id VARCHAR(40) NOT NULL,
            body JSON NOT NULL,
            PRIMARY KEY (id)
        )
    ";

    pub fn statement(kind: Kind) -> &'static str {
        match kind {
            Kind::User => Self::USER_TABLE,
            Kind::Lead => Self::LEAD_TABLE,
            Kind::Customer => Self::CUSTOMER_TABLE,
            Kind::Deal => Self::DEAL_TABLE,
            Kind::Task => Self::TASK_TABLE,
        }
    }
}

pub fn create_table(conn: &mut PooledConn) -> mysql::Result<()> {
    for kind in Kind::ALL {
        conn.query_drop(Table::statement(kind))?;
    }
    Ok(())
}
