use std::sync::Arc;

use sales_crm::{config::Config, database::MysqlStore, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let setting = Config::read()?;
    sales_crm::logging::init(&setting)?;
    let store = MysqlStore::connect(&setting.mysql_uri)?;
    let state = AppState::new(Arc::new(store), &setting.jwt_secret)?;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", setting.port())).await?;
    tracing::info!(port = setting.port(), "server listening");
    axum::serve(listener, sales_crm::app(state)).await?;
    Ok(())
}
