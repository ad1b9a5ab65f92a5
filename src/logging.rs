use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

fn filter(config: &Config) -> EnvFilter {
    EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 安装全局日志输出，格式由 `log_format` 决定
pub fn init(config: &Config) -> Result<(), tracing_subscriber::util::TryInitError> {
    let registry = tracing_subscriber::registry().with(filter(config));
    match config.log_format.as_str() {
        "json" => registry.with(fmt::layer().json()).try_init()?,
        _ => registry.with(fmt::layer().compact()).try_init()?,
    }
    tracing::info!(level = %config.log_level, format = %config.log_format, "logging initialized");
    Ok(())
}
