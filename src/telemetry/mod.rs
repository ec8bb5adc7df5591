//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt 订阅器。`RUST_LOG` 优先于配置中的级别。

use crate::config::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 根据配置构建日志过滤器
pub fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化全局日志
///
/// 重复调用时保留第一次安装的订阅器，返回 false。
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = build_env_filter(config);

    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
    };

    result.is_ok()
}
