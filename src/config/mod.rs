//! 配置管理模块
//!
//! YAML 配置文件加载、环境变量覆盖和启动校验

mod paths;
mod types;
mod yaml;

pub use paths::{default_config_path, expand_tilde, CONFIG_DIR_NAME, CONFIG_FILE_NAME};
pub use types::{
    ClientConfig, Config, FramingMode, LoggingConfig, ProviderConfig, ServerConfig, StreamConfig,
    TransformationMode, DEFAULT_BASE_URL, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_ROUTE,
};
pub use yaml::{
    load_config, load_config_with_env, parse_config, save_config, ConfigError, ENV_API_KEY,
    ENV_CLIENT_ORIGIN, ENV_HOST, ENV_PORT, ENV_PROMPT_ID, ENV_PROMPT_VERSION,
};
