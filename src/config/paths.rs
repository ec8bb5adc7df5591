//! 配置文件路径
//!
//! 默认配置文件位于 `~/.sapopinguino/config.yaml`。

use std::path::{Path, PathBuf};

/// 配置目录名
pub const CONFIG_DIR_NAME: &str = ".sapopinguino";
/// 配置文件名
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// 默认配置文件路径
///
/// 无法获取主目录时退回当前目录下的 `config.yaml`。
pub fn default_config_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
        None => PathBuf::from(CONFIG_FILE_NAME),
    }
}

/// 展开路径开头的 `~` 或 `~/`
///
/// `~user/...` 形式不支持，原样返回。
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let Some(raw) = path.to_str() else {
        return path.to_path_buf();
    };

    let Some(home) = dirs::home_dir() else {
        return path.to_path_buf();
    };

    if raw == "~" {
        home
    } else if let Some(rest) = raw.strip_prefix("~/") {
        home.join(rest)
    } else {
        path.to_path_buf()
    }
}
