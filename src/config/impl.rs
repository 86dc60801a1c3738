use std::sync::{Arc, OnceLock};

use super::structs::StaticConfig;

/// 全局静态配置，进程启动时初始化一次
static STATIC_CONFIG: OnceLock<Arc<StaticConfig>> = OnceLock::new();

/// 默认配置文件路径（可被 MB_CONFIG_PATH 覆盖）
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 初始化全局配置（幂等：重复调用返回已有配置）
pub fn init_config() -> Arc<StaticConfig> {
    let path =
        std::env::var("MB_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    init_config_from(&path)
}

/// 从指定路径初始化全局配置
pub fn init_config_from(path: &str) -> Arc<StaticConfig> {
    STATIC_CONFIG
        .get_or_init(|| Arc::new(StaticConfig::load(path)))
        .clone()
}

/// 获取全局配置，未初始化时回退到默认加载
pub fn get_config() -> Arc<StaticConfig> {
    match STATIC_CONFIG.get() {
        Some(config) => config.clone(),
        None => init_config(),
    }
}
