use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref GLOBAL_CONFIG_MANAGER: RwLock<Option<Arc<ConfigManager>>> = RwLock::new(None);
}

/// 配置管理器 / Configuration manager
pub struct ConfigManager {
    config: Config,
}

impl ConfigManager {
    /// 创建配置管理器（分层加载，后添加者优先生效）
    /// Build the manager (layered sources, later ones win)
    ///
    /// 优先级：环境变量 > production.toml > default.toml > development.toml
    pub fn new() -> Result<Self> {
        let config = Config::builder()
            .add_source(File::new("config/development.toml", FileFormat::Toml).required(false))
            .add_source(File::new("config/default.toml", FileFormat::Toml).required(false))
            .add_source(File::new("config/production.toml", FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("TCIM").separator("_"))
            .build()
            .map_err(|e| anyhow!("配置初始化失败: {}", e))?;
        Ok(Self { config })
    }

    /// 读取配置项 / Read a config key
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.config
            .get::<T>(key)
            .map_err(|e| anyhow!("配置项 '{}' 读取失败: {}", key, e))
    }

    /// 读取配置项，缺失或类型不符时返回默认值
    /// Read a key, falling back to the default when absent or mistyped
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.config.get::<T>(key).unwrap_or(default)
    }
}

/// 初始化全局配置管理器 / Initialize the global config manager
pub fn init_global_config_manager() -> Result<Arc<ConfigManager>> {
    let manager = Arc::new(ConfigManager::new()?);
    let mut global = GLOBAL_CONFIG_MANAGER
        .write()
        .map_err(|e| anyhow!("获取全局配置管理器写锁失败: {}", e))?;
    *global = Some(Arc::clone(&manager));
    Ok(manager)
}

/// 获取全局配置管理器（未初始化则惰性创建）
/// Get the global manager (lazily created when absent)
pub fn get_global_config_manager() -> Result<Arc<ConfigManager>> {
    {
        let global = GLOBAL_CONFIG_MANAGER
            .read()
            .map_err(|e| anyhow!("读取全局配置管理器锁失败: {}", e))?;
        if let Some(ref manager) = *global {
            return Ok(Arc::clone(manager));
        }
    }
    init_global_config_manager()
}
