/// 令牌存储
///
/// 只提供键值读写接口，会话对象在其上保存令牌与用户信息

use async_trait::async_trait;
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::utils::error::{AppError, AppResult};

/// 键值存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ITokenStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> AppResult<()>;
    async fn remove(&self, key: &str) -> AppResult<()>;
}

/// 内存存储，用于测试与一次性命令
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ITokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// JSON 文件存储
///
/// 每次写入整体重写文件；文件不存在视为空存储
pub struct JsonTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    async fn read_all(&self) -> AppResult<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| AppError::json_error(format!("解析令牌文件失败 {:?}: {}", self.path, e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, entries: &BTreeMap<String, String>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, content).await?;
        debug!("[TokenStore] 已写入 {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl ITokenStore for JsonTokenStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
            info!("[TokenStore] 已删除键: {}", key);
        }
        Ok(())
    }
}
