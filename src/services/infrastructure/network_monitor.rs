/// 网络连通性探测
use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;
use tokio::net::TcpStream;
use url::Url;

use crate::utils::config::AppConfig;
use crate::utils::error::{AppError, AppResult};

/// 网络状态接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait INetworkMonitor: Send + Sync {
    /// 当前是否有网络连接
    async fn is_connected(&self) -> bool;
}

/// 通过 TCP 连接服务端探测网络
pub struct TcpConnectivityProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpConnectivityProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self { host: host.into(), port, timeout }
    }

    /// 探测目标默认取自服务地址，可由 network_config 覆盖
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let base = Url::parse(&config.api_config.base_url)
            .map_err(|e| AppError::configuration_error(format!("无效的服务地址: {}", e)))?;

        let host = match &config.network_config.probe_host {
            Some(host) => host.clone(),
            None => base
                .host_str()
                .ok_or_else(|| AppError::configuration_error("服务地址缺少主机名"))?
                .to_string(),
        };
        let port = config
            .network_config
            .probe_port
            .or_else(|| base.port_or_known_default())
            .ok_or_else(|| AppError::configuration_error("无法确定探测端口"))?;

        Ok(Self::new(host, port, Duration::from_millis(config.network_config.probe_timeout_ms)))
    }

    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl INetworkMonitor for TcpConnectivityProbe {
    async fn is_connected(&self) -> bool {
        let target = self.target();
        match tokio::time::timeout(self.timeout, TcpStream::connect(&target)).await {
            Ok(Ok(_)) => {
                debug!("[Network] 探测成功: {}", target);
                true
            }
            Ok(Err(e)) => {
                warn!("[Network] 无法连接 {}: {}", target, e);
                false
            }
            Err(_) => {
                warn!("[Network] 探测超时: {}", target);
                false
            }
        }
    }
}
