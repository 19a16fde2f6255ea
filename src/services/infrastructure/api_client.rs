/// 远程接口客户端
///
/// 封装看板服务端的全部 REST 接口，响应在这里完成结构校验后再返回强类型模型

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use url::Url;

use crate::models::{Group, LoginResponse, MachineInfo, MachineReport};
use crate::services::domain::response_schema::{
    parse_groups, parse_login, parse_machine_list, parse_machine_report,
};
use crate::utils::config::{ApiConfig, EndpointPaths};
use crate::utils::error::{AppError, AppResult};

/// 生产数据接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IProductionApi: Send + Sync {
    /// 轻量的令牌校验请求，成功即令牌有效
    async fn check_token(&self, token: &str) -> AppResult<()>;

    /// 用户名密码登录
    async fn login(&self, user_name: &str, password: &str) -> AppResult<LoginResponse>;

    /// 看板数据（组 / 机器 / 班次）
    async fn fetch_dashboard(&self, token: &str) -> AppResult<Vec<Group>>;

    /// 单机报告
    async fn fetch_machine_report(&self, token: &str, machine_id: &str, date: &str) -> AppResult<MachineReport>;

    /// 小时报告
    async fn fetch_hourly_report(&self, token: &str, machine_id: &str, date: &str) -> AppResult<MachineReport>;

    /// 按日期的产量汇总
    async fn fetch_production(&self, token: &str, date: &str) -> AppResult<Vec<Group>>;

    /// 机器列表
    async fn fetch_machines(&self, token: &str) -> AppResult<Vec<MachineInfo>>;
}

/// 基于 reqwest 的接口实现
pub struct HttpProductionApi {
    http: Client,
    base_url: Url,
    endpoints: EndpointPaths,
    /// 单机报告与产量汇总接口是否携带令牌
    authenticate_report_endpoints: bool,
}

impl HttpProductionApi {
    pub fn new(config: &ApiConfig) -> AppResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::configuration_error(format!("无效的服务地址 {}: {}", config.base_url, e)))?;
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::configuration_error(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            endpoints: config.endpoints.clone(),
            authenticate_report_endpoints: config.authenticate_report_endpoints,
        })
    }

    fn url(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::configuration_error(format!("无效的接口路径 {}: {}", path, e)))
    }

    fn with_token(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// 报告类接口按配置决定是否附带令牌
    fn report_token<'a>(&self, token: &'a str) -> Option<&'a str> {
        if self.authenticate_report_endpoints {
            Some(token)
        } else {
            None
        }
    }

    async fn get_json(&self, path: &str, token: Option<&str>, query: &[(&str, &str)]) -> AppResult<Value> {
        let url = self.url(path)?;
        debug!("[Api] GET {}", url);
        let request = Self::with_token(self.http.get(url), token).query(query);
        Self::read_json(request).await
    }

    async fn read_json(request: RequestBuilder) -> AppResult<Value> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::auth_invalid(format!("服务端拒绝令牌: {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("[Api] 请求失败 {}: {}", status, body);
            return Err(AppError::network_error(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        response.json::<Value>().await.map_err(AppError::from)
    }
}

#[async_trait]
impl IProductionApi for HttpProductionApi {
    async fn check_token(&self, token: &str) -> AppResult<()> {
        self.get_json(&self.endpoints.token_check, Some(token), &[]).await.map(|_| ())
    }

    async fn login(&self, user_name: &str, password: &str) -> AppResult<LoginResponse> {
        let url = self.url(&self.endpoints.login)?;
        debug!("[Api] POST {}", url);
        let request = self.http.post(url).json(&json!({
            "username": user_name,
            "password": password,
        }));
        let payload = Self::read_json(request).await?;
        parse_login(&payload)
    }

    async fn fetch_dashboard(&self, token: &str) -> AppResult<Vec<Group>> {
        let payload = self.get_json(&self.endpoints.dashboard, Some(token), &[]).await?;
        parse_groups(&payload, "dashboard")
    }

    async fn fetch_machine_report(&self, token: &str, machine_id: &str, date: &str) -> AppResult<MachineReport> {
        let payload = self
            .get_json(
                &self.endpoints.machine_report,
                self.report_token(token),
                &[("machine_id", machine_id), ("date", date)],
            )
            .await?;
        parse_machine_report(&payload, machine_id, Some(date))
    }

    async fn fetch_hourly_report(&self, token: &str, machine_id: &str, date: &str) -> AppResult<MachineReport> {
        let payload = self
            .get_json(
                &self.endpoints.hourly_report,
                Some(token),
                &[("machine_id", machine_id), ("date", date)],
            )
            .await?;
        parse_machine_report(&payload, machine_id, Some(date))
    }

    async fn fetch_production(&self, token: &str, date: &str) -> AppResult<Vec<Group>> {
        let payload = self
            .get_json(&self.endpoints.production, self.report_token(token), &[("date", date)])
            .await?;
        parse_groups(&payload, "production")
    }

    async fn fetch_machines(&self, token: &str) -> AppResult<Vec<MachineInfo>> {
        let payload = self.get_json(&self.endpoints.machines, Some(token), &[]).await?;
        parse_machine_list(&payload)
    }
}
