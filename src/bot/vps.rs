//! VPS status query against the BandwagonHost service API.

use serde::Deserialize;
use tracing::error;

use crate::bot::format::{bytes_to_gb, format_date};
use crate::bot::telegram::TelegramClient;

const DEFAULT_BASE_URL: &str = "https://api.64clouds.com";

/// Client for the VPS status API. Credentials are static per deployment.
pub struct VpsClient {
    base_url: String,
    veid: u64,
    api_key: String,
    http: reqwest::Client,
}

/// Fields of the provider's `getServiceInfo` response this bot renders.
///
/// `error` is the provider's own status code; zero means success.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInfo {
    #[serde(default)]
    pub error: i64,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub node_location: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub plan_monthly_data: u64,
    #[serde(default)]
    pub data_counter: u64,
    #[serde(default)]
    pub data_next_reset: i64,
    #[serde(default)]
    pub plan_disk: u64,
    #[serde(default)]
    pub disk_usage: u64,
    #[serde(default)]
    pub plan_ram: u64,
    #[serde(default)]
    pub ram_usage: u64,
}

#[derive(Debug)]
pub enum Error {
    Http(String),
    Api(String),
    Parse(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Api(e) => write!(f, "API error: {e}"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl VpsClient {
    pub fn new(veid: u64, api_key: String) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, veid, api_key)
    }

    pub fn with_base_url(base_url: &str, veid: u64, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            veid,
            api_key,
            http: reqwest::Client::new(),
        }
    }

    pub async fn get_service_info(&self) -> Result<ServiceInfo, Error> {
        let url = format!(
            "{}/v1/getServiceInfo?veid={}&api_key={}",
            self.base_url, self.veid, self.api_key
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Api(response.status().to_string()));
        }

        response.json().await.map_err(|e| Error::Parse(e.to_string()))
    }
}

/// Render the status message. The provider supplies no service expiry
/// date, so none is shown.
pub fn render_status(info: &ServiceInfo) -> String {
    let total_gb = bytes_to_gb(info.plan_monthly_data);
    let used_gb = bytes_to_gb(info.data_counter);
    let remaining_gb = total_gb - used_gb;

    format!(
        "🖥️ <b>搬瓦工 VPS 状态</b>

📊 <b>流量使用情况:</b>
  • 总计: {:.2} GB
  • 已用: {:.2} GB
  • 剩余: {:.2} GB

🗓️ <b>重要日期:</b>
  • 流量重置: {}

📍 <b>服务器信息:</b>
  • 位置: {}
  • 主机名: {}
  • 系统: {}

💾 <b>资源使用:</b>
  • 内存: {:.2} GB / {:.2} GB
  • 硬盘: {:.2} GB / {:.2} GB",
        total_gb,
        used_gb,
        remaining_gb,
        format_date(info.data_next_reset),
        info.node_location,
        info.hostname,
        info.os,
        bytes_to_gb(info.ram_usage),
        bytes_to_gb(info.plan_ram),
        bytes_to_gb(info.disk_usage),
        bytes_to_gb(info.plan_disk),
    )
}

/// `/vps`: fetch and report the server status.
pub async fn handle_vps_command(telegram: &TelegramClient, vps: &VpsClient, chat_id: i64) {
    telegram
        .send_message(chat_id, "⏳ 正在查询搬瓦工 VPS 状态...", None)
        .await
        .ok();

    match vps.get_service_info().await {
        Ok(info) if info.error != 0 => {
            error!("VPS API returned provider error {}", info.error);
            telegram
                .send_message(chat_id, "❌ 获取 VPS 信息失败，请检查 API 配置", None)
                .await
                .ok();
        }
        Ok(info) => {
            telegram
                .send_message(chat_id, &render_status(&info), None)
                .await
                .ok();
        }
        Err(e) => {
            error!("VPS status query failed: {e}");
            telegram
                .send_message(chat_id, "❌ 查询失败，请稍后重试", None)
                .await
                .ok();
        }
    }
}
