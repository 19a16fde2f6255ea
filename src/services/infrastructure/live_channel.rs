/// 实时推送通道
///
/// 通过 WebSocket 接收与看板接口同结构的数据快照。
/// 连接期间看板暂停轮询，断开后恢复。

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::models::Group;
use crate::services::domain::response_schema::parse_groups;
use crate::utils::error::{AppError, AppResult};

/// 通道缓冲的快照数量
const EVENT_BUFFER: usize = 16;

/// 推送事件
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Connected,
    Snapshot(Vec<Group>),
    Disconnected,
}

/// 推送数据来源
pub trait ILiveUpdateSource: Send + Sync {
    /// 建立订阅；取消令牌触发或连接断开后通道发送 `Disconnected` 并关闭
    fn subscribe(&self, token: &str, cancel: CancellationToken) -> mpsc::Receiver<LiveEvent>;
}

/// 解析一帧推送数据
pub fn decode_frame(text: &str) -> AppResult<Vec<Group>> {
    let payload: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| AppError::data_shape_unexpected("live", format!("推送内容不是JSON: {}", e)))?;
    parse_groups(&payload, "live")
}

/// tokio-tungstenite 实现
pub struct LiveUpdateChannel {
    url: Url,
}

impl LiveUpdateChannel {
    pub fn new(websocket_url: &str) -> AppResult<Self> {
        let url = Url::parse(websocket_url)
            .map_err(|e| AppError::configuration_error(format!("无效的推送地址 {}: {}", websocket_url, e)))?;
        Ok(Self { url })
    }

    /// 令牌以查询参数形式附加
    pub fn url_with_token(&self, token: &str) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("token", token);
        url
    }

    async fn run(url: Url, tx: mpsc::Sender<LiveEvent>, cancel: CancellationToken) -> AppResult<()> {
        let (stream, _response) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            connected = tokio_tungstenite::connect_async(url.as_str()) => connected?,
        };
        info!("[Live] 推送通道已连接");
        if tx.send(LiveEvent::Connected).await.is_err() {
            return Ok(());
        }

        let (_write, mut read) = stream.split();
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = read.next() => message,
            };
            match message {
                Some(Ok(Message::Text(text))) => match decode_frame(&text) {
                    Ok(groups) => {
                        if tx.send(LiveEvent::Snapshot(groups)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("[Live] 丢弃无法解析的推送: {}", e),
                },
                Some(Ok(Message::Close(frame))) => {
                    info!("[Live] 服务端关闭连接: {:?}", frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }
        Ok(())
    }
}

impl ILiveUpdateSource for LiveUpdateChannel {
    fn subscribe(&self, token: &str, cancel: CancellationToken) -> mpsc::Receiver<LiveEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let url = self.url_with_token(token);
        debug!("[Live] 连接 {}", self.url);

        tokio::spawn(async move {
            if let Err(e) = Self::run(url, tx.clone(), cancel).await {
                warn!("[Live] 推送通道异常: {}", e);
            }
            let _ = tx.send(LiveEvent::Disconnected).await;
        });
        rx
    }
}
