//! Telnet Session 引擎
//!
//! 一個 Session 擁有一條 TCP 連線，並同時處理三件事：
//! - 接收任務：讀取 socket、切割命令、決定協商回應
//! - 分派迴圈：送出協商回應與使用者資料，並把去除命令後的資料交給回呼
//! - 呼叫端：透過 [`SessionHandle`] 把要送出的資料放進佇列
//!
//! 所有跨任務的共享結構都是有界的 `mpsc` channel。

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use super::framer::frame_chunk;
use super::negotiator;
use crate::wire_dump::{hex, Direction, WireDump};

/// Telnet Session 錯誤
#[derive(Debug, Error)]
pub enum TelnetError {
    #[error("連線失敗: {0}")]
    ConnectionFailed(#[from] io::Error),

    #[error("連線逾時")]
    Timeout,

    #[error("DNS 解析失敗: {0}")]
    DnsResolutionFailed(String),

    #[error("尚未註冊資料處理回呼")]
    MissingHandler,

    #[error("未連線")]
    NotConnected,

    #[error("目前狀態不允許此操作: {0:?}")]
    InvalidState(SessionState),

    #[error("遠端已關閉連線")]
    StreamEnd,

    #[error("接收失敗: {0}")]
    Receive(io::Error),

    #[error("發送失敗: {0}")]
    Transmit(io::Error),

    #[error("發送佇列已滿")]
    QueueFull,

    #[error("Session 已關閉")]
    SessionClosed,

    #[error("Session 重複關閉")]
    AlreadyClosed,
}

/// Session 生命週期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 尚未連線
    Idle,
    /// 已連線，尚未開始處理
    Connected,
    /// `process` 執行中
    Running,
    /// 已停止收發，等待 `close`
    ShuttingDown,
    /// 資源已釋放
    Closed,
}

/// Session 配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 連線逾時
    pub connect_timeout: Duration,
    /// 每次 socket 讀取的緩衝區大小
    pub read_buffer_size: usize,
    /// 每個內部佇列的容量
    pub queue_capacity: usize,
    /// 收到 `IAC IAC` 時是否把 0xFF 放回資料流
    pub reinject_escaped_iac: bool,
    /// 是否設定 TCP_NODELAY
    pub nodelay: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_buffer_size: 512,
            queue_capacity: 1024,
            reinject_escaped_iac: false,
            nodelay: true,
        }
    }
}

/// 接收去除命令後資料的回呼
pub type DataHandler = Box<dyn FnMut(Bytes) + Send + 'static>;

/// Session 內部的 channel
struct Channels {
    reply_tx: mpsc::Sender<Bytes>,
    reply_rx: mpsc::Receiver<Bytes>,
    outbound_tx: mpsc::Sender<Bytes>,
    outbound_rx: mpsc::Receiver<Bytes>,
    inbound_tx: mpsc::Sender<Bytes>,
    inbound_rx: mpsc::Receiver<Bytes>,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Channels {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (reply_tx, reply_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        Self {
            reply_tx,
            reply_rx,
            outbound_tx,
            outbound_rx,
            inbound_tx,
            inbound_rx,
            shutdown_tx,
            shutdown_rx,
        }
    }

    fn handle(&self) -> SessionHandle {
        SessionHandle {
            outbound: self.outbound_tx.clone(),
            shutdown: self.shutdown_tx.clone(),
        }
    }
}

/// 呼叫端用來送資料與要求關閉的把手，可任意複製
#[derive(Debug, Clone)]
pub struct SessionHandle {
    outbound: mpsc::Sender<Bytes>,
    shutdown: mpsc::Sender<()>,
}

impl SessionHandle {
    /// 把資料放入發送佇列，不會等待
    ///
    /// 佇列已滿時回傳 [`TelnetError::QueueFull`]，資料不會被送出。
    pub fn write(&self, data: impl Into<Bytes>) -> Result<(), TelnetError> {
        self.outbound.try_send(data.into()).map_err(|e| match e {
            TrySendError::Full(_) => TelnetError::QueueFull,
            TrySendError::Closed(_) => TelnetError::SessionClosed,
        })
    }

    /// 把資料放入發送佇列，佇列滿時等待空間
    pub async fn send(&self, data: impl Into<Bytes>) -> Result<(), TelnetError> {
        self.outbound
            .send(data.into())
            .await
            .map_err(|_| TelnetError::SessionClosed)
    }

    /// 給非 async 執行緒使用的 [`SessionHandle::send`]
    pub fn blocking_send(&self, data: impl Into<Bytes>) -> Result<(), TelnetError> {
        self.outbound
            .blocking_send(data.into())
            .map_err(|_| TelnetError::SessionClosed)
    }

    /// 要求 Session 停止；重複呼叫不會出錯
    pub fn shutdown(&self) -> Result<(), TelnetError> {
        match self.shutdown.try_send(()) {
            Ok(()) | Err(TrySendError::Full(_)) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(TelnetError::SessionClosed),
        }
    }

    /// Session 是否已關閉
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// 接收任務；被丟棄時會中止任務，釋放 socket 的讀取端
struct ReceiveTask {
    handle: JoinHandle<Result<(), TelnetError>>,
}

impl Drop for ReceiveTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// 分派迴圈結束的原因
enum Exit {
    Shutdown,
    Receiver(Result<(), TelnetError>),
    Transmit(io::Error),
}

/// Telnet Session
pub struct TelnetSession {
    config: SessionConfig,
    state: SessionState,
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
    handler: Option<DataHandler>,
    channels: Option<Channels>,
}

impl TelnetSession {
    /// 創建新的 Session
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            stream: None,
            peer: None,
            handler: None,
            channels: None,
        }
    }

    /// 獲取目前狀態
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 獲取配置
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 遠端位址
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// 註冊資料回呼，必須在 [`TelnetSession::process`] 之前呼叫
    pub fn on_data<F>(&mut self, handler: F)
    where
        F: FnMut(Bytes) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    /// 連線到伺服器
    ///
    /// # Arguments
    /// * `host` - 主機名稱或 IP
    /// * `port` - 連接埠
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), TelnetError> {
        if self.state != SessionState::Idle {
            return Err(TelnetError::InvalidState(self.state));
        }
        info!("正在連線到 {}:{}", host, port);

        let addr = format!("{}:{}", host, port);
        let socket_addrs: Vec<SocketAddr> = tokio::net::lookup_host(&addr)
            .await
            .map_err(|e| TelnetError::DnsResolutionFailed(e.to_string()))?
            .collect();

        let Some(target) = socket_addrs.first().copied() else {
            return Err(TelnetError::DnsResolutionFailed(format!(
                "無法解析主機: {}",
                host
            )));
        };
        debug!("已解析到位址: {:?}", socket_addrs);

        let stream = timeout(self.config.connect_timeout, TcpStream::connect(target))
            .await
            .map_err(|_| TelnetError::Timeout)?
            .map_err(TelnetError::ConnectionFailed)?;

        stream.set_nodelay(self.config.nodelay)?;

        info!("已連線到 {}:{}", host, port);
        self.peer = Some(target);
        self.stream = Some(stream);
        self.channels = Some(Channels::new(self.config.queue_capacity));
        self.state = SessionState::Connected;

        Ok(())
    }

    /// 取得發送把手；連線後才可取得
    pub fn handle(&self) -> Result<SessionHandle, TelnetError> {
        match &self.channels {
            Some(channels) => Ok(channels.handle()),
            None if self.state == SessionState::Closed => Err(TelnetError::SessionClosed),
            None => Err(TelnetError::NotConnected),
        }
    }

    /// 開始收發，直到連線結束或收到關閉要求才返回
    ///
    /// 遠端正常關閉連線或透過 [`SessionHandle::shutdown`] 停止時回傳 `Ok(())`。
    pub async fn process(&mut self) -> Result<(), TelnetError> {
        match self.state {
            SessionState::Connected => {}
            SessionState::Idle => return Err(TelnetError::NotConnected),
            other => return Err(TelnetError::InvalidState(other)),
        }
        let handler = self.handler.as_mut().ok_or(TelnetError::MissingHandler)?;
        let channels = self.channels.as_mut().ok_or(TelnetError::NotConnected)?;
        let stream = self.stream.take().ok_or(TelnetError::NotConnected)?;

        self.state = SessionState::Running;
        info!("Session 開始處理");

        let (reader, writer) = stream.into_split();
        let result = run(
            reader,
            writer,
            channels,
            handler,
            self.config.read_buffer_size.max(1),
            self.config.reinject_escaped_iac,
        )
        .await;

        // 停止後的寫入一律回報 SessionClosed
        channels.outbound_rx.close();
        channels.shutdown_rx.close();
        self.state = SessionState::ShuttingDown;
        result
    }

    /// 關閉 socket 並釋放所有內部 channel
    ///
    /// 只能成功一次；重複呼叫回傳 [`TelnetError::AlreadyClosed`]。
    pub fn close(&mut self) -> Result<(), TelnetError> {
        match self.state {
            SessionState::Idle => Err(TelnetError::NotConnected),
            SessionState::Closed => {
                warn!("Session 已經關閉過");
                Err(TelnetError::AlreadyClosed)
            }
            SessionState::Connected | SessionState::Running | SessionState::ShuttingDown => {
                self.stream.take();
                self.channels.take();
                self.handler.take();
                self.state = SessionState::Closed;
                info!("Session 已關閉");
                Ok(())
            }
        }
    }
}

impl Default for TelnetSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

/// 啟動接收任務並執行分派迴圈，直到其中一方結束
async fn run<R, W>(
    reader: R,
    mut writer: W,
    channels: &mut Channels,
    handler: &mut DataHandler,
    buffer_size: usize,
    reinject_escaped_iac: bool,
) -> Result<(), TelnetError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let mut receiver = ReceiveTask {
        handle: tokio::spawn(receive_loop(
            reader,
            channels.reply_tx.clone(),
            channels.inbound_tx.clone(),
            buffer_size,
            reinject_escaped_iac,
        )),
    };

    // 協商回應優先於使用者資料
    let exit = loop {
        tokio::select! {
            biased;
            _ = channels.shutdown_rx.recv() => break Exit::Shutdown,
            Some(reply) = channels.reply_rx.recv() => {
                if let Err(e) = transmit(&mut writer, &reply).await {
                    break Exit::Transmit(e);
                }
            }
            Some(data) = channels.outbound_rx.recv() => {
                if let Err(e) = transmit(&mut writer, &data).await {
                    break Exit::Transmit(e);
                }
            }
            Some(chunk) = channels.inbound_rx.recv() => {
                trace!("分派 {} 位元組", chunk.len());
                handler(chunk);
            }
            joined = &mut receiver.handle => {
                let outcome = joined.unwrap_or_else(|e| Err(TelnetError::Receive(io::Error::other(e))));
                break Exit::Receiver(outcome);
            }
        }
    };

    drop(receiver);
    if let Err(e) = writer.shutdown().await {
        debug!("關閉寫入端失敗: {}", e);
    }

    match exit {
        Exit::Shutdown => {
            info!("收到關閉信號");
            Ok(())
        }
        Exit::Receiver(Ok(())) | Exit::Receiver(Err(TelnetError::StreamEnd)) => {
            info!("遠端已關閉連線");
            Ok(())
        }
        Exit::Receiver(Err(e)) => {
            error!("接收任務結束: {}", e);
            Err(e)
        }
        Exit::Transmit(e) => {
            error!("發送失敗，放棄此筆資料: {}", e);
            Err(TelnetError::Transmit(e))
        }
    }
}

/// 接收任務：讀取、切割命令並排入協商回應，剩下的資料交給分派迴圈
async fn receive_loop<R>(
    mut reader: R,
    replies: mpsc::Sender<Bytes>,
    inbound: mpsc::Sender<Bytes>,
    buffer_size: usize,
    reinject_escaped_iac: bool,
) -> Result<(), TelnetError>
where
    R: AsyncRead + Unpin,
{
    debug!("接收任務啟動");
    let mut buffer = vec![0u8; buffer_size];

    loop {
        let n = match reader.read(&mut buffer).await {
            Ok(0) => return Err(TelnetError::StreamEnd),
            Ok(n) => n,
            Err(e) => return Err(TelnetError::Receive(e)),
        };
        let chunk = &buffer[..n];
        WireDump::record(Direction::Inbound, chunk);
        trace!("收到 {} 位元組", n);

        let framed = frame_chunk(chunk, reinject_escaped_iac);
        for command in &framed.commands {
            let Some(reply) = negotiator::respond(command) else {
                debug!("收到 {}，不需回應", command);
                continue;
            };
            debug!("收到 {}，回應 {}", command, reply);
            if replies.send(Bytes::from(reply.to_bytes())).await.is_err() {
                return Ok(());
            }
        }

        if !framed.data.is_empty() && inbound.send(Bytes::from(framed.data)).await.is_err() {
            return Ok(());
        }
    }
}

/// 把整段資料寫入 socket
async fn transmit<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    WireDump::record(Direction::Outbound, bytes);
    trace!("送出 [{}]", hex(bytes));
    writer.write_all(bytes).await?;
    writer.flush().await
}
