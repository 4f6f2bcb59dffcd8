//! Telnet 命令列客戶端
//!
//! 標準輸入的每一行會送往伺服器，伺服器的輸出去除 ANSI 控制碼後印到標準輸出。

mod ansi;
mod config;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use ansi::AnsiFilter;
use config::CliConfig;
use telnetcore::{SessionHandle, TelnetSession, WireDump};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "Usage: telnet <host> <port> [--config <path>]";

/// 命令列參數
#[derive(Debug, PartialEq)]
struct Args {
    host: String,
    port: u16,
    config: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let host = args.next().ok_or("缺少主機")?;
    let port = args
        .next()
        .ok_or("缺少連接埠")?
        .parse::<u16>()
        .map_err(|e| format!("連接埠格式錯誤: {}", e))?;

    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(args.next().ok_or("--config 缺少路徑")?)),
            other => return Err(format!("未知參數: {}", other)),
        }
    }

    Ok(Args { host, port, config })
}

/// 把一行輸入轉成 Telnet 的 CRLF 行尾
fn network_line(raw: &[u8]) -> Vec<u8> {
    let mut line = raw.to_vec();
    while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
        line.pop();
    }
    line.extend_from_slice(b"\r\n");
    line
}

/// 在獨立執行緒讀取標準輸入；EOF 時要求 Session 關閉
fn spawn_input(handle: SessionHandle) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        let mut reader = stdin.lock();
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => {
                    info!("標準輸入結束");
                    let _ = handle.shutdown();
                    break;
                }
                Ok(_) => {
                    if handle.blocking_send(network_line(&line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("讀取標準輸入失敗: {}", e);
                    let _ = handle.shutdown();
                    break;
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日誌（輸出到 stderr，避免與伺服器內容混在一起）
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            eprintln!("{}", USAGE);
            return ExitCode::FAILURE;
        }
    };

    let config = match &args.config {
        Some(path) => match CliConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => CliConfig::default(),
    };

    if let Some(path) = &config.wire_dump {
        if let Err(e) = WireDump::init(path) {
            warn!("無法開啟封包傾印檔 {:?}: {}", path, e);
        }
    }

    let mut session = TelnetSession::new(config.session_config());
    let mut filter = AnsiFilter::new(config.strip_ansi);
    session.on_data(move |chunk| {
        let text = filter.feed(&chunk);
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(&text);
        let _ = stdout.flush();
    });

    if let Err(e) = session.connect(&args.host, args.port).await {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match session.handle() {
        Ok(handle) => spawn_input(handle),
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    let result = session.process().await;
    if let Err(e) = session.close() {
        warn!("關閉 Session 失敗: {}", e);
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
