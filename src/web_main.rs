//! Web 服务器主程序入口

use clap::Parser;

use doc_translator::env::{core::LogLevel, EnvVar};
use doc_translator::translation::load_pipeline_config;
use doc_translator::web::{WebConfig, WebServer};

#[derive(Parser, Debug)]
#[command(name = "doc-translator-web", version)]
#[command(about = "文档翻译 HTTP 服务")]
struct Args {
    /// 绑定地址
    #[arg(short, long)]
    bind: Option<String>,

    /// 端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 文件存储目录
    #[arg(short, long)]
    storage_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = LogLevel::get().unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(format!("doc_translator={},tower_http=info", level)))
        .init();

    let mut config = WebConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    config.validate()?;

    let server = WebServer::new(config, load_pipeline_config());
    server.start().await?;

    Ok(())
}
