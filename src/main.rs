//! build-notify CLI
//!
//! 把构建开始/结束事件推送到聊天 webhook

use anyhow::Result;
use build_notify::cli::{
    handle_check_config, handle_dispatch, handle_render, CheckConfigArgs, DispatchArgs, RenderArgs,
};
use build_notify::notification::BuildStage;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "build-notify")]
#[command(about = "build-notify - 构建事件聊天通知")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 校验配置文件并打印警告
    CheckConfig(CheckConfigArgs),
    /// 分发构建开始事件
    Started(DispatchArgs),
    /// 分发构建结束事件
    Finished(DispatchArgs),
    /// 只渲染 payload，不发送
    Render(RenderArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=debug build-notify finished --event build.json
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("build_notify=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::CheckConfig(args) => handle_check_config(args)?,
        Commands::Started(args) => handle_dispatch(args, BuildStage::Started).await?,
        Commands::Finished(args) => handle_dispatch(args, BuildStage::Finished).await?,
        Commands::Render(args) => handle_render(args)?,
    }

    Ok(())
}
