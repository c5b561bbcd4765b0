//! check-config 命令 - 校验 reporter 配置

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::notification::ReporterConfig;

/// check-config 命令参数
#[derive(Args)]
pub struct CheckConfigArgs {
    /// Config file (default: ~/.config/build-notify/config.json)
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

/// 处理 check-config 命令；配置问题只是警告，不影响退出码
pub fn handle_check_config(args: CheckConfigArgs) -> Result<()> {
    let (config, warnings) = ReporterConfig::discover(args.config.as_deref())?;
    ReporterConfig::log_warnings(&warnings);

    let endpoints = config.endpoints();
    println!("Endpoints: {}", endpoints.len());
    for endpoint in &endpoints {
        println!("  {}", endpoint);
    }
    println!("Report build started: {}", config.report_build_started);
    println!("Report only failures: {}", config.report_only_failures);
    println!("Report fixed builds:  {}", config.report_fixed_build);

    if warnings.is_empty() {
        println!("Config OK");
    } else {
        println!("{} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  ⚠️  {}", warning);
        }
    }

    Ok(())
}
