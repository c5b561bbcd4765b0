//! started / finished / render 命令 - 从 JSON 文件读取构建事件并分发

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::output::format_output;
use crate::notification::{
    BuildEvent, BuildResult, BuildStage, InMemoryLineageStore, LineageStore, MessageFormatter,
    NotificationBuilder, ReporterConfig, StaticBuildMaster,
};

/// 分发命令参数
#[derive(Args)]
pub struct DispatchArgs {
    /// Build event JSON file ("-" for stdin)
    #[arg(long, short)]
    pub event: PathBuf,
    /// Config file (default: ~/.config/build-notify/config.json)
    #[arg(long, short)]
    pub config: Option<PathBuf>,
    /// Render and log without posting
    #[arg(long)]
    pub dry_run: bool,
    /// Seed the builder's previous result (e.g. "failure" or "2")
    #[arg(long)]
    pub previous: Option<BuildResult>,
}

/// render 命令参数
#[derive(Args)]
pub struct RenderArgs {
    /// Build event JSON file ("-" for stdin)
    #[arg(long, short)]
    pub event: PathBuf,
    /// Config file (default: ~/.config/build-notify/config.json)
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

/// 读取事件文件
pub fn read_event(path: &Path) -> Result<BuildEvent> {
    let content = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("Failed to read event from stdin")?
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file {}", path.display()))?
    };
    serde_json::from_str(&content).context("Invalid build event JSON")
}

/// 处理 started / finished 命令
pub async fn handle_dispatch(args: DispatchArgs, stage: BuildStage) -> Result<()> {
    let mut event = read_event(&args.event)?;
    event.stage = stage;

    let store = Arc::new(InMemoryLineageStore::new());
    if let Some(previous) = args.previous {
        store.record(&event.builder, Some(previous));
    }

    let mut builder = NotificationBuilder::new()
        .dry_run(args.dry_run)
        .lineage_store(store);
    if let Some(path) = &args.config {
        builder = builder.config_path(path);
    }
    let dispatcher = builder.build(Arc::new(StaticBuildMaster::from_event(&event)))?;

    info!(builder = %event.builder, build_id = event.build_id, stage = stage.as_str(), "Dispatching build event");
    let report = match stage {
        BuildStage::Started => dispatcher.build_started(event).await,
        BuildStage::Finished => dispatcher.build_finished(event).await,
    };

    match report.skipped {
        Some(reason) => println!("Skipped: {:?}", reason),
        None => println!(
            "Delivered {}/{} notification(s)",
            report.delivered(),
            report.deliveries.len()
        ),
    }
    if let Some(message) = &report.message {
        if args.dry_run {
            println!("{}", format_output(message));
        }
    }
    for outcome in report.deliveries.iter().filter(|d| !d.is_delivered()) {
        eprintln!(
            "  ✗ {} @ {}: {}",
            outcome.repository,
            outcome.revision.as_deref().unwrap_or("None"),
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

/// 处理 render 命令：只打印 payload
pub fn handle_render(args: RenderArgs) -> Result<()> {
    let event = read_event(&args.event)?;
    let (config, warnings) = ReporterConfig::discover(args.config.as_deref())?;
    ReporterConfig::log_warnings(&warnings);

    let message = MessageFormatter::new().render(&event, &config.policy());
    println!("{}", format_output(&message));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_event_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"stage":"finished","builder":"runtests","build_id":12,"result":2,
               "url":"http://ci/12","sourcestamps":[{{"repository":"app","revision":"abc"}}],
               "responsible_users":["alice"]}}"#
        )
        .unwrap();

        let event = read_event(file.path()).unwrap();
        assert_eq!(event.build_id, 12);
        assert_eq!(event.result, Some(BuildResult::Failure));
        assert_eq!(event.responsible_users, vec!["alice".to_string()]);
    }

    #[test]
    fn test_read_event_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(read_event(file.path()).is_err());
    }
}
