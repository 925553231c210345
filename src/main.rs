//! # certdeploy 主程序
//!
//! 读取 TOML 配置中的部署任务，依次把证书部署到各个目标端。

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use certdeploy::{
    DeployError, deploy_with,
    config::{self, DeploymentConfig},
    fanout::FanOut,
    lerror, linfo,
    logging::{self, LogComponent, LogStage},
    registry,
};

#[derive(Debug, Parser)]
#[command(name = "certdeploy", version, about = "Deploy certificates to configured targets")]
struct Cli {
    /// 配置文件路径（默认读取 CERTDEPLOY_CONFIG_PATH 或 config/config.{RUST_ENV}.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 日志级别，覆盖配置文件中的 [logging].level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 执行全部启用的部署任务
    Deploy {
        /// 只执行指定名称的任务
        #[arg(long)]
        only: Option<String>,
    },
    /// 列出已注册的 provider
    Providers,
    /// 打印日志环境变量说明
    LoggingHelp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    registry::register_all_builtins();

    match cli.command {
        Command::Providers => {
            for id in registry::global().ids() {
                println!("{id}");
            }
            Ok(())
        }
        Command::LoggingHelp => {
            logging::print_logging_help();
            Ok(())
        }
        Command::Deploy { only } => {
            run_deployments(cli.config, cli.log_level, only.as_deref()).await
        }
    }
}

async fn run_deployments(
    config_path: Option<PathBuf>,
    log_level: Option<String>,
    only: Option<&str>,
) -> anyhow::Result<()> {
    let app_config = config::load_config(config_path.as_deref())?;
    let level = log_level.unwrap_or_else(|| app_config.logging.level.clone());
    logging::init_optimized_logging(Some(&level));

    let selected: Vec<&DeploymentConfig> = app_config
        .enabled_deployments()
        .filter(|d| only.is_none_or(|name| d.name == name))
        .collect();
    if let Some(name) = only {
        if selected.is_empty() {
            anyhow::bail!("no enabled deployment named '{name}'");
        }
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            linfo!(
                "system",
                LogStage::Deploy,
                LogComponent::Cli,
                "interrupted",
                "received Ctrl-C, cancelling remaining deployments"
            );
            ctrl_c.cancel();
        }
    });

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Cli,
        "deploy_start",
        &format!("running {} deployment(s)", selected.len())
    );

    let outcome = FanOut::new()
        .run(&cancel, selected, |deployment| {
            let cancel = &cancel;
            async move { run_one(deployment, cancel).await }
        })
        .await;

    match outcome {
        Ok(report) => {
            linfo!(
                "system",
                LogStage::Deploy,
                LogComponent::Cli,
                "deploy_finished",
                &format!("{} deployment(s) succeeded", report.len())
            );
            Ok(())
        }
        Err(DeployError::Aggregate(aggregate)) => {
            for failure in aggregate.failures() {
                lerror!(
                    "system",
                    LogStage::Deploy,
                    LogComponent::Cli,
                    "deployment_failed",
                    &format!("{}: {}", failure.item_id, failure.error)
                );
            }
            anyhow::bail!("{} deployment(s) failed", aggregate.len())
        }
        Err(err) => Err(err.into()),
    }
}

async fn run_one(deployment: &DeploymentConfig, cancel: &CancellationToken) -> certdeploy::Result<()> {
    let (cert_pem, privkey_pem) = read_pem_pair(deployment)
        .await
        .map_err(|e| DeployError::config_with_source(format!("deployment '{deployment}'"), e))?;

    deploy_with(
        &deployment.provider,
        &deployment.access,
        &deployment.extended,
        cancel,
        &cert_pem,
        &privkey_pem,
    )
    .await
    .map(|_| ())
}

async fn read_pem_pair(deployment: &DeploymentConfig) -> anyhow::Result<(String, String)> {
    let cert_pem = tokio::fs::read_to_string(&deployment.certificate)
        .await
        .with_context(|| format!("failed to read {}", deployment.certificate.display()))?;
    let privkey_pem = tokio::fs::read_to_string(&deployment.private_key)
        .await
        .with_context(|| format!("failed to read {}", deployment.private_key.display()))?;
    Ok((cert_pem, privkey_pem))
}
