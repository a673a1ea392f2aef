use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pqty_config::{AppConfig, ConfigError};
use pqty_engine::collector::Collector;
use pqty_engine::errors::EngineError;
use pqty_engine::overrides::EntityOverrides;
use pqty_engine::pass::QuantityPass;
use pqty_engine::store::QuantityIdStore;
use pqty_io::{DocumentLoader, DocumentSaver, JsonFacade};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

mod report;

#[derive(Parser)]
#[command(name = "pqty")]
#[command(about = "为配管图纸中的部件分配稳定的数量编号", long_about = None)]
struct Cli {
    /// 配置文件路径，缺省时按 PQTY_CONFIG / ./config/default.toml 查找
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 覆盖配置中的日志等级
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 执行一次收集流程并写回图纸
    Assign {
        /// 图纸文件（JSON）
        document: PathBuf,
        /// 写出到其他路径，缺省时覆盖原文件
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// 只计算并打印结果，不写回
        #[arg(long)]
        dry_run: bool,
    },
    /// 显示图纸中已保存的编号表与各对象的编号
    Show {
        /// 图纸文件（JSON）
        document: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = match load_configuration(cli.config.clone()) {
        Ok(config) => config,
        Err(err) => {
            // 日志尚未初始化，直接写 stderr
            eprintln!("加载配置失败：{err}");
            std::process::exit(1);
        }
    };
    init_logging(&config, cli.log_level.as_deref());
    info!("启动 PQTY 数量编号工具");

    let outcome = match &cli.command {
        Command::Assign {
            document,
            output,
            dry_run,
        } => assign(&config, document, output.as_deref(), *dry_run),
        Command::Show { document } => show(&config, document),
    };

    if let Err(err) = outcome {
        match err.downcast_ref::<EngineError>() {
            Some(EngineError::CapacityExceeded { max_id, next }) => {
                error!(max_id, next, "数量编号已用尽，图纸未做任何修改");
            }
            _ => error!(error = %format!("{err:#}"), "执行失败"),
        }
        std::process::exit(1);
    }
}

fn assign(config: &AppConfig, path: &Path, output: Option<&Path>, dry_run: bool) -> Result<()> {
    let facade = JsonFacade::new();
    let mut document = facade
        .load(path)
        .with_context(|| format!("无法载入图纸 {}", path.display()))?;

    let report = match QuantityPass::new(config).run(&mut document) {
        Ok(report) => report,
        Err(EngineError::Persistence { source, report }) => {
            print!("{}", report::render_summary(&report));
            return Err(anyhow::Error::new(source).context("编号表写回图纸失败"));
        }
        Err(err) => return Err(err.into()),
    };
    print!("{}", report::render_summary(&report));

    if dry_run {
        info!(new_keys = report.new_keys, "试运行，未写回图纸");
        return Ok(());
    }
    let target = output.unwrap_or(path);
    facade
        .save(&document, target)
        .with_context(|| format!("无法写出图纸 {}", target.display()))?;
    info!(path = %target.display(), "已保存图纸");
    Ok(())
}

fn show(config: &AppConfig, path: &Path) -> Result<()> {
    let document = JsonFacade::new()
        .load(path)
        .with_context(|| format!("无法载入图纸 {}", path.display()))?;
    let state = QuantityIdStore::new(&config.storage).load(
        &document,
        config.allocator.max_id,
        config.allocator.start_id,
    );
    print!("{}", report::render_state(&state));

    let overrides = EntityOverrides::new(&config.storage);
    let assignments: Vec<_> = Collector::new(&config.collector)
        .collect(&document)
        .into_iter()
        .map(|target| {
            let id = overrides.quantity_id_of(&document, &target);
            (target, id)
        })
        .collect();
    print!("{}", report::render_assignments(&assignments));
    Ok(())
}

/// 显式指定的配置加载失败时返回错误；自动发现的配置失败时退回内建默认值。
fn load_configuration(override_path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    match override_path {
        Some(path) => AppConfig::from_file(path),
        None => match AppConfig::discover() {
            Ok(cfg) => Ok(cfg),
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        eprintln!("加载默认配置 {} 失败，使用内建默认值：{err}", path.display());
                    }
                    ConfigError::Context { .. } => {
                        eprintln!("加载默认配置失败，使用内建默认值：{err}");
                    }
                }
                Ok(AppConfig::default())
            }
        },
    }
}

fn init_logging(config: &AppConfig, override_level: Option<&str>) {
    let level = override_level.unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    // 日志写到 stderr，stdout 只留给报表
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal());
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
