use std::path::PathBuf;

use clap::Parser;
use inkcanvas_config::{AppConfig, ConfigError};
use inkcanvas_export::ExportOutcome;
use inkcanvas_svg::RenderOutcome;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod pipeline;

fn main() {
    let cli = cli::Cli::parse();
    let config = load_configuration(cli.config.clone());
    init_logging(&config);
    info!("启动 inkcanvas");

    match pipeline::run(&cli, &config) {
        Ok(summary) => {
            info!(slices = summary.slices, "饼图已绘制");
            match &summary.render {
                RenderOutcome::Written(path) => println!("{}", path.display()),
                RenderOutcome::Skipped(path) => {
                    println!("{} (exists, skipped)", path.display())
                }
            }
            if let Some(ExportOutcome::Exported(pdf)) = &summary.pdf {
                println!("{}", pdf.display());
            }
        }
        Err(err) => {
            error!(error = %err, "绘制失败");
            std::process::exit(1);
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
