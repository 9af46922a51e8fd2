use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use inkcanvas_core::style::BLIND_COLORS;
use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "INKCANVAS_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `INKCANVAS_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 文档的加载与输出。
#[derive(Debug, Clone, Deserialize)]
pub struct CanvasConfig {
    /// 为空时使用内置空白模板。
    #[serde(default)]
    pub template: Option<PathBuf>,
    #[serde(default = "CanvasConfig::default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl CanvasConfig {
    fn default_output_dir() -> PathBuf {
        PathBuf::from("output")
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            template: None,
            output_dir: Self::default_output_dir(),
            overwrite: false,
            pretty: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "ChartConfig::default_palette")]
    pub palette: Vec<String>,
    #[serde(default = "ChartConfig::default_id_prefix")]
    pub id_prefix: String,
    #[serde(default)]
    pub highlight: bool,
    #[serde(default = "ChartConfig::default_highlight_radius")]
    pub highlight_radius: f64,
}

impl ChartConfig {
    fn default_palette() -> Vec<String> {
        BLIND_COLORS.iter().map(|color| color.to_string()).collect()
    }

    fn default_id_prefix() -> String {
        "piechart".to_string()
    }

    fn default_highlight_radius() -> f64 {
        3.0
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            palette: Self::default_palette(),
            id_prefix: Self::default_id_prefix(),
            highlight: false,
            highlight_radius: Self::default_highlight_radius(),
        }
    }
}

/// 外部导出工具。
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// 为空时按平台探测 Inkscape 的安装位置。
    #[serde(default)]
    pub inkscape_path: Option<PathBuf>,
    #[serde(default = "ExportConfig::default_pdf_merger")]
    pub pdf_merger: PathBuf,
    #[serde(default = "default_true")]
    pub export_area_drawing: bool,
}

impl ExportConfig {
    fn default_pdf_merger() -> PathBuf {
        PathBuf::from("pdfunite")
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            inkscape_path: None,
            pdf_merger: Self::default_pdf_merger(),
            export_area_drawing: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_cover_every_section() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.canvas.template.is_none());
        assert_eq!(cfg.canvas.output_dir, PathBuf::from("output"));
        assert!(!cfg.canvas.overwrite);
        assert!(cfg.canvas.pretty);
        assert_eq!(cfg.chart.palette.len(), BLIND_COLORS.len());
        assert_eq!(cfg.chart.id_prefix, "piechart");
        assert!(!cfg.chart.highlight);
        assert_eq!(cfg.chart.highlight_radius, 3.0);
        assert!(cfg.export.inkscape_path.is_none());
        assert_eq!(cfg.export.pdf_merger, PathBuf::from("pdfunite"));
        assert!(cfg.export.export_area_drawing);
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [canvas]
            template = "templates/canvas.svg"
            overwrite = true

            [chart]
            palette = ["red", "green"]
            highlight = true

            [export]
            inkscape_path = "/opt/inkscape/bin/inkscape"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(
            cfg.canvas.template.as_deref(),
            Some(Path::new("templates/canvas.svg"))
        );
        assert!(cfg.canvas.overwrite);
        assert!(cfg.canvas.pretty);
        assert_eq!(cfg.chart.palette, ["red", "green"]);
        assert!(cfg.chart.highlight);
        assert_eq!(cfg.chart.id_prefix, "piechart");
        assert_eq!(
            cfg.export.inkscape_path.as_deref(),
            Some(Path::new("/opt/inkscape/bin/inkscape"))
        );
        assert!(cfg.export.export_area_drawing);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[chart]\nhighlight_radius = 5.5").unwrap();
        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.chart.highlight_radius, 5.5);
        assert_eq!(cfg.chart.palette.len(), 8);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn invalid_toml_reports_path() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[chart\nhighlight = yes").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == file.path()));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = AppConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
