//! 调用外部程序导出文档：Inkscape 把 SVG 转成 PDF，`pdfunite` 合并 PDF。

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use inkcanvas_config::ExportConfig;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const UNIX_INKSCAPE_PATH: &str = "/usr/bin/inkscape";
const WINDOWS_INKSCAPE_PATHS: [&str; 2] = [
    "C:\\Program Files\\Inkscape\\inkscape.exe",
    "C:\\Program Files\\Inkscape\\bin\\inkscape.exe",
];
/// Windows 上找不到安装目录时，交给 PATH 解析。
const WINDOWS_FALLBACK: &str = "inkscape.exe";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to launch {program:?}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("output directory {path:?} does not exist")]
    MissingOutputDir { path: PathBuf },
    #[error("failed to create output directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path:?} has no file name")]
    InvalidPath { path: PathBuf },
    #[error("no input files to merge")]
    NoInputs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Exported(PathBuf),
    /// 目标已存在且未要求覆盖。
    Skipped(PathBuf),
    /// 外部程序以非零状态退出；`None` 表示被信号终止。
    Failed { output: PathBuf, code: Option<i32> },
}

/// 运行外部程序并返回退出码，测试中可替换为记录调用的实现。
pub trait ProcessRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<Option<i32>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<Option<i32>> {
        let status = Command::new(program).args(args).status()?;
        Ok(status.code())
    }
}

/// 按平台给出 Inkscape 可执行文件的默认位置。
pub fn default_inkscape_path() -> PathBuf {
    if cfg!(windows) {
        WINDOWS_INKSCAPE_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
            .unwrap_or_else(|| PathBuf::from(WINDOWS_FALLBACK))
    } else {
        PathBuf::from(UNIX_INKSCAPE_PATH)
    }
}

/// 返回输出目录；`mkdir` 为真时按需创建（含父目录）。
pub fn prepare_output_dir(dir: impl AsRef<Path>, mkdir: bool) -> Result<PathBuf, ExportError> {
    let dir = dir.as_ref();
    if !dir.exists() {
        if !mkdir {
            return Err(ExportError::MissingOutputDir {
                path: dir.to_path_buf(),
            });
        }
        fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        debug!(path = %dir.display(), "created output directory");
    }
    Ok(dir.to_path_buf())
}

/// 与 SVG 同目录、同名的 PDF 路径。
pub fn pdf_path_for(svg: &Path) -> Result<PathBuf, ExportError> {
    if svg.file_stem().is_none() {
        return Err(ExportError::InvalidPath {
            path: svg.to_path_buf(),
        });
    }
    Ok(svg.with_extension("pdf"))
}

pub struct Exporter<R = SystemRunner> {
    inkscape: PathBuf,
    pdf_merger: PathBuf,
    export_area_drawing: bool,
    runner: R,
}

impl Exporter<SystemRunner> {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            inkscape: config
                .inkscape_path
                .clone()
                .unwrap_or_else(default_inkscape_path),
            pdf_merger: config.pdf_merger.clone(),
            export_area_drawing: config.export_area_drawing,
            runner: SystemRunner,
        }
    }
}

impl<R: ProcessRunner> Exporter<R> {
    pub fn with_runner<T: ProcessRunner>(self, runner: T) -> Exporter<T> {
        Exporter {
            inkscape: self.inkscape,
            pdf_merger: self.pdf_merger,
            export_area_drawing: self.export_area_drawing,
            runner,
        }
    }

    pub fn inkscape_path(&self) -> &Path {
        &self.inkscape
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// 用 Inkscape 把 `svg` 转成同目录下的 PDF。
    ///
    /// 目标已存在且不覆盖时跳过；外部程序异常退出只记录警告。
    pub fn svg_to_pdf(&self, svg: &Path, overwrite: bool) -> Result<ExportOutcome, ExportError> {
        if self.inkscape.is_absolute() && !self.inkscape.is_file() {
            error!(path = %self.inkscape.display(), "Inkscape 可执行文件不存在");
        }
        let pdf = pdf_path_for(svg)?;
        if pdf.exists() && !overwrite {
            warn!(path = %pdf.display(), "PDF 已存在，跳过导出");
            return Ok(ExportOutcome::Skipped(pdf));
        }

        let mut export_filename = OsString::from("--export-filename=");
        export_filename.push(pdf.as_os_str());
        let mut args = vec![svg.as_os_str().to_os_string(), export_filename];
        if self.export_area_drawing {
            args.push(OsString::from("--export-area-drawing"));
        }
        self.invoke(&self.inkscape, &args, pdf)
    }

    /// 把 `inputs` 依次合并为 `output`。
    pub fn merge_pdf(
        &self,
        output: &Path,
        inputs: &[PathBuf],
    ) -> Result<ExportOutcome, ExportError> {
        if inputs.is_empty() {
            return Err(ExportError::NoInputs);
        }
        let args: Vec<OsString> = inputs
            .iter()
            .map(|input| input.as_os_str().to_os_string())
            .chain(std::iter::once(output.as_os_str().to_os_string()))
            .collect();
        self.invoke(&self.pdf_merger, &args, output.to_path_buf())
    }

    fn invoke(
        &self,
        program: &Path,
        args: &[OsString],
        output: PathBuf,
    ) -> Result<ExportOutcome, ExportError> {
        debug!(program = %program.display(), ?args, "running external program");
        let code = self
            .runner
            .run(program, args)
            .map_err(|source| ExportError::Launch {
                program: program.to_path_buf(),
                source,
            })?;
        if code == Some(0) {
            info!(path = %output.display(), "exported");
            Ok(ExportOutcome::Exported(output))
        } else {
            warn!(program = %program.display(), ?code, "外部程序退出码异常");
            Ok(ExportOutcome::Failed { output, code })
        }
    }
}
