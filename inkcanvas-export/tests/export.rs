use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use inkcanvas_config::ExportConfig;
use inkcanvas_export::{
    ExportError, ExportOutcome, Exporter, ProcessRunner, prepare_output_dir,
};

/// 只记录调用、按预设返回退出码的假执行器。
struct RecordingRunner {
    code: Option<i32>,
    calls: RefCell<Vec<(PathBuf, Vec<OsString>)>>,
}

impl RecordingRunner {
    fn exiting_with(code: Option<i32>) -> Self {
        Self {
            code,
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<Option<i32>> {
        self.calls
            .borrow_mut()
            .push((program.to_path_buf(), args.to_vec()));
        Ok(self.code)
    }
}

struct MissingProgram;

impl ProcessRunner for MissingProgram {
    fn run(&self, _program: &Path, _args: &[OsString]) -> io::Result<Option<i32>> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no such program"))
    }
}

fn exporter(code: Option<i32>) -> Exporter<RecordingRunner> {
    let config = ExportConfig {
        inkscape_path: Some(PathBuf::from("inkscape")),
        ..ExportConfig::default()
    };
    Exporter::from_config(&config).with_runner(RecordingRunner::exiting_with(code))
}

#[test]
fn svg_to_pdf_invokes_inkscape_next_to_the_source() {
    let dir = tempfile::tempdir().expect("临时目录");
    let svg = dir.path().join("piedemo.svg");
    fs::write(&svg, "<svg/>").expect("写入 SVG");

    let exporter = exporter(Some(0));
    let outcome = exporter.svg_to_pdf(&svg, false).expect("导出");
    let pdf = dir.path().join("piedemo.pdf");
    assert_eq!(outcome, ExportOutcome::Exported(pdf.clone()));

    let calls = exporter.runner().calls.borrow();
    assert_eq!(calls.len(), 1);
    let (program, args) = &calls[0];
    assert_eq!(program, Path::new("inkscape"));
    let mut expected_target = OsString::from("--export-filename=");
    expected_target.push(pdf.as_os_str());
    assert_eq!(
        args,
        &vec![
            svg.as_os_str().to_os_string(),
            expected_target,
            OsString::from("--export-area-drawing"),
        ]
    );
}

#[test]
fn existing_pdf_is_skipped_without_overwrite() {
    let dir = tempfile::tempdir().expect("临时目录");
    let svg = dir.path().join("chart.svg");
    let pdf = dir.path().join("chart.pdf");
    fs::write(&pdf, "old").expect("写入 PDF");

    let exporter = exporter(Some(0));
    assert_eq!(
        exporter.svg_to_pdf(&svg, false).expect("导出"),
        ExportOutcome::Skipped(pdf.clone())
    );
    assert!(exporter.runner().calls.borrow().is_empty());

    assert_eq!(
        exporter.svg_to_pdf(&svg, true).expect("导出"),
        ExportOutcome::Exported(pdf)
    );
    assert_eq!(exporter.runner().calls.borrow().len(), 1);
}

#[test]
fn abnormal_exit_is_reported_not_fatal() {
    let dir = tempfile::tempdir().expect("临时目录");
    let svg = dir.path().join("chart.svg");
    let outcome = exporter(Some(2)).svg_to_pdf(&svg, false).expect("导出");
    assert_eq!(
        outcome,
        ExportOutcome::Failed {
            output: dir.path().join("chart.pdf"),
            code: Some(2),
        }
    );
}

#[test]
fn launch_failure_is_an_error() {
    let dir = tempfile::tempdir().expect("临时目录");
    let svg = dir.path().join("chart.svg");
    let exporter = Exporter::from_config(&ExportConfig::default()).with_runner(MissingProgram);
    let err = exporter.svg_to_pdf(&svg, false).unwrap_err();
    assert!(matches!(err, ExportError::Launch { .. }));
}

#[test]
fn merge_pdf_appends_output_last() {
    let exporter = exporter(Some(0));
    let inputs = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
    let outcome = exporter
        .merge_pdf(Path::new("all.pdf"), &inputs)
        .expect("合并");
    assert_eq!(outcome, ExportOutcome::Exported(PathBuf::from("all.pdf")));

    let calls = exporter.runner().calls.borrow();
    let (program, args) = &calls[0];
    assert_eq!(program, Path::new("pdfunite"));
    assert_eq!(args, &["a.pdf", "b.pdf", "all.pdf"].map(OsString::from).to_vec());

    let err = exporter.merge_pdf(Path::new("all.pdf"), &[]).unwrap_err();
    assert!(matches!(err, ExportError::NoInputs));
}

#[test]
fn prepare_output_dir_creates_on_request() {
    let dir = tempfile::tempdir().expect("临时目录");
    let nested = dir.path().join("output").join("charts");

    let err = prepare_output_dir(&nested, false).unwrap_err();
    assert!(matches!(err, ExportError::MissingOutputDir { .. }));
    assert!(err.to_string().starts_with("output directory"));

    let prepared = prepare_output_dir(&nested, true).expect("创建目录");
    assert_eq!(prepared, nested);
    assert!(nested.is_dir());
    assert_eq!(prepare_output_dir(&nested, false).expect("已存在"), nested);
}
