use std::path::{Path, PathBuf};
use std::rc::Rc;

use inkcanvas_charts::{PieChart, highlight_points};
use inkcanvas_config::AppConfig;
use inkcanvas_core::geometry::Point;
use inkcanvas_core::style::STYLE_FPNAME;
use inkcanvas_export::{ExportError, ExportOutcome, Exporter, prepare_output_dir};
use inkcanvas_svg::{Canvas, Group, RenderOutcome, ShapeOptions, SvgError, TextOptions};
use thiserror::Error;
use tracing::warn;

use crate::cli::Cli;

/// 说明文字与饼图下沿的距离。
const TITLE_GAP: f64 = 20.0;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Svg(#[from] SvgError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("template has no layers")]
    NoLayer,
}

/// 一次运行的结果。
#[derive(Debug)]
pub struct Summary {
    pub render: RenderOutcome,
    pub slices: usize,
    pub pdf: Option<ExportOutcome>,
}

pub fn run(cli: &Cli, config: &AppConfig) -> Result<Summary, AppError> {
    let template = cli.template.as_deref().or(config.canvas.template.as_deref());
    let canvas = Canvas::open(template)?.with_pretty(config.canvas.pretty);
    let group = target_layer(&canvas, cli.layer.as_deref())?;

    let mut pie = PieChart::new(Rc::clone(&group), cli.center, cli.radius)
        .with_colors(config.chart.palette.iter().cloned());
    let slices = pie.add_slices(cli.percents.iter().copied());
    if slices == 0 {
        warn!("没有正数百分比，饼图为空");
    }
    pie.render(None, &config.chart.id_prefix);

    if let Some(title) = &cli.title {
        let position = Point::new(
            cli.center.x(),
            cli.center.y() + cli.radius.height() + TITLE_GAP,
        );
        let options = ShapeOptions::new().with_style((*STYLE_FPNAME).clone());
        group.text(title, position, &TextOptions::default(), &options);
    }
    if cli.highlight || config.chart.highlight {
        highlight_points(&pie, &group, config.chart.highlight_radius);
    }

    let output = resolve_output(&cli.output, &config.canvas.output_dir);
    if let Some(parent) = output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        prepare_output_dir(parent, true)?;
    }
    if let Some(name) = output.file_name().and_then(|name| name.to_str()) {
        canvas.set_docname(name);
    }
    let overwrite = cli.overwrite || config.canvas.overwrite;
    let render = canvas.render(&output, overwrite)?;

    let pdf = match (&render, cli.pdf) {
        (RenderOutcome::Written(svg), true) => {
            let exporter = Exporter::from_config(&config.export);
            Some(exporter.svg_to_pdf(svg, overwrite)?)
        }
        _ => None,
    };
    Ok(Summary { render, slices, pdf })
}

/// 优先使用指定名称的图层，找不到或未指定时退回第一个图层。
fn target_layer(canvas: &Canvas, name: Option<&str>) -> Result<Rc<Group>, AppError> {
    if let Some(name) = name {
        match canvas.layer(name) {
            Some(layer) => return Ok(layer),
            None => warn!(layer = name, "图层不存在，使用第一个图层"),
        }
    }
    canvas.layers().into_iter().next().ok_or(AppError::NoLayer)
}

/// 只给出文件名时放到配置的输出目录下。
fn resolve_output(output: &Path, output_dir: &Path) -> PathBuf {
    let bare = output
        .parent()
        .is_none_or(|parent| parent.as_os_str().is_empty());
    if output.is_absolute() || !bare {
        output.to_path_buf()
    } else {
        output_dir.join(output)
    }
}
