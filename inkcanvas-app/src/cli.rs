use std::path::PathBuf;

use clap::Parser;
use inkcanvas_core::geometry::{Dimension, Point};

/// 在 Inkscape SVG 模板上绘制饼图。
#[derive(Debug, Parser)]
#[command(name = "inkcanvas", version, about)]
pub struct Cli {
    /// 配置文件，缺省时按 INKCANVAS_CONFIG 与 ./config/default.toml 查找
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SVG 模板，覆盖配置中的 canvas.template
    #[arg(long, value_name = "SVG")]
    pub template: Option<PathBuf>,

    /// 绘制到的图层名，找不到时使用第一个图层
    #[arg(long, value_name = "NAME")]
    pub layer: Option<String>,

    #[arg(long, value_name = "X,Y", value_parser = parse_point, default_value = "200,200")]
    pub center: Point,

    #[arg(long, value_name = "RX[,RY]", value_parser = parse_radius, default_value = "150")]
    pub radius: Dimension,

    /// 饼图下方的说明文字
    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    /// 标出扇区边界点与圆心
    #[arg(long)]
    pub highlight: bool,

    #[arg(long)]
    pub overwrite: bool,

    /// 渲染后再用 Inkscape 导出 PDF
    #[arg(long)]
    pub pdf: bool,

    #[arg(short, long, value_name = "OUT.svg")]
    pub output: PathBuf,

    /// 各扇区的百分比，非正数会被忽略
    #[arg(value_name = "PERCENT", required = true, num_args = 1.., allow_negative_numbers = true)]
    pub percents: Vec<f64>,
}

fn parse_numbers(raw: &str) -> Result<Vec<f64>, String> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|err| format!("`{}`: {err}", part.trim()))
        })
        .collect()
}

fn parse_point(raw: &str) -> Result<Point, String> {
    match parse_numbers(raw)?.as_slice() {
        [x, y] => Ok(Point::new(*x, *y)),
        _ => Err(format!("expected X,Y, got `{raw}`")),
    }
}

fn parse_radius(raw: &str) -> Result<Dimension, String> {
    match parse_numbers(raw)?.as_slice() {
        [r] => Ok(Dimension::square(*r)),
        [rx, ry] => Ok(Dimension::new(*rx, *ry)),
        _ => Err(format!("expected RX or RX,RY, got `{raw}`")),
    }
}
