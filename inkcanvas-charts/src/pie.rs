use std::rc::Rc;

use inkcanvas_core::geometry::{Dimension, Point, rotate_percent};
use inkcanvas_core::style::{BLIND_COLORS, STYLE_REDDOT, STYLE_SLIDE};
use inkcanvas_svg::{Group, Shape, ShapeOptions};
use tracing::{debug, warn};

pub const DEFAULT_ID_PREFIX: &str = "piechart";
pub const DEFAULT_HIGHLIGHT_RADIUS: f64 = 3.0;

/// 饼图中的一个扇区。`start`/`target` 是扇区弧线的起止点，
/// 每次几何遍历时按插入顺序重新计算。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PieSlice {
    percent: f64,
    start: Point,
    target: Point,
}

impl PieSlice {
    #[inline]
    pub fn percent(&self) -> f64 {
        self.percent
    }

    #[inline]
    pub fn start(&self) -> Point {
        self.start
    }

    #[inline]
    pub fn target(&self) -> Point {
        self.target
    }

    /// 超过半圈的扇区需要 SVG 弧线的 large-arc 标志。
    #[inline]
    pub fn is_large_arc(&self) -> bool {
        self.percent > 50.0
    }

    /// 从 `start` 沿顺时针画到 `target`，再连回圆心闭合。
    fn path_data(&self, center: Point, radius: Dimension, rotation: f64) -> String {
        format!(
            "M {} {} A {} {}, {}, {}, 1, {} {} L {} {} Z",
            self.start.x(),
            self.start.y(),
            radius.width(),
            radius.height(),
            rotation,
            u8::from(self.is_large_arc()),
            self.target.x(),
            self.target.y(),
            center.x(),
            center.y(),
        )
    }
}

/// 绑定到某个分组的饼图。
///
/// 扇区百分比之和不做校验：不足 100 会留缺口，超过则相互重叠。
#[derive(Debug)]
pub struct PieChart {
    group: Rc<Group>,
    center: Point,
    radius: Dimension,
    slices: Vec<PieSlice>,
    colors: Vec<String>,
    rotation: f64,
}

impl PieChart {
    pub fn new(group: Rc<Group>, center: Point, radius: Dimension) -> Self {
        Self {
            group,
            center,
            radius,
            slices: Vec::new(),
            colors: BLIND_COLORS.iter().map(|color| color.to_string()).collect(),
            rotation: 0.0,
        }
    }

    /// 替换调色板；空调色板会被忽略。
    pub fn with_colors<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let colors: Vec<String> = colors.into_iter().map(Into::into).collect();
        if colors.is_empty() {
            warn!("empty palette ignored");
        } else {
            self.colors = colors;
        }
        self
    }

    #[inline]
    pub fn group(&self) -> &Rc<Group> {
        &self.group
    }

    #[inline]
    pub fn center(&self) -> Point {
        self.center
    }

    #[inline]
    pub fn radius(&self) -> Dimension {
        self.radius
    }

    #[inline]
    pub fn slices(&self) -> &[PieSlice] {
        &self.slices
    }

    #[inline]
    pub fn colors(&self) -> &[String] {
        &self.colors
    }

    /// 弧线命令中的 x 轴旋转角，目前固定为 0。
    #[inline]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// 12 点钟方向的起点，整张饼图都从这里开始。
    pub fn origin(&self) -> Point {
        Point::new(self.center.x(), self.center.y() - self.radius.height())
    }

    /// 追加扇区，非正数与非有限值（NaN、无穷）直接跳过。返回实际加入的个数。
    pub fn add_slices<I>(&mut self, percents: I) -> usize
    where
        I: IntoIterator<Item = f64>,
    {
        let before = self.slices.len();
        for percent in percents {
            if !percent.is_finite() || percent <= 0.0 {
                debug!(percent, "skip non-positive or non-finite slice");
                continue;
            }
            self.slices.push(PieSlice {
                percent,
                start: self.origin(),
                target: self.origin(),
            });
        }
        self.walk();
        self.slices.len() - before
    }

    /// 依次把每个扇区的起点设为上一个扇区的终点，再按百分比旋转得到终点。
    fn walk(&mut self) {
        let center = self.center;
        let mut cursor = self.origin();
        for slice in &mut self.slices {
            slice.start = cursor;
            slice.target = rotate_percent(cursor, center, slice.percent);
            cursor = slice.target;
        }
    }

    /// 每个扇区一条 SVG path 数据，顺序与扇区一致。
    pub fn compute_paths(&mut self) -> Vec<String> {
        self.walk();
        self.slices
            .iter()
            .map(|slice| slice.path_data(self.center, self.radius, self.rotation))
            .collect()
    }

    /// 把饼图画到绑定的分组中。
    ///
    /// 唯一一个 100% 的扇区画成整圆（弧线命令无法表达完整的一圈），
    /// 其余情况每个扇区一条路径，颜色按调色板循环。
    pub fn render(&mut self, colors: Option<&[String]>, id_prefix: &str) -> Vec<Shape> {
        let palette: &[String] = match colors {
            Some(colors) if !colors.is_empty() => colors,
            _ => &self.colors,
        };
        let palette = palette.to_vec();

        if let [only] = self.slices.as_slice() {
            if only.percent == 100.0 {
                let options = ShapeOptions::new()
                    .with_id(format!("{id_prefix}_circle"))
                    .with_style(STYLE_SLIDE.clone_with([("fill", palette[0].as_str())]));
                let shape = if self.radius.width() == self.radius.height() {
                    self.group
                        .circle(self.center, self.radius.width(), &options)
                } else {
                    self.group.ellipse(self.center, self.radius, &options)
                };
                return vec![shape];
            }
        }

        let shapes: Vec<Shape> = self
            .compute_paths()
            .iter()
            .enumerate()
            .map(|(index, path)| {
                let color = &palette[index % palette.len()];
                let options = ShapeOptions::new()
                    .with_id(format!("{id_prefix}_slide{}", index + 1))
                    .with_style(STYLE_SLIDE.clone_with([("fill", color.as_str())]));
                self.group.path(path, &options)
            })
            .collect();
        debug!(slices = shapes.len(), id_prefix, "rendered pie chart");
        shapes
    }
}

/// 调试用：在每个扇区的起止点画绿色小圆，在圆心画红色小圆。
pub fn highlight_points(chart: &PieChart, group: &Group, radius: f64) -> Vec<Shape> {
    let green = STYLE_REDDOT.clone_with([("fill", "#00FF00")]);
    let marker = ShapeOptions::new().with_style(green);
    let mut shapes = Vec::with_capacity(chart.slices().len() * 2 + 1);
    for slice in chart.slices() {
        shapes.push(group.circle(slice.start(), radius, &marker));
        shapes.push(group.circle(slice.target(), radius, &marker));
    }
    let center = ShapeOptions::new().with_style((*STYLE_REDDOT).clone());
    shapes.push(group.circle(chart.center(), radius, &center));
    shapes
}
