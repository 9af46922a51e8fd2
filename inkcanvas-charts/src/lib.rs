//! 基于 [`inkcanvas_svg::Group`] 的图表绘制，目前只有饼图。

pub mod pie;

pub use pie::{
    DEFAULT_HIGHLIGHT_RADIUS, DEFAULT_ID_PREFIX, PieChart, PieSlice, highlight_points,
};
