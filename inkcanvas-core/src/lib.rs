pub mod geometry {
    use std::fmt;
    use std::ops::{Add, Div, Mul, Sub};

    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 百分比到角度的换算系数：100% 对应一整圈 360°。
    pub const PERCENT_TO_DEGREES: f64 = 3.6;

    /// 二维点，内部以 `glam::DVec2` 表示。SVG 坐标系下 y 轴向下。
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct Point(pub DVec2);

    impl Point {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn distance(self, other: Point) -> f64 {
            self.0.distance(other.0)
        }

        /// 在给定容差内比较两个点，浮点旋转结果需要用它而不是 `==`。
        #[inline]
        pub fn approx_eq(self, other: Point, epsilon: f64) -> bool {
            (self.x() - other.x()).abs() <= epsilon && (self.y() - other.y()).abs() <= epsilon
        }
    }

    impl From<DVec2> for Point {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    impl From<(f64, f64)> for Point {
        fn from((x, y): (f64, f64)) -> Self {
            Self::new(x, y)
        }
    }

    impl fmt::Display for Point {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Point(x={}, y={})", self.x(), self.y())
        }
    }

    /// 宽高对，也用于表示椭圆的 x/y 半径。
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct Dimension(pub DVec2);

    impl Dimension {
        #[inline]
        pub fn new(width: f64, height: f64) -> Self {
            Self(DVec2::new(width, height))
        }

        /// 宽高相等的尺寸，圆形饼图的半径即为此形式。
        #[inline]
        pub fn square(size: f64) -> Self {
            Self::new(size, size)
        }

        #[inline]
        pub fn width(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn height(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<(f64, f64)> for Dimension {
        fn from((width, height): (f64, f64)) -> Self {
            Self::new(width, height)
        }
    }

    impl fmt::Display for Dimension {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Dimension(width={}, height={})", self.width(), self.height())
        }
    }

    macro_rules! componentwise_ops {
        ($lhs:ident, $rhs:ident) => {
            impl Add<$rhs> for $lhs {
                type Output = $lhs;
                fn add(self, rhs: $rhs) -> $lhs {
                    $lhs(self.0 + rhs.0)
                }
            }

            impl Sub<$rhs> for $lhs {
                type Output = $lhs;
                fn sub(self, rhs: $rhs) -> $lhs {
                    $lhs(self.0 - rhs.0)
                }
            }

            impl Mul<$rhs> for $lhs {
                type Output = $lhs;
                fn mul(self, rhs: $rhs) -> $lhs {
                    $lhs(self.0 * rhs.0)
                }
            }

            impl Div<$rhs> for $lhs {
                type Output = $lhs;
                fn div(self, rhs: $rhs) -> $lhs {
                    $lhs(self.0 / rhs.0)
                }
            }
        };
    }

    macro_rules! scalar_ops {
        ($ty:ident) => {
            impl Add<f64> for $ty {
                type Output = $ty;
                fn add(self, rhs: f64) -> $ty {
                    $ty(self.0 + rhs)
                }
            }

            impl Sub<f64> for $ty {
                type Output = $ty;
                fn sub(self, rhs: f64) -> $ty {
                    $ty(self.0 - rhs)
                }
            }

            impl Mul<f64> for $ty {
                type Output = $ty;
                fn mul(self, rhs: f64) -> $ty {
                    $ty(self.0 * rhs)
                }
            }

            impl Div<f64> for $ty {
                type Output = $ty;
                fn div(self, rhs: f64) -> $ty {
                    $ty(self.0 / rhs)
                }
            }
        };
    }

    componentwise_ops!(Point, Point);
    componentwise_ops!(Point, Dimension);
    componentwise_ops!(Dimension, Dimension);
    componentwise_ops!(Dimension, Point);
    scalar_ops!(Point);
    scalar_ops!(Dimension);

    /// 锚点 + 尺寸描述的矩形，例如 SVG 的 viewBox。x2/y2 始终由宽高推导。
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct BBox {
        origin: Point,
        size: Dimension,
    }

    impl BBox {
        #[inline]
        pub fn new(origin: Point, size: Dimension) -> Self {
            Self { origin, size }
        }

        #[inline]
        pub fn from_tuple((x, y, width, height): (f64, f64, f64, f64)) -> Self {
            Self::new(Point::new(x, y), Dimension::new(width, height))
        }

        #[inline]
        pub fn origin(&self) -> Point {
            self.origin
        }

        #[inline]
        pub fn size(&self) -> Dimension {
            self.size
        }

        #[inline]
        pub fn x1(&self) -> f64 {
            self.origin.x()
        }

        #[inline]
        pub fn y1(&self) -> f64 {
            self.origin.y()
        }

        #[inline]
        pub fn x2(&self) -> f64 {
            self.origin.x() + self.size.width()
        }

        #[inline]
        pub fn y2(&self) -> f64 {
            self.origin.y() + self.size.height()
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.size.width()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.size.height()
        }

        #[inline]
        pub fn to_tuple(&self) -> (f64, f64, f64, f64) {
            (self.x1(), self.y1(), self.width(), self.height())
        }
    }

    /// 绕 `center` 旋转 `point`，`theta` 以角度表示。
    ///
    /// 先平移到以 `center` 为原点的坐标系，应用旋转矩阵
    /// `[[cos, -sin], [sin, cos]]` 后再平移回去。SVG 的 y 轴向下，
    /// 因此正角度在画面上表现为顺时针。
    pub fn rotate(point: Point, center: Point, theta: f64) -> Point {
        let shifted = point.0 - center.0;
        let rotated = DVec2::from_angle(theta.to_radians()).rotate(shifted);
        Point(rotated + center.0)
    }

    /// 按百分比旋转：100% 即 360°。
    #[inline]
    pub fn rotate_percent(point: Point, center: Point, percent: f64) -> Point {
        rotate(point, center, percent * PERCENT_TO_DEGREES)
    }
}

pub mod style {
    use std::fmt;
    use std::str::FromStr;

    use indexmap::IndexMap;
    use once_cell::sync::Lazy;
    use thiserror::Error;

    /// 色盲友好的默认调色板，饼图扇区按顺序循环取色。
    pub const BLIND_COLORS: [&str; 8] = [
        "#999999", "#E69F00", "#56B4E9", "#009E73", "#F0E442", "#0072B2", "#D55E00", "#CC79A7",
    ];

    /// 线条类图元在未指定样式时使用的默认样式（红色细线）。
    pub static DEFAULT_LINESTYLE: Lazy<Style> = Lazy::new(|| {
        Style::from_pairs([
            ("display", "inline"),
            ("fill", "none"),
            ("stroke_width", "0.86458332px"),
            ("stroke_linecap", "butt"),
            ("stroke_linejoin", "miter"),
            ("stroke_opacity", "1"),
            ("stroke", "#FF0000"),
        ])
    });

    /// 说明文字样式。
    pub static STYLE_FPNAME: Lazy<Style> = Lazy::new(|| {
        Style::from_pairs([
            ("font_size", "20px"),
            ("font_family", "sans-serif"),
            ("font_style", "normal"),
            ("font_weight", "normal"),
            ("line_height", "1.25"),
            ("letter_spacing", "0px"),
            ("word_spacing", "0px"),
            ("fill", "#000000"),
            ("fill_opacity", "1"),
            ("stroke", "none"),
        ])
    });

    /// 饼图扇区填充样式，渲染时以扇区颜色覆盖 `fill`。
    pub static STYLE_SLIDE: Lazy<Style> = Lazy::new(|| {
        Style::from_pairs([
            ("fill", "#0066CC"),
            ("fill_opacity", "1"),
            ("fill_rule", "nonzero"),
            ("stroke_width", "0px"),
            ("stroke", "none"),
        ])
    });

    /// 调试用的红点标记样式。
    pub static STYLE_REDDOT: Lazy<Style> = Lazy::new(|| {
        Style::from_pairs([
            ("display", "inline"),
            ("opacity", "0.98799995"),
            ("fill", "#FF0000"),
            ("stroke", "#e00000"),
            ("stroke_width", "0.52916664"),
            ("stroke_miterlimit", "4"),
            ("stroke_dasharray", "none"),
            ("stroke_opacity", "1"),
        ])
    });

    /// SVG `style` 属性的键值映射。
    ///
    /// 键在写入时即把 `_` 规范化为 `-`（`stroke_width` → `stroke-width`），
    /// 因此覆盖时两种写法指向同一条目。迭代顺序为插入顺序。
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Style {
        attributes: IndexMap<String, String>,
    }

    impl Style {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn from_pairs<I, K, V>(pairs: I) -> Self
        where
            I: IntoIterator<Item = (K, V)>,
            K: AsRef<str>,
            V: Into<String>,
        {
            let mut style = Self::new();
            for (key, value) in pairs {
                style.set(key, value);
            }
            style
        }

        pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
            self.set(key, value);
            self
        }

        pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
            self.attributes
                .insert(normalize_key(key.as_ref()), value.into());
        }

        pub fn get(&self, key: &str) -> Option<&str> {
            self.attributes
                .get(normalize_key(key).as_str())
                .map(String::as_str)
        }

        pub fn remove(&mut self, key: &str) -> Option<String> {
            self.attributes.shift_remove(normalize_key(key).as_str())
        }

        pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
            self.attributes
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str()))
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.attributes.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.attributes.is_empty()
        }

        /// 返回叠加了 `overrides` 的新样式，自身保持不变。
        pub fn clone_with<I, K, V>(&self, overrides: I) -> Style
        where
            I: IntoIterator<Item = (K, V)>,
            K: AsRef<str>,
            V: Into<String>,
        {
            let mut style = self.clone();
            for (key, value) in overrides {
                style.set(key, value);
            }
            style
        }
    }

    fn normalize_key(key: &str) -> String {
        key.trim().replace('_', "-")
    }

    impl fmt::Display for Style {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for (index, (key, value)) in self.attributes.iter().enumerate() {
                if index > 0 {
                    f.write_str(";")?;
                }
                write!(f, "{key}:{value}")?;
            }
            Ok(())
        }
    }

    #[derive(Debug, Error, PartialEq, Eq)]
    #[error("invalid style declaration `{declaration}`")]
    pub struct StyleParseError {
        pub declaration: String,
    }

    impl FromStr for Style {
        type Err = StyleParseError;

        /// 解析 `k1:v1;k2:v2` 形式的 style 属性，空声明会被忽略。
        fn from_str(source: &str) -> Result<Self, Self::Err> {
            let mut style = Style::new();
            for declaration in source.split(';') {
                if declaration.trim().is_empty() {
                    continue;
                }
                let Some((key, value)) = declaration.split_once(':') else {
                    return Err(StyleParseError {
                        declaration: declaration.trim().to_string(),
                    });
                };
                if key.trim().is_empty() {
                    return Err(StyleParseError {
                        declaration: declaration.trim().to_string(),
                    });
                }
                style.set(key, value.trim());
            }
            Ok(style)
        }
    }
}

pub mod ids {
    use std::fmt;
    use std::sync::{Arc, Mutex, PoisonError};

    use once_cell::sync::Lazy;

    /// 外部注入的冲突检测：返回 `true` 表示候选 ID 已被占用。
    pub type CollisionCheck = Box<dyn Fn(&str) -> bool + Send + Sync>;

    static GLOBAL: Lazy<Arc<IdAllocator>> = Lazy::new(|| Arc::new(IdAllocator::new()));

    /// 进程级单调递增的 ID 分配器，生成 `{prefix}_{n}` 形式的 ID。
    ///
    /// 递增与冲突检测在同一把锁内完成，多个文档并发分配也不会得到重复值。
    pub struct IdAllocator {
        counter: Mutex<u64>,
        collision: Option<CollisionCheck>,
    }

    impl IdAllocator {
        pub fn new() -> Self {
            Self::starting_at(1)
        }

        /// 指定第一个候选序号，测试中可用来断言确切的 ID。
        pub fn starting_at(first: u64) -> Self {
            Self {
                counter: Mutex::new(first.saturating_sub(1)),
                collision: None,
            }
        }

        pub fn with_collision_check(
            mut self,
            check: impl Fn(&str) -> bool + Send + Sync + 'static,
        ) -> Self {
            self.collision = Some(Box::new(check));
            self
        }

        /// 进程内共享的默认分配器。
        pub fn global() -> Arc<IdAllocator> {
            Arc::clone(&GLOBAL)
        }

        pub fn next_id(&self, prefix: &str) -> String {
            self.next_id_excluding(prefix, |_| false)
        }

        /// 分配下一个 ID，跳过注入的冲突检测或 `taken` 判定为已占用的候选。
        pub fn next_id_excluding(&self, prefix: &str, taken: impl Fn(&str) -> bool) -> String {
            let mut counter = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
            loop {
                *counter += 1;
                let candidate = format!("{prefix}_{}", *counter);
                let collides = self
                    .collision
                    .as_ref()
                    .is_some_and(|check| check(&candidate));
                if !collides && !taken(&candidate) {
                    return candidate;
                }
            }
        }
    }

    impl Default for IdAllocator {
        fn default() -> Self {
            Self::new()
        }
    }

    impl fmt::Debug for IdAllocator {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let counter = *self.counter.lock().unwrap_or_else(PoisonError::into_inner);
            f.debug_struct("IdAllocator")
                .field("counter", &counter)
                .field("collision", &self.collision.is_some())
                .finish()
        }
    }
}
