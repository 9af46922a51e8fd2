use std::fmt;
use std::sync::Arc;

use inkcanvas_core::geometry::{Dimension, Point};
use inkcanvas_core::ids::IdAllocator;
use inkcanvas_core::style::{DEFAULT_LINESTYLE, Style};
use tracing::debug;

use crate::SharedTree;
use crate::error::SvgError;
use crate::namespaces::Namespaces;
use crate::query::Query;
use crate::shape::{Shape, ShapeKind};
use crate::tree::{NodeId, QName};

/// 可以原样写入新图元的附加属性名。
const ALLOWED_ATTRIBUTES: &[&str] = &[
    "class",
    "transform",
    "fill",
    "stroke",
    "opacity",
    "display",
    "visibility",
    "text-anchor",
    "dominant-baseline",
    "rx",
    "ry",
    "clip-path",
    "mask",
    "filter",
    "pathLength",
    "href",
    "xlink:href",
    "xml:space",
];

const ALLOWED_PREFIXES: &[&str] = &[
    "fill-",
    "stroke-",
    "font-",
    "marker-",
    "data-",
    "aria-",
    "inkscape:",
    "sodipodi:",
];

/// 新图元上的附加属性，插入时按白名单校验。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraAttributes {
    entries: Vec<(String, String)>,
}

impl ExtraAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_allowed(key: &str) -> bool {
        ALLOWED_ATTRIBUTES.contains(&key)
            || ALLOWED_PREFIXES
                .iter()
                .any(|prefix| key.len() > prefix.len() && key.starts_with(prefix))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) -> Result<(), SvgError> {
        let key = key.into();
        if !Self::is_allowed(&key) || QName::from_prefixed(&key).is_none() {
            return Err(SvgError::UnsupportedAttribute(key));
        }
        let value = value.to_string();
        match self.entries.iter_mut().find(|(known, _)| *known == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        Ok(())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Result<Self, SvgError> {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 新建图元的通用选项：显式 ID 或 ID 前缀、样式、附加属性。
#[derive(Debug, Clone, Default)]
pub struct ShapeOptions {
    pub id: Option<String>,
    pub id_prefix: Option<String>,
    pub style: Option<Style>,
    pub extra: ExtraAttributes,
}

impl ShapeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_extra(mut self, extra: ExtraAttributes) -> Self {
        self.extra = extra;
        self
    }
}

/// 文本图元的字体与对齐参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOptions {
    pub font_size: String,
    pub font_family: String,
    pub fill: String,
    pub text_anchor: String,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            font_size: "18px".to_string(),
            font_family: "sans-serif".to_string(),
            fill: "black".to_string(),
            text_anchor: "middle".to_string(),
        }
    }
}

/// 文档中的一个 `svg:g` 元素。
///
/// 同一 [`crate::Canvas`] 对同一节点的查询总是返回同一个 `Rc<Group>`。
/// `parent` 只是删除时使用的查找句柄，不持有父节点。
pub struct Group {
    tree: SharedTree,
    node: NodeId,
    parent: Option<NodeId>,
    ids: Arc<IdAllocator>,
}

impl Group {
    pub(crate) fn new(
        tree: SharedTree,
        node: NodeId,
        parent: Option<NodeId>,
        ids: Arc<IdAllocator>,
    ) -> Self {
        Self {
            tree,
            node,
            parent,
            ids,
        }
    }

    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn id(&self) -> Option<String> {
        self.read(&QName::local("id"))
    }

    pub fn label(&self) -> Option<String> {
        self.read(&QName::inkscape("label"))
    }

    pub fn is_layer(&self) -> bool {
        self.read(&QName::inkscape("groupmode")).as_deref() == Some("layer")
    }

    fn read(&self, name: &QName) -> Option<String> {
        self.tree.borrow().get(self.node, name).map(str::to_string)
    }

    /// 在本组下新建 `svg:{tag}` 元素，写入 ID、样式与附加属性。
    pub fn create_node(&self, tag: &str, options: &ShapeOptions) -> NodeId {
        self.create_with(tag, options, None, &[])
    }

    fn create_with(
        &self,
        tag: &str,
        options: &ShapeOptions,
        fallback_style: Option<&Style>,
        geometry: &[(QName, String)],
    ) -> NodeId {
        let id = match &options.id {
            Some(id) => id.clone(),
            None => {
                let prefix = options
                    .id_prefix
                    .as_deref()
                    .unwrap_or_else(|| ShapeKind::from_tag(tag).id_prefix());
                let tree = self.tree.borrow();
                self.ids
                    .next_id_excluding(prefix, |candidate| tree.find_by_id(candidate).is_some())
            }
        };

        let mut tree = self.tree.borrow_mut();
        let node = tree.create_element(self.node, QName::svg(tag));
        tree.set(node, QName::local("id"), id.as_str());
        if let Some(style) = options.style.as_ref().or(fallback_style) {
            tree.set(node, QName::local("style"), style.to_string());
        }
        for (name, value) in geometry {
            tree.set(node, name.clone(), value.as_str());
        }
        for (key, value) in options.extra.iter() {
            if let Some(name) = QName::from_prefixed(key) {
                tree.set(node, name, value);
            }
        }
        debug!(tag, id = %id, "created node");
        node
    }

    fn create_shape(
        &self,
        tag: &str,
        options: &ShapeOptions,
        geometry: Vec<(QName, String)>,
    ) -> Shape {
        let node = self.create_with(tag, options, Some(&*DEFAULT_LINESTYLE), &geometry);
        Shape::new(self.tree.clone(), node)
    }

    pub fn line(&self, from: Point, to: Point, options: &ShapeOptions) -> Shape {
        self.create_shape(
            "line",
            options,
            vec![
                attr("x1", from.x()),
                attr("y1", from.y()),
                attr("x2", to.x()),
                attr("y2", to.y()),
            ],
        )
    }

    pub fn rect(&self, origin: Point, size: Dimension, options: &ShapeOptions) -> Shape {
        self.create_shape(
            "rect",
            options,
            vec![
                attr("x", origin.x()),
                attr("y", origin.y()),
                attr("width", size.width()),
                attr("height", size.height()),
            ],
        )
    }

    pub fn path(&self, d: &str, options: &ShapeOptions) -> Shape {
        self.create_shape(
            "path",
            options,
            vec![
                attr("d", d),
                (QName::inkscape("connector-curvature"), "0".to_string()),
            ],
        )
    }

    pub fn circle(&self, center: Point, r: f64, options: &ShapeOptions) -> Shape {
        self.create_shape(
            "circle",
            options,
            vec![attr("cx", center.x()), attr("cy", center.y()), attr("r", r)],
        )
    }

    pub fn ellipse(&self, center: Point, radius: Dimension, options: &ShapeOptions) -> Shape {
        self.create_shape(
            "ellipse",
            options,
            vec![
                attr("cx", center.x()),
                attr("cy", center.y()),
                attr("rx", radius.width()),
                attr("ry", radius.height()),
            ],
        )
    }

    /// 文本只在显式给出样式时写 `style`，字体参数写成独立的表现属性。
    pub fn text(
        &self,
        content: &str,
        position: Point,
        text: &TextOptions,
        options: &ShapeOptions,
    ) -> Shape {
        let geometry = vec![
            attr("x", position.x()),
            attr("y", position.y()),
            attr("font-size", &text.font_size),
            attr("font-family", &text.font_family),
            attr("fill", &text.fill),
            attr("text-anchor", &text.text_anchor),
        ];
        let node = self.create_with("text", options, None, &geometry);
        self.tree.borrow_mut().append_text(node, content);
        Shape::new(self.tree.clone(), node)
    }

    /// 本组下所有后代 `svg:path`，按文档顺序。
    pub fn paths(&self) -> Vec<Shape> {
        let query = Query::relative().descendant(QName::svg("path"));
        let nodes = query.select(&self.tree.borrow(), self.node);
        nodes
            .into_iter()
            .map(|node| Shape::new(self.tree.clone(), node))
            .collect()
    }

    /// 在本组上执行相对查询。
    pub fn select(&self, expr: &str, namespaces: &Namespaces) -> Result<Vec<Shape>, SvgError> {
        let query = Query::parse(expr, namespaces)?;
        let nodes = query.select(&self.tree.borrow(), self.node);
        Ok(nodes
            .into_iter()
            .map(|node| Shape::new(self.tree.clone(), node))
            .collect())
    }

    /// 把本组从记录的父节点下摘除。
    pub fn delete(&self) -> Result<(), SvgError> {
        let Some(parent) = self.parent else {
            return Err(SvgError::NoParent { id: self.id() });
        };
        self.tree.borrow_mut().detach(parent, self.node)?;
        debug!(id = ?self.id(), "deleted group");
        Ok(())
    }
}

fn attr(name: &str, value: impl ToString) -> (QName, String) {
    (QName::local(name), value.to_string())
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("node", &self.node)
            .field("parent", &self.parent)
            .field("id", &self.id())
            .field("label", &self.label())
            .finish()
    }
}
