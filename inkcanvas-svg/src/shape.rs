use std::fmt;

use crate::SharedTree;
use crate::tree::{NodeId, QName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Line,
    Rect,
    Path,
    Circle,
    Ellipse,
    Text,
    Other,
}

impl ShapeKind {
    /// 由 SVG 元素本地名推断图元类型。
    pub fn from_tag(local: &str) -> Self {
        match local {
            "line" => ShapeKind::Line,
            "rect" => ShapeKind::Rect,
            "path" => ShapeKind::Path,
            "circle" => ShapeKind::Circle,
            "ellipse" => ShapeKind::Ellipse,
            "text" => ShapeKind::Text,
            _ => ShapeKind::Other,
        }
    }

    /// 自动分配 ID 时使用的默认前缀。
    pub fn id_prefix(self) -> &'static str {
        match self {
            ShapeKind::Line => "__inkcanvas_line",
            ShapeKind::Rect => "__inkcanvas_rect",
            ShapeKind::Path => "__inkcanvas_path",
            ShapeKind::Circle => "__inkcanvas_circle",
            ShapeKind::Ellipse => "__inkcanvas_ellipse",
            ShapeKind::Text => "__inkcanvas_text",
            ShapeKind::Other => "__inkcanvas_node",
        }
    }
}

/// 新建或查询得到的图元节点的只读视图。节点被移出文档后视图仍可读，
/// 但不再反映文档内容。
#[derive(Clone)]
pub struct Shape {
    tree: SharedTree,
    node: NodeId,
    kind: ShapeKind,
}

impl Shape {
    pub(crate) fn new(tree: SharedTree, node: NodeId) -> Self {
        let kind = tree
            .borrow()
            .name(node)
            .map(|name| ShapeKind::from_tag(name.local_name()))
            .unwrap_or(ShapeKind::Other);
        Self { tree, node, kind }
    }

    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn id(&self) -> Option<String> {
        self.attribute("id")
    }

    pub fn label(&self) -> Option<String> {
        self.tree
            .borrow()
            .get(self.node, &QName::inkscape("label"))
            .map(str::to_string)
    }

    /// 按 `prefix:local` 形式读取属性，未知前缀返回 `None`。
    pub fn attribute(&self, name: &str) -> Option<String> {
        let name = QName::from_prefixed(name)?;
        self.tree
            .borrow()
            .get(self.node, &name)
            .map(str::to_string)
    }

    pub fn text(&self) -> String {
        self.tree.borrow().text_content(self.node)
    }

    pub fn is_attached(&self) -> bool {
        self.tree.borrow().is_attached(self.node)
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("node", &self.node)
            .field("kind", &self.kind)
            .field("id", &self.id())
            .finish()
    }
}
