//! 基于 arena 的可变 XML 树。节点以 [`NodeId`] 句柄引用，
//! 句柄在整个文档生命周期内保持稳定，被摘除的节点仍留在 arena 中。

use std::fmt;

use crate::error::SvgError;
use crate::namespaces::{INKSCAPE_NS, SODIPODI_NS, SVG_NS, well_known_uri};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// 带命名空间 URI 的限定名。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    namespace: Option<String>,
    local: String,
}

impl QName {
    pub fn new(namespace: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local: local.into(),
        }
    }

    /// 无命名空间的名称，普通 SVG 属性（`id`、`d`、`cx`）都是这种形式。
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(None, local)
    }

    pub fn svg(local: impl Into<String>) -> Self {
        Self::new(Some(SVG_NS), local)
    }

    pub fn inkscape(local: impl Into<String>) -> Self {
        Self::new(Some(INKSCAPE_NS), local)
    }

    pub fn sodipodi(local: impl Into<String>) -> Self {
        Self::new(Some(SODIPODI_NS), local)
    }

    /// 解析 `prefix:local` 形式的名称，仅识别 svg/inkscape/sodipodi/xlink/xml 前缀。
    pub fn from_prefixed(name: &str) -> Option<Self> {
        match name.split_once(':') {
            None => Some(Self::local(name)),
            Some((prefix, local)) => {
                well_known_uri(prefix).map(|uri| Self::new(Some(uri), local))
            }
        }
    }

    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[inline]
    pub fn local_name(&self) -> &str {
        &self.local
    }

    pub fn is(&self, namespace: Option<&str>, local: &str) -> bool {
        self.namespace.as_deref() == namespace && self.local == local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// 元素上显式声明的命名空间（`xmlns` / `xmlns:prefix`）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element {
        name: QName,
        attributes: Vec<Attribute>,
        namespaces: Vec<NamespaceDecl>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Tree {
    pub fn new(root: QName) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.push(NodeKind::element(root), None);
        tree
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    fn push(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    #[inline]
    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn name(&self, node: NodeId) -> Option<&QName> {
        match self.kind(node) {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    #[inline]
    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.kind(node), NodeKind::Element { .. })
    }

    #[inline]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    #[inline]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn element_children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(node)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
    }

    /// 先序遍历 `node` 的全部后代（不含自身），即文档顺序。
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    pub fn attributes(&self, node: NodeId) -> &[Attribute] {
        match self.kind(node) {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn get(&self, node: NodeId, name: &QName) -> Option<&str> {
        self.attributes(node)
            .iter()
            .find(|attr| &attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// 设置属性，已存在时原位替换以保持属性顺序。非元素节点上调用无效。
    pub fn set(&mut self, node: NodeId, name: QName, value: impl Into<String>) {
        let value = value.into();
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[node.0].kind {
            match attributes.iter_mut().find(|attr| attr.name == name) {
                Some(existing) => existing.value = value,
                None => attributes.push(Attribute { name, value }),
            }
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &QName) -> Option<String> {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[node.0].kind {
            let index = attributes.iter().position(|attr| &attr.name == name)?;
            return Some(attributes.remove(index).value);
        }
        None
    }

    pub fn namespace_decls(&self, node: NodeId) -> &[NamespaceDecl] {
        match self.kind(node) {
            NodeKind::Element { namespaces, .. } => namespaces,
            _ => &[],
        }
    }

    pub fn declare_namespace(&mut self, node: NodeId, prefix: Option<&str>, uri: &str) {
        if let NodeKind::Element { namespaces, .. } = &mut self.nodes[node.0].kind {
            let prefix = prefix.map(str::to_string);
            match namespaces.iter_mut().find(|decl| decl.prefix == prefix) {
                Some(decl) => decl.uri = uri.to_string(),
                None => namespaces.push(NamespaceDecl {
                    prefix,
                    uri: uri.to_string(),
                }),
            }
        }
    }

    pub fn create_element(&mut self, parent: NodeId, name: QName) -> NodeId {
        self.push(NodeKind::element(name), Some(parent))
    }

    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()), Some(parent))
    }

    pub fn append_comment(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(text.into()), Some(parent))
    }

    /// 拼接所有后代文本节点的内容。
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let NodeKind::Text(text) = self.kind(node) {
            out.push_str(text);
        }
        for descendant in self.descendants(node) {
            if let NodeKind::Text(text) = self.kind(descendant) {
                out.push_str(text);
            }
        }
        out
    }

    /// 把 `child` 从 `parent` 的子节点列表中摘除。
    pub fn detach(&mut self, parent: NodeId, child: NodeId) -> Result<(), SvgError> {
        let id = self.get(child, &QName::local("id")).map(str::to_string);
        if self.nodes[child.0].parent != Some(parent) {
            return Err(SvgError::Detached { id });
        }
        let siblings = &mut self.nodes[parent.0].children;
        let Some(index) = siblings.iter().position(|node| *node == child) else {
            return Err(SvgError::Detached { id });
        };
        siblings.remove(index);
        self.nodes[child.0].parent = None;
        Ok(())
    }

    /// 节点能否沿父链回到根，即是否仍在文档中。
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// 按 `id` 属性查找文档中的元素。
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        let key = QName::local("id");
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .find(|node| self.get(*node, &key) == Some(id))
    }
}

impl NodeKind {
    fn element(name: QName) -> Self {
        NodeKind::Element {
            name,
            attributes: Vec::new(),
            namespaces: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_detach_children() {
        let mut tree = Tree::new(QName::svg("svg"));
        let root = tree.root();
        let group = tree.create_element(root, QName::svg("g"));
        let path = tree.create_element(group, QName::svg("path"));
        tree.set(path, QName::local("id"), "p1");

        assert_eq!(tree.find_by_id("p1"), Some(path));
        assert_eq!(tree.descendants(root), vec![group, path]);

        tree.detach(root, group).expect("detach group");
        assert!(!tree.is_attached(path));
        assert!(tree.find_by_id("p1").is_none());

        let err = tree.detach(root, group).unwrap_err();
        assert!(matches!(err, SvgError::Detached { .. }));
    }

    #[test]
    fn set_replaces_in_place() {
        let mut tree = Tree::new(QName::svg("svg"));
        let root = tree.root();
        tree.set(root, QName::local("width"), "10mm");
        tree.set(root, QName::local("height"), "20mm");
        tree.set(root, QName::local("width"), "30mm");
        let names: Vec<&str> = tree
            .attributes(root)
            .iter()
            .map(|attr| attr.name.local_name())
            .collect();
        assert_eq!(names, ["width", "height"]);
        assert_eq!(tree.get(root, &QName::local("width")), Some("30mm"));
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let mut tree = Tree::new(QName::svg("svg"));
        let root = tree.root();
        let text = tree.create_element(root, QName::svg("text"));
        tree.append_text(text, "Hello ");
        let span = tree.create_element(text, QName::svg("tspan"));
        tree.append_text(span, "World");
        assert_eq!(tree.text_content(text), "Hello World");
    }

    #[test]
    fn prefixed_attribute_names() {
        assert_eq!(
            QName::from_prefixed("inkscape:label"),
            Some(QName::inkscape("label"))
        );
        assert_eq!(QName::from_prefixed("d"), Some(QName::local("d")));
        assert!(QName::from_prefixed("foo:bar").is_none());
    }
}
