use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use inkcanvas_core::geometry::BBox;
use inkcanvas_core::ids::IdAllocator;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::SharedTree;
use crate::backend::{RoxmlBackend, XmlBackend};
use crate::error::SvgError;
use crate::group::Group;
use crate::namespaces::Namespaces;
use crate::query::{Predicate, Query};
use crate::shape::Shape;
use crate::tree::{NodeId, QName, Tree};

/// 内置的 A4 空白模板。
pub const BLANK_TEMPLATE: &str = include_str!("../templates/blank.svg");

/// 尺寸属性：数值前缀 + 可选的两字母单位，例如 `210mm`。
static SIZE_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)\s*([A-Za-z]{2})?\s*$").ok()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Written(PathBuf),
    /// 目标已存在且未要求覆盖，未写入。
    Skipped(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Metadata {
    width: Option<f64>,
    height: Option<f64>,
    units: Option<String>,
    view_box: Option<BBox>,
}

impl Metadata {
    fn read(tree: &Tree) -> Self {
        let root = tree.root();
        let width = tree.get(root, &QName::local("width")).and_then(parse_size);
        let height = tree.get(root, &QName::local("height")).and_then(parse_size);
        let view_box = tree
            .get(root, &QName::local("viewBox"))
            .and_then(parse_view_box);
        Self {
            width: width.as_ref().map(|(value, _)| *value),
            height: height.map(|(value, _)| value),
            units: width.and_then(|(_, unit)| unit),
            view_box,
        }
    }
}

fn parse_size(raw: &str) -> Option<(f64, Option<String>)> {
    let pattern = SIZE_PATTERN.as_ref()?;
    let captures = pattern.captures(raw)?;
    let value = captures.get(1)?.as_str().parse().ok()?;
    let unit = captures.get(2).map(|unit| unit.as_str().to_string());
    Some((value, unit))
}

fn parse_view_box(raw: &str) -> Option<BBox> {
    let values: Vec<f64> = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match values.as_slice() {
        [x, y, width, height] => Some(BBox::from_tuple((*x, *y, *width, *height))),
        _ => None,
    }
}

/// 一份 SVG 文档。
///
/// 独占文档树，并为每个查询到的 `svg:g` 节点缓存唯一的 [`Group`]，
/// 缓存只属于本文档。
pub struct Canvas {
    tree: SharedTree,
    backend: Box<dyn XmlBackend>,
    ids: Arc<IdAllocator>,
    groups: RefCell<HashMap<NodeId, Rc<Group>>>,
    metadata: Metadata,
    source: Option<PathBuf>,
    pretty: bool,
}

impl Canvas {
    /// 以指定后端解析文档。
    pub fn parse_with(
        backend: Box<dyn XmlBackend>,
        source: &str,
        origin: &str,
    ) -> Result<Self, SvgError> {
        let tree = backend.parse(source, origin)?;
        let root_ok = tree
            .name(tree.root())
            .is_some_and(|name| name.local_name() == "svg");
        if !root_ok {
            return Err(SvgError::InvalidDocument(format!(
                "{origin}: root element is not <svg>"
            )));
        }
        let metadata = Metadata::read(&tree);
        debug!(origin, width = ?metadata.width, height = ?metadata.height, "parsed canvas");
        Ok(Self {
            tree: Rc::new(RefCell::new(tree)),
            backend,
            ids: IdAllocator::global(),
            groups: RefCell::new(HashMap::new()),
            metadata,
            source: None,
            pretty: true,
        })
    }

    pub fn from_svg_str(source: &str) -> Result<Self, SvgError> {
        Self::parse_with(Box::new(RoxmlBackend), source, "<memory>")
    }

    /// 基于内置空白模板新建文档。
    pub fn blank() -> Result<Self, SvgError> {
        Self::parse_with(Box::new(RoxmlBackend), BLANK_TEMPLATE, "<blank template>")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SvgError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| SvgError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut canvas =
            Self::parse_with(Box::new(RoxmlBackend), &source, &path.display().to_string())?;
        canvas.source = Some(path.to_path_buf());
        info!(path = %path.display(), "loaded canvas");
        Ok(canvas)
    }

    /// 给出路径时加载文件，否则使用空白模板。
    pub fn open(path: Option<&Path>) -> Result<Self, SvgError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::blank(),
        }
    }

    /// 替换 ID 分配器，测试中可注入确定性的分配器。
    pub fn with_id_allocator(mut self, ids: Arc<IdAllocator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn tree(&self) -> Ref<'_, Tree> {
        self.tree.borrow()
    }

    pub fn width(&self) -> Option<f64> {
        self.metadata.width
    }

    pub fn height(&self) -> Option<f64> {
        self.metadata.height
    }

    /// 宽度属性的单位，例如 `mm`。
    pub fn units(&self) -> Option<&str> {
        self.metadata.units.as_deref()
    }

    pub fn view_box(&self) -> Option<BBox> {
        self.metadata.view_box
    }

    /// viewBox 宽度与页面宽度之比。
    pub fn scale(&self) -> Option<f64> {
        let view_box = self.metadata.view_box?;
        let width = self.metadata.width?;
        (width != 0.0).then(|| view_box.width() / width)
    }

    fn root_attribute(&self, name: &QName) -> Option<String> {
        let tree = self.tree.borrow();
        tree.get(tree.root(), name).map(str::to_string)
    }

    pub fn version(&self) -> Option<String> {
        self.root_attribute(&QName::local("version"))
    }

    pub fn inkscape_version(&self) -> Option<String> {
        self.root_attribute(&QName::inkscape("version"))
    }

    pub fn docname(&self) -> Option<String> {
        self.root_attribute(&QName::sodipodi("docname"))
    }

    pub fn set_docname(&self, docname: &str) {
        let mut tree = self.tree.borrow_mut();
        let root = tree.root();
        tree.set(root, QName::sodipodi("docname"), docname);
    }

    /// 执行查询表达式，返回匹配节点。
    pub fn select(&self, expr: &str, namespaces: &Namespaces) -> Result<Vec<NodeId>, SvgError> {
        let query = Query::parse(expr, namespaces)?;
        let tree = self.tree.borrow();
        Ok(query.select(&tree, tree.root()))
    }

    fn run(&self, query: &Query) -> Vec<NodeId> {
        let tree = self.tree.borrow();
        query.select(&tree, tree.root())
    }

    /// 返回节点对应的缓存 [`Group`]，首次访问时创建。
    fn wrap(&self, node: NodeId) -> Rc<Group> {
        let mut cache = self.groups.borrow_mut();
        let group = cache.entry(node).or_insert_with(|| {
            let parent = self.tree.borrow().parent(node);
            Rc::new(Group::new(
                self.tree.clone(),
                node,
                parent,
                Arc::clone(&self.ids),
            ))
        });
        Rc::clone(group)
    }

    fn group_query(layer_only: bool) -> Query {
        let query = Query::root().descendant(QName::svg("g"));
        if layer_only {
            query.with(Predicate::equals(QName::inkscape("groupmode"), "layer"))
        } else {
            query
        }
    }

    /// 文档中所有 `svg:g`，按文档顺序。
    pub fn groups(&self) -> Vec<Rc<Group>> {
        self.run(&Self::group_query(false))
            .into_iter()
            .map(|node| self.wrap(node))
            .collect()
    }

    /// 按标签查找分组；没有标签匹配时把 `name` 当作 ID 重试，
    /// 但只接受没有标签的元素。
    pub fn group(&self, name: &str, layer_only: bool) -> Option<Rc<Group>> {
        let query = Self::group_query(layer_only)
            .with(Predicate::equals(QName::inkscape("label"), name));
        if let Some(node) = self.run(&query).into_iter().next() {
            return Some(self.wrap(node));
        }
        let fallback = self.group_by_id(name, layer_only)?;
        if fallback.label().is_some() {
            debug!(name, "id fallback matched a labelled group, ignored");
            return None;
        }
        Some(fallback)
    }

    pub fn group_by_id(&self, id: &str, layer_only: bool) -> Option<Rc<Group>> {
        let query =
            Self::group_query(layer_only).with(Predicate::equals(QName::local("id"), id));
        self.run(&query)
            .into_iter()
            .next()
            .map(|node| self.wrap(node))
    }

    pub fn layers(&self) -> Vec<Rc<Group>> {
        self.run(&Self::group_query(true))
            .into_iter()
            .map(|node| self.wrap(node))
            .collect()
    }

    /// 图层名不保证唯一，返回第一个匹配。
    pub fn layer(&self, name: &str) -> Option<Rc<Group>> {
        self.group(name, true)
    }

    pub fn layer_by_id(&self, id: &str) -> Option<Rc<Group>> {
        self.group_by_id(id, true)
    }

    /// 按 ID 取得任意元素的只读视图。
    pub fn element_by_id(&self, id: &str) -> Option<Shape> {
        let node = self.tree.borrow().find_by_id(id)?;
        Some(Shape::new(self.tree.clone(), node))
    }

    /// 读取流式文本 `flowRoot/flowPara` 的段落，没有时退回 `text/tspan`。
    pub fn get_text(&self, id: &str) -> Vec<String> {
        let lookups = [("flowRoot", "flowPara"), ("text", "tspan")];
        let tree = self.tree.borrow();
        for (container, part) in lookups {
            let query = Query::root()
                .descendant(QName::svg(container))
                .with(Predicate::equals(QName::local("id"), id))
                .child(QName::svg(part));
            let nodes = query.select(&tree, tree.root());
            if !nodes.is_empty() {
                return nodes
                    .into_iter()
                    .map(|node| tree.text_content(node))
                    .collect();
            }
        }
        Vec::new()
    }

    pub fn to_svg_string(&self) -> Result<String, SvgError> {
        self.backend.serialize(&self.tree.borrow(), self.pretty)
    }

    /// 序列化到 `out`。目标已存在且 `overwrite` 为假时只记录警告，不写入。
    pub fn render(
        &self,
        out: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<RenderOutcome, SvgError> {
        let out = out.as_ref();
        if out.exists() && !overwrite {
            warn!(path = %out.display(), "output file exists, skip rendering");
            return Ok(RenderOutcome::Skipped(out.to_path_buf()));
        }
        let text = self.to_svg_string()?;
        fs::write(out, text).map_err(|source| SvgError::WriteError {
            path: out.to_path_buf(),
            source,
        })?;
        info!(path = %out.display(), "rendered canvas");
        Ok(RenderOutcome::Written(out.to_path_buf()))
    }
}

impl fmt::Display for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.to_svg_string().map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("source", &self.source)
            .field("metadata", &self.metadata)
            .field("cached_groups", &self.groups.borrow().len())
            .finish()
    }
}
