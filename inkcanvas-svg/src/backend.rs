use std::borrow::Cow;

use quick_xml::Writer;
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName as XmlName;

use crate::error::SvgError;
use crate::namespaces::{XML_NS, well_known_prefix};
use crate::tree::{NodeId, NodeKind, QName, Tree};

/// 文档层与具体 XML 库之间的边界：解析为 [`Tree`]，以及把 [`Tree`] 序列化回文本。
/// 节点级操作（取值、赋值、建子节点、摘除）都在 [`Tree`] 上完成。
pub trait XmlBackend {
    fn parse(&self, source: &str, origin: &str) -> Result<Tree, SvgError>;
    fn serialize(&self, tree: &Tree, pretty: bool) -> Result<String, SvgError>;
}

/// 以 `roxmltree` 解析、`quick-xml` 写出的实现。
#[derive(Debug, Clone, Copy, Default)]
pub struct RoxmlBackend;

impl XmlBackend for RoxmlBackend {
    fn parse(&self, source: &str, origin: &str) -> Result<Tree, SvgError> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let document = roxmltree::Document::parse_with_options(source, options).map_err(
            |source| SvgError::ParseError {
                origin: origin.to_string(),
                source,
            },
        )?;
        let source_root = document.root_element();
        let mut tree = Tree::new(qname_of(source_root));
        let root = tree.root();
        copy_element(&mut tree, root, source_root, None);
        Ok(tree)
    }

    fn serialize(&self, tree: &Tree, pretty: bool) -> Result<String, SvgError> {
        let mut serializer = Serializer {
            tree,
            writer: Writer::new(Vec::new()),
            pretty,
            scope: Vec::new(),
        };
        serializer
            .writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))?;
        serializer.newline(0)?;
        serializer.write_element(tree.root(), 0)?;
        serializer.newline(0)?;
        String::from_utf8(serializer.writer.into_inner())
            .map_err(|err| SvgError::InvalidDocument(err.to_string()))
    }
}

fn qname_of(node: roxmltree::Node<'_, '_>) -> QName {
    let tag = node.tag_name();
    QName::new(tag.namespace(), tag.name())
}

fn copy_element(
    tree: &mut Tree,
    target: NodeId,
    source: roxmltree::Node<'_, '_>,
    parent: Option<roxmltree::Node<'_, '_>>,
) {
    // roxmltree 给出的是作用域内的全部命名空间，这里只保留本元素新引入的声明。
    for ns in source.namespaces() {
        if ns.name() == Some("xml") {
            continue;
        }
        let inherited = parent.is_some_and(|parent| {
            parent
                .namespaces()
                .any(|outer| outer.name() == ns.name() && outer.uri() == ns.uri())
        });
        if !inherited {
            tree.declare_namespace(target, ns.name(), ns.uri());
        }
    }
    for attr in source.attributes() {
        tree.set(target, QName::new(attr.namespace(), attr.name()), attr.value());
    }
    for child in source.children() {
        if child.is_element() {
            let node = tree.create_element(target, qname_of(child));
            copy_element(tree, node, child, Some(source));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                tree.append_text(target, text);
            }
        } else if child.is_comment() {
            if let Some(text) = child.text() {
                tree.append_comment(target, text);
            }
        }
    }
}

struct Serializer<'t> {
    tree: &'t Tree,
    writer: Writer<Vec<u8>>,
    pretty: bool,
    /// 当前作用域内的命名空间绑定，越靠后越内层。
    scope: Vec<(Option<String>, String)>,
}

impl Serializer<'_> {
    fn write_element(&mut self, node: NodeId, depth: usize) -> Result<(), SvgError> {
        let tree = self.tree;
        let Some(name) = tree.name(node) else {
            return Err(SvgError::InvalidDocument(format!(
                "node {} is not an element",
                node.index()
            )));
        };
        let scope_len = self.scope.len();
        let mut declared: Vec<(Option<String>, String)> = tree
            .namespace_decls(node)
            .iter()
            .map(|decl| (decl.prefix.clone(), decl.uri.clone()))
            .collect();
        self.scope.extend(declared.iter().cloned());

        let tag = self.element_tag(name, &mut declared);
        let attributes: Vec<(String, &str)> = tree
            .attributes(node)
            .iter()
            .map(|attr| (self.attribute_key(&attr.name, &mut declared), attr.value.as_str()))
            .collect();

        let mut start = BytesStart::new(tag.as_str());
        for (prefix, uri) in &declared {
            let key = match prefix {
                Some(prefix) => format!("xmlns:{prefix}"),
                None => "xmlns".to_string(),
            };
            start.push_attribute((key.as_str(), uri.as_str()));
        }
        for (key, value) in &attributes {
            start.push_attribute(Attribute {
                key: XmlName(key.as_bytes()),
                value: Cow::Owned(escape_attribute(value).into_bytes()),
            });
        }

        let children = tree.children(node);
        if children.is_empty() {
            self.writer.write_event(Event::Empty(start))?;
        } else {
            self.writer.write_event(Event::Start(start))?;
            // 含文本的元素保持原样，避免改变字符数据
            let indent = self.pretty
                && children
                    .iter()
                    .all(|child| !matches!(tree.kind(*child), NodeKind::Text(_)));
            for child in children {
                if indent {
                    self.newline(depth + 1)?;
                }
                match tree.kind(*child) {
                    NodeKind::Element { .. } => self.write_element(*child, depth + 1)?,
                    NodeKind::Text(text) => {
                        self.writer.write_event(Event::Text(BytesText::new(text)))?;
                    }
                    NodeKind::Comment(text) => {
                        self.writer
                            .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?;
                    }
                }
            }
            if indent {
                self.newline(depth)?;
            }
            self.writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
        }

        self.scope.truncate(scope_len);
        Ok(())
    }

    fn newline(&mut self, depth: usize) -> Result<(), SvgError> {
        let text = format!("\n{}", "  ".repeat(depth));
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(text)))?;
        Ok(())
    }

    fn binding(&self, prefix: Option<&str>) -> Option<&str> {
        self.scope
            .iter()
            .rev()
            .find(|(bound, _)| bound.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// 查找当前绑定到 `uri` 且未被内层遮蔽的前缀。
    fn prefix_for(&self, uri: &str, allow_default: bool) -> Option<Option<String>> {
        if allow_default && self.binding(None) == Some(uri) {
            return Some(None);
        }
        self.scope
            .iter()
            .rev()
            .filter(|(prefix, bound)| bound == uri && (allow_default || prefix.is_some()))
            .find(|(prefix, _)| self.binding(prefix.as_deref()) == Some(uri))
            .map(|(prefix, _)| prefix.clone())
    }

    fn declare(
        &mut self,
        uri: &str,
        allow_default: bool,
        declared: &mut Vec<(Option<String>, String)>,
    ) -> Option<String> {
        let prefix = if allow_default && self.binding(None).is_none() {
            None
        } else {
            let mut candidate = well_known_prefix(uri).map(str::to_string);
            let mut counter = 0;
            while candidate
                .as_deref()
                .is_none_or(|prefix| self.binding(Some(prefix)).is_some())
            {
                candidate = Some(format!("ns{counter}"));
                counter += 1;
            }
            candidate
        };
        self.scope.push((prefix.clone(), uri.to_string()));
        declared.push((prefix.clone(), uri.to_string()));
        prefix
    }

    fn element_tag(
        &mut self,
        name: &QName,
        declared: &mut Vec<(Option<String>, String)>,
    ) -> String {
        let Some(uri) = name.namespace() else {
            return name.local_name().to_string();
        };
        let prefix = match self.prefix_for(uri, true) {
            Some(prefix) => prefix,
            None => self.declare(uri, true, declared),
        };
        qualify(prefix.as_deref(), name.local_name())
    }

    fn attribute_key(
        &mut self,
        name: &QName,
        declared: &mut Vec<(Option<String>, String)>,
    ) -> String {
        match name.namespace() {
            None => name.local_name().to_string(),
            Some(XML_NS) => format!("xml:{}", name.local_name()),
            Some(uri) => {
                let prefix = match self.prefix_for(uri, false) {
                    Some(prefix) => prefix,
                    None => self.declare(uri, false, declared),
                };
                qualify(prefix.as_deref(), name.local_name())
            }
        }
    }
}

/// 属性值在重新解析时会把换行和制表符规范化为空格，需写成字符引用。
fn escape_attribute(value: &str) -> String {
    escape(value)
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;")
}

fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}
