//! 命名空间感知的路径查询，覆盖 XPath 中文档操作需要的子集：
//! `/a/b`、`//a`、`./a`、`.//a`、`..`、`*`，以及谓词
//! `[@attr]`、`[@attr='v']`、`[not(@attr)]`，谓词可用 `and` 连接。
//! 无前缀的名称不属于任何命名空间。

use std::collections::{HashMap, HashSet};

use crate::error::SvgError;
use crate::namespaces::Namespaces;
use crate::tree::{NodeId, QName, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    Parent,
    Current,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Name(QName),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Has(QName),
    Equals(QName, String),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn has(name: QName) -> Self {
        Predicate::Has(name)
    }

    pub fn equals(name: QName, value: impl Into<String>) -> Self {
        Predicate::Equals(name, value.into())
    }

    pub fn missing(name: QName) -> Self {
        Predicate::Not(Box::new(Predicate::Has(name)))
    }

    fn test(&self, tree: &Tree, node: NodeId) -> bool {
        match self {
            Predicate::Has(name) => tree.get(node, name).is_some(),
            Predicate::Equals(name, value) => tree.get(node, name) == Some(value.as_str()),
            Predicate::Not(inner) => !inner.test(tree, node),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NameTest,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Context {
    Document,
    Node(NodeId),
}

impl Step {
    fn candidates(&self, tree: &Tree, context: Context) -> Vec<Context> {
        match (self.axis, context) {
            (Axis::Child, Context::Document) => vec![Context::Node(tree.root())],
            (Axis::Child, Context::Node(node)) => {
                tree.element_children(node).map(Context::Node).collect()
            }
            (Axis::Descendant, Context::Document) => std::iter::once(tree.root())
                .chain(tree.descendants(tree.root()))
                .filter(|node| tree.is_element(*node))
                .map(Context::Node)
                .collect(),
            (Axis::Descendant, Context::Node(node)) => tree
                .descendants(node)
                .into_iter()
                .filter(|node| tree.is_element(*node))
                .map(Context::Node)
                .collect(),
            (Axis::Parent, Context::Document) => Vec::new(),
            (Axis::Parent, Context::Node(node)) if node == tree.root() => vec![Context::Document],
            (Axis::Parent, Context::Node(node)) => {
                tree.parent(node).map(Context::Node).into_iter().collect()
            }
            (Axis::Current, context) => vec![context],
        }
    }

    fn matches(&self, tree: &Tree, context: Context) -> bool {
        let Context::Node(node) = context else {
            return self.test == NameTest::Any && self.predicates.is_empty();
        };
        let name_ok = match (&self.test, tree.name(node)) {
            (_, None) => false,
            (NameTest::Any, Some(_)) => true,
            (NameTest::Name(expected), Some(actual)) => expected == actual,
        };
        name_ok && self.predicates.iter().all(|pred| pred.test(tree, node))
    }
}

/// 已解析的查询。可由 [`Query::parse`] 从表达式得到，也可用构建方法直接组装，
/// 后者不涉及引号转义，适合拼接用户提供的名称。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    absolute: bool,
    steps: Vec<Step>,
}

impl Query {
    /// 从文档根开始的查询。
    pub fn root() -> Self {
        Self {
            absolute: true,
            steps: Vec::new(),
        }
    }

    /// 相对于调用 [`Query::select`] 时传入的上下文节点。
    pub fn relative() -> Self {
        Self::default()
    }

    pub fn child(self, name: QName) -> Self {
        self.step(Axis::Child, NameTest::Name(name))
    }

    pub fn descendant(self, name: QName) -> Self {
        self.step(Axis::Descendant, NameTest::Name(name))
    }

    pub fn any_child(self) -> Self {
        self.step(Axis::Child, NameTest::Any)
    }

    pub fn parent(self) -> Self {
        self.step(Axis::Parent, NameTest::Any)
    }

    /// 给最后一步追加谓词；没有任何步骤时忽略。
    pub fn with(mut self, predicate: Predicate) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.predicates.push(predicate);
        }
        self
    }

    fn step(mut self, axis: Axis, test: NameTest) -> Self {
        self.steps.push(Step {
            axis,
            test,
            predicates: Vec::new(),
        });
        self
    }

    pub fn parse(expr: &str, namespaces: &Namespaces) -> Result<Self, SvgError> {
        Parser {
            expr,
            pos: 0,
            namespaces,
        }
        .parse()
    }

    /// 执行查询，结果按文档顺序排列且不含重复节点。
    pub fn select(&self, tree: &Tree, context: NodeId) -> Vec<NodeId> {
        let mut current = if self.absolute {
            vec![Context::Document]
        } else {
            vec![Context::Node(context)]
        };
        for step in &self.steps {
            let mut next = Vec::new();
            let mut seen = HashSet::new();
            for ctx in &current {
                for candidate in step.candidates(tree, *ctx) {
                    if step.matches(tree, candidate) && seen.insert(candidate) {
                        next.push(candidate);
                    }
                }
            }
            if current.len() > 1 {
                sort_document_order(tree, &mut next);
            }
            current = next;
        }
        current
            .into_iter()
            .filter_map(|ctx| match ctx {
                Context::Node(node) => Some(node),
                Context::Document => None,
            })
            .collect()
    }

    pub fn first(&self, tree: &Tree, context: NodeId) -> Option<NodeId> {
        self.select(tree, context).into_iter().next()
    }
}

fn sort_document_order(tree: &Tree, nodes: &mut [Context]) {
    let order: HashMap<NodeId, usize> = std::iter::once(tree.root())
        .chain(tree.descendants(tree.root()))
        .enumerate()
        .map(|(index, node)| (node, index + 1))
        .collect();
    nodes.sort_by_key(|ctx| match ctx {
        Context::Document => 0,
        Context::Node(node) => order.get(node).copied().unwrap_or(usize::MAX),
    });
}

struct Parser<'a> {
    expr: &'a str,
    pos: usize,
    namespaces: &'a Namespaces,
}

impl<'a> Parser<'a> {
    fn parse(mut self) -> Result<Query, SvgError> {
        self.skip_ws();
        let mut query = Query::relative();
        let mut axis = if self.eat("//") {
            query.absolute = true;
            Axis::Descendant
        } else if self.eat("/") {
            query.absolute = true;
            Axis::Child
        } else if self.eat(".//") {
            Axis::Descendant
        } else {
            self.eat("./");
            Axis::Child
        };

        loop {
            let step = self.parse_step(axis)?;
            query.steps.push(step);
            self.skip_ws();
            if self.at_end() {
                break;
            }
            axis = if self.eat("//") {
                Axis::Descendant
            } else if self.eat("/") {
                Axis::Child
            } else {
                return Err(self.error("expected `/` or end of expression"));
            };
        }
        Ok(query)
    }

    fn parse_step(&mut self, axis: Axis) -> Result<Step, SvgError> {
        self.skip_ws();
        if self.eat("..") {
            if axis == Axis::Descendant {
                return Err(self.error("`..` cannot follow `//`"));
            }
            return Ok(Step {
                axis: Axis::Parent,
                test: NameTest::Any,
                predicates: Vec::new(),
            });
        }
        if self.eat(".") {
            return Ok(Step {
                axis: Axis::Current,
                test: NameTest::Any,
                predicates: Vec::new(),
            });
        }
        let test = if self.eat("*") {
            NameTest::Any
        } else {
            NameTest::Name(self.parse_name(true)?)
        };
        let mut predicates = Vec::new();
        while self.eat("[") {
            loop {
                self.skip_ws();
                predicates.push(self.parse_term()?);
                self.skip_ws();
                if !self.eat("and") {
                    break;
                }
            }
            self.skip_ws();
            if !self.eat("]") {
                return Err(self.error("expected `]`"));
            }
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_term(&mut self) -> Result<Predicate, SvgError> {
        if self.eat("not(") {
            self.skip_ws();
            let inner = self.parse_term()?;
            self.skip_ws();
            if !self.eat(")") {
                return Err(self.error("expected `)`"));
            }
            return Ok(Predicate::Not(Box::new(inner)));
        }
        if !self.eat("@") {
            return Err(self.error("expected `@attribute` or `not(...)`"));
        }
        let name = self.parse_name(false)?;
        self.skip_ws();
        if self.eat("=") {
            self.skip_ws();
            let value = self.parse_literal()?;
            Ok(Predicate::Equals(name, value))
        } else {
            Ok(Predicate::Has(name))
        }
    }

    /// 元素名与属性名都允许 `prefix:local`；前缀必须出现在映射表中。
    fn parse_name(&mut self, element: bool) -> Result<QName, SvgError> {
        let rest = self.rest();
        let starts_ok = rest
            .chars()
            .next()
            .is_some_and(|ch| ch.is_alphabetic() || ch == '_');
        if !starts_ok {
            return Err(self.error(if element {
                "expected element name"
            } else {
                "expected attribute name"
            }));
        }
        let len = rest
            .find(|ch: char| !(ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | ':')))
            .unwrap_or(rest.len());
        let raw = &rest[..len];
        self.pos += len;
        match raw.split_once(':') {
            None => Ok(QName::local(raw)),
            Some((prefix, local)) => {
                let Some(uri) = self.namespaces.resolve(prefix) else {
                    return Err(self.error(&format!("unknown namespace prefix `{prefix}`")));
                };
                if local.is_empty() || local.contains(':') {
                    return Err(self.error(&format!("malformed name `{raw}`")));
                }
                Ok(QName::new(Some(uri), local))
            }
        }
    }

    fn parse_literal(&mut self) -> Result<String, SvgError> {
        let rest = self.rest();
        let Some(quote) = rest.chars().next().filter(|ch| *ch == '\'' || *ch == '"') else {
            return Err(self.error("expected quoted string"));
        };
        let body = &rest[1..];
        let Some(end) = body.find(quote) else {
            return Err(self.error("unterminated string"));
        };
        let value = body[..end].to_string();
        self.pos += end + 2;
        Ok(value)
    }

    fn rest(&self) -> &'a str {
        &self.expr[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.expr.len()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.expr.len() - trimmed.len();
    }

    fn error(&self, message: &str) -> SvgError {
        SvgError::InvalidQuery {
            expr: self.expr.to_string(),
            message: format!("{message} at offset {}", self.pos),
        }
    }
}
