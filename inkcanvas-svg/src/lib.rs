//! Inkscape 风格 SVG 文档模型：加载、按标签/图层查询分组、在分组下创建图元并写回文件。

use std::cell::RefCell;
use std::rc::Rc;

pub mod backend;
pub mod canvas;
pub mod error;
pub mod group;
pub mod namespaces;
pub mod query;
pub mod shape;
pub mod tree;

pub use backend::{RoxmlBackend, XmlBackend};
pub use canvas::{BLANK_TEMPLATE, Canvas, RenderOutcome};
pub use error::SvgError;
pub use group::{ExtraAttributes, Group, ShapeOptions, TextOptions};
pub use namespaces::Namespaces;
pub use query::{Predicate, Query};
pub use shape::{Shape, ShapeKind};
pub use tree::{NodeId, NodeKind, QName, Tree};

/// 文档树在 [`Canvas`]、[`Group`] 与 [`Shape`] 之间共享。
pub(crate) type SharedTree = Rc<RefCell<Tree>>;
