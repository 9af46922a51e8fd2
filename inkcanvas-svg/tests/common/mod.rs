use serde_json::{Value, json};
use inkcanvas_svg::{NodeId, NodeKind, Tree};

/// 把文档树转成便于比较的 JSON：元素名、属性与非空白文本，忽略格式化空白和命名空间声明。
pub fn snapshot(tree: &Tree) -> Value {
    element(tree, tree.root())
}

fn element(tree: &Tree, node: NodeId) -> Value {
    let name = tree
        .name(node)
        .map(|name| name.to_string())
        .unwrap_or_default();
    let mut attributes: Vec<(String, String)> = tree
        .attributes(node)
        .iter()
        .map(|attr| (attr.name.to_string(), attr.value.clone()))
        .collect();
    attributes.sort();
    let children: Vec<Value> = tree
        .children(node)
        .iter()
        .filter_map(|child| match tree.kind(*child) {
            NodeKind::Element { .. } => Some(element(tree, *child)),
            NodeKind::Text(text) if !text.trim().is_empty() => Some(json!({ "text": text })),
            NodeKind::Text(_) => None,
            NodeKind::Comment(text) => Some(json!({ "comment": text })),
        })
        .collect();
    json!({
        "name": name,
        "attributes": attributes,
        "children": children,
    })
}
