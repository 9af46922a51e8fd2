mod common;

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use inkcanvas_core::geometry::{Dimension, Point};
use inkcanvas_core::ids::IdAllocator;
use inkcanvas_core::style::{DEFAULT_LINESTYLE, Style};
use inkcanvas_svg::{
    Canvas, ExtraAttributes, Namespaces, RenderOutcome, ShapeKind, ShapeOptions, SvgError,
    TextOptions,
};
use common::snapshot;

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

fn graphic() -> Canvas {
    Canvas::load(fixture("graphic.svg")).expect("读取 graphic.svg 失败")
}

fn ids_of(groups: &[Rc<inkcanvas_svg::Group>]) -> Vec<String> {
    groups
        .iter()
        .map(|group| group.id().unwrap_or_default())
        .collect()
}

#[test]
fn blank_template_metadata() {
    let canvas = Canvas::blank().expect("空白模板");
    assert_eq!(canvas.width(), Some(210.0));
    assert_eq!(canvas.height(), Some(297.0));
    assert_eq!(canvas.units(), Some("mm"));
    assert_eq!(
        canvas.view_box().map(|bbox| bbox.to_tuple()),
        Some((0.0, 0.0, 840.0, 1188.0))
    );
    assert_eq!(canvas.scale(), Some(4.0));
    assert_eq!(canvas.version().as_deref(), Some("1.1"));
    assert_eq!(
        canvas.inkscape_version().as_deref(),
        Some("1.0.1 (3bc2e813f5, 2020-09-07)")
    );
    assert_eq!(canvas.docname().as_deref(), Some("blank.svg"));

    let layers = canvas.layers();
    assert_eq!(ids_of(&layers), ["layer1"]);
    assert_eq!(layers[0].label().as_deref(), Some("Layer 1"));
    assert!(layers[0].is_layer());
}

#[test]
fn set_docname_is_serialized() {
    let canvas = Canvas::blank().expect("空白模板");
    canvas.set_docname("report.svg");
    assert_eq!(canvas.docname().as_deref(), Some("report.svg"));
    let text = canvas.to_svg_string().expect("序列化");
    assert!(text.contains("sodipodi:docname=\"report.svg\""));
}

#[test]
fn groups_are_listed_in_document_order() {
    let canvas = graphic();
    assert_eq!(
        ids_of(&canvas.groups()),
        ["g886", "layer2", "g855", "layerManual", "g841", "g837"]
    );
    assert_eq!(ids_of(&canvas.layers()), ["layer2", "layerManual"]);
    assert_eq!(canvas.scale(), Some(1.0));
}

#[test]
fn group_lookup_by_label_and_id() {
    let canvas = graphic();

    let shape = canvas.group("complex shape 1", false).expect("按标签查找");
    assert_eq!(shape.id().as_deref(), Some("g837"));
    assert!(canvas.group("nonexistent", false).is_none());

    let by_id = canvas.group_by_id("g855", false).expect("按 ID 查找");
    assert!(by_id.label().is_none());
    let fallback = canvas.group("g855", false).expect("无标签分组按 ID 回退");
    assert!(Rc::ptr_eq(&by_id, &fallback));

    // g886 有自己的标签，不能借 ID 冒充
    assert!(canvas.group("g886", false).is_none());
    assert!(canvas.group_by_id("g886", false).is_some());
}

#[test]
fn layer_queries_require_layer_mode() {
    let canvas = graphic();
    let layer = canvas.layer("Layer 2").expect("Layer 2");
    assert_eq!(layer.id().as_deref(), Some("layer2"));
    assert_eq!(
        canvas.layer("Layer 1").and_then(|layer| layer.id()).as_deref(),
        Some("layerManual")
    );
    assert!(canvas.layer("complex shape 1").is_none());
    assert!(canvas.layer_by_id("g837").is_none());
    assert!(canvas.layer_by_id("layerManual").is_some());
}

#[test]
fn repeated_queries_return_the_same_group() {
    let canvas = graphic();
    let first = canvas.group("complex shape 1", false).expect("分组");
    let second = canvas.group_by_id("g837", false).expect("分组");
    let listed = canvas.groups().pop().expect("分组列表");
    assert!(Rc::ptr_eq(&first, &second));
    assert!(Rc::ptr_eq(&first, &listed));

    let other = graphic();
    let foreign = other.group("complex shape 1", false).expect("分组");
    assert!(!Rc::ptr_eq(&first, &foreign));
}

#[test]
fn select_with_expression() {
    let canvas = graphic();
    let nodes = canvas
        .select(
            "//svg:g[@inkscape:groupmode='layer']/svg:g[not(@inkscape:label)]",
            &Namespaces::inkscape(),
        )
        .expect("查询");
    let tree = canvas.tree();
    let ids: Vec<&str> = nodes
        .iter()
        .filter_map(|node| tree.get(*node, &inkcanvas_svg::QName::local("id")))
        .collect();
    assert_eq!(ids, ["g855", "g841"]);

    let err = canvas.select("//svg:g[", &Namespaces::inkscape()).unwrap_err();
    assert!(matches!(err, SvgError::InvalidQuery { .. }));
}

#[test]
fn paths_scan_descendants() {
    let canvas = graphic();
    let layer = canvas.layer("Layer 1").expect("图层");
    let ids: Vec<String> = layer
        .paths()
        .iter()
        .filter_map(|shape| shape.id())
        .collect();
    assert_eq!(ids, ["path833", "path835"]);
    assert!(layer.paths().iter().all(|shape| shape.kind() == ShapeKind::Path));
}

#[test]
fn shapes_receive_allocated_ids_and_default_style() {
    let canvas = Canvas::blank()
        .expect("空白模板")
        .with_id_allocator(Arc::new(IdAllocator::starting_at(1)));
    let layer = canvas.layer("Layer 1").expect("图层");

    let circle = layer.circle(Point::new(200.0, 150.0), 0.5, &ShapeOptions::new());
    assert_eq!(circle.id().as_deref(), Some("__inkcanvas_circle_1"));
    assert_eq!(circle.kind(), ShapeKind::Circle);
    assert_eq!(circle.attribute("cx").as_deref(), Some("200"));
    assert_eq!(circle.attribute("r").as_deref(), Some("0.5"));
    assert_eq!(circle.attribute("style"), Some(DEFAULT_LINESTYLE.to_string()));

    let line = layer.line(
        Point::new(0.0, 0.0),
        Point::new(10.0, 20.0),
        &ShapeOptions::new(),
    );
    assert_eq!(line.id().as_deref(), Some("__inkcanvas_line_2"));
    assert_eq!(line.attribute("y2").as_deref(), Some("20"));

    let rect = layer.rect(
        Point::new(1.0, 2.0),
        Dimension::new(30.0, 40.0),
        &ShapeOptions::new().with_id_prefix("box"),
    );
    assert_eq!(rect.id().as_deref(), Some("box_3"));
    assert_eq!(rect.attribute("height").as_deref(), Some("40"));

    let path = layer.path(
        "M 0 0 L 10 10",
        &ShapeOptions::new()
            .with_id("custom")
            .with_style(Style::new().with("fill", "blue")),
    );
    assert_eq!(path.id().as_deref(), Some("custom"));
    assert_eq!(path.attribute("style").as_deref(), Some("fill:blue"));
    assert_eq!(
        path.attribute("inkscape:connector-curvature").as_deref(),
        Some("0")
    );

    let ellipse = layer.ellipse(
        Point::new(5.0, 5.0),
        Dimension::new(3.0, 2.0),
        &ShapeOptions::new(),
    );
    assert_eq!(ellipse.kind(), ShapeKind::Ellipse);
    assert_eq!(ellipse.attribute("ry").as_deref(), Some("2"));

    assert_eq!(layer.paths().len(), 1);
}

#[test]
fn allocated_ids_skip_existing_elements() {
    let canvas = Canvas::blank()
        .expect("空白模板")
        .with_id_allocator(Arc::new(IdAllocator::starting_at(1)));
    let layer = canvas.layer("Layer 1").expect("图层");
    layer.circle(
        Point::new(0.0, 0.0),
        1.0,
        &ShapeOptions::new().with_id("__inkcanvas_circle_1"),
    );
    let next = layer.circle(Point::new(0.0, 0.0), 1.0, &ShapeOptions::new());
    assert_eq!(next.id().as_deref(), Some("__inkcanvas_circle_2"));
}

#[test]
fn interleaved_canvases_never_share_generated_ids() {
    let first = Canvas::blank()
        .expect("空白模板")
        .with_id_allocator(IdAllocator::global());
    let second = Canvas::blank()
        .expect("空白模板")
        .with_id_allocator(IdAllocator::global());
    let first_layer = first.layer("Layer 1").expect("图层");
    let second_layer = second.layer("Layer 1").expect("图层");

    let mut first_ids = Vec::new();
    let mut second_ids = Vec::new();
    for step in 0..10 {
        let at = Point::new(f64::from(step), 0.0);
        first_ids.push(first_layer.circle(at, 1.0, &ShapeOptions::new()).id());
        second_ids.push(second_layer.path("M 0 0 L 1 1", &ShapeOptions::new()).id());
        second_ids.push(second_layer.circle(at, 1.0, &ShapeOptions::new()).id());
    }

    let first_ids: HashSet<String> = first_ids.into_iter().flatten().collect();
    let second_ids: HashSet<String> = second_ids.into_iter().flatten().collect();
    assert_eq!(first_ids.len(), 10);
    assert_eq!(second_ids.len(), 20);
    assert!(first_ids.is_disjoint(&second_ids));
}

#[test]
fn text_and_extra_attributes() {
    let canvas = Canvas::blank().expect("空白模板");
    let layer = canvas.layer("Layer 1").expect("图层");
    let extra = ExtraAttributes::new()
        .with("class", "caption")
        .and_then(|extra| extra.with("inkscape:label", "title"))
        .expect("附加属性");
    let text = layer.text(
        "Pie chart",
        Point::new(200.0, 370.0),
        &TextOptions::default(),
        &ShapeOptions::new().with_extra(extra),
    );
    assert_eq!(text.kind(), ShapeKind::Text);
    assert_eq!(text.text(), "Pie chart");
    assert_eq!(text.attribute("font-size").as_deref(), Some("18px"));
    assert_eq!(text.attribute("text-anchor").as_deref(), Some("middle"));
    assert_eq!(text.attribute("class").as_deref(), Some("caption"));
    assert_eq!(text.label().as_deref(), Some("title"));
    assert!(text.attribute("style").is_none());

    let found = canvas
        .element_by_id(&text.id().expect("文本 ID"))
        .expect("按 ID 查找");
    assert_eq!(found.node(), text.node());
}

#[test]
fn delete_detaches_group_once() {
    let canvas = graphic();
    let group = canvas.group_by_id("g855", false).expect("分组");
    let rect = canvas.element_by_id("rect849").expect("矩形");
    group.delete().expect("删除分组");

    assert!(canvas.group_by_id("g855", false).is_none());
    assert!(!rect.is_attached());
    assert!(canvas.element_by_id("rect849").is_none());
    assert!(!canvas.to_svg_string().expect("序列化").contains("g855"));

    let err = group.delete().unwrap_err();
    assert!(matches!(err, SvgError::Detached { id } if id.as_deref() == Some("g855")));
}

#[test]
fn get_text_prefers_flow_paragraphs() {
    let canvas = Canvas::load(fixture("canvas.svg")).expect("读取 canvas.svg 失败");
    assert_eq!(
        canvas.get_text("flowRoot10"),
        ["Flowing paragraph one", "Flowing bold paragraph"]
    );
    assert_eq!(canvas.get_text("text24"), ["First line", "Second & last"]);
    assert!(canvas.get_text("missing").is_empty());
}

#[test]
fn render_refuses_to_overwrite_by_default() {
    let dir = tempfile::tempdir().expect("临时目录");
    let out = dir.path().join("out.svg");
    fs::write(&out, "marker").expect("写入占位文件");

    let canvas = Canvas::blank().expect("空白模板");
    let outcome = canvas.render(&out, false).expect("渲染");
    assert_eq!(outcome, RenderOutcome::Skipped(out.clone()));
    assert_eq!(fs::read_to_string(&out).expect("读取"), "marker");

    let outcome = canvas.render(&out, true).expect("渲染");
    assert_eq!(outcome, RenderOutcome::Written(out.clone()));
    let written = fs::read_to_string(&out).expect("读取");
    assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>"));
    assert!(written.contains("inkscape:label=\"Layer 1\""));
}

#[test]
fn round_trip_preserves_structure() {
    let original = graphic();
    let dir = tempfile::tempdir().expect("临时目录");
    let first = dir.path().join("first.svg");
    original.render(&first, false).expect("第一次渲染");

    let reloaded = Canvas::load(&first).expect("重新加载");
    let second = dir.path().join("second.svg");
    reloaded.render(&second, false).expect("第二次渲染");
    let twice = Canvas::load(&second).expect("再次加载");

    assert_eq!(snapshot(&original.tree()), snapshot(&reloaded.tree()));
    assert_eq!(snapshot(&original.tree()), snapshot(&twice.tree()));
    assert_eq!(twice.groups().len(), 6);
}

#[test]
fn load_errors_are_reported() {
    let err = Canvas::load(fixture("missing.svg")).unwrap_err();
    assert!(matches!(err, SvgError::ReadError { .. }));

    let dir = tempfile::tempdir().expect("临时目录");
    let broken = dir.path().join("broken.svg");
    fs::write(&broken, "<svg><g></svg>").expect("写入");
    let err = Canvas::load(&broken).unwrap_err();
    assert!(matches!(err, SvgError::ParseError { .. }));
}
