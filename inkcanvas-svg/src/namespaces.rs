pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const INKSCAPE_NS: &str = "http://www.inkscape.org/namespaces/inkscape";
pub const SODIPODI_NS: &str = "http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// 序列化时为未声明的命名空间挑选前缀。
const WELL_KNOWN_PREFIXES: [(&str, &str); 5] = [
    ("svg", SVG_NS),
    ("inkscape", INKSCAPE_NS),
    ("sodipodi", SODIPODI_NS),
    ("xlink", XLINK_NS),
    ("xml", XML_NS),
];

pub(crate) fn well_known_prefix(uri: &str) -> Option<&'static str> {
    WELL_KNOWN_PREFIXES
        .iter()
        .find(|(_, known)| *known == uri)
        .map(|(prefix, _)| *prefix)
}

pub(crate) fn well_known_uri(prefix: &str) -> Option<&'static str> {
    WELL_KNOWN_PREFIXES
        .iter()
        .find(|(known, _)| *known == prefix)
        .map(|(_, uri)| *uri)
}

/// 查询表达式使用的前缀 → URI 映射。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    entries: Vec<(String, String)>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inkscape 文档常用的映射：`svg`/`ns` 指向 SVG，另有 `inkscape`、`sodipodi`、`xlink`。
    pub fn inkscape() -> Self {
        Self::new()
            .with("ns", SVG_NS)
            .with("svg", SVG_NS)
            .with("inkscape", INKSCAPE_NS)
            .with("sodipodi", SODIPODI_NS)
            .with("xlink", XLINK_NS)
    }

    pub fn with(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let uri = uri.into();
        match self.entries.iter_mut().find(|(known, _)| *known == prefix) {
            Some(entry) => entry.1 = uri,
            None => self.entries.push((prefix, uri)),
        }
        self
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NS);
        }
        self.entries
            .iter()
            .find(|(known, _)| known == prefix)
            .map(|(_, uri)| uri.as_str())
    }
}
