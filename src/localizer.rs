//! Content localization: make an article body self-contained.
//!
//! The body is parsed once into an [`ArticleBody`]. Rewrites (image sources,
//! link targets, stripped `style` attributes) are recorded against node IDs
//! and applied when the body is serialized, so the parsed tree itself is
//! never mutated.
//!
//! # Asset layout
//!
//! ```text
//! <assets_root>/
//! └── 2025/
//!     └── 02/
//!         └── photo.jpg
//! ```
//!
//! A file that already exists is never downloaded again, which makes repeated
//! runs against the same asset tree cheap.

use crate::config::SiteConfig;
use crate::models::{ArticleIdMap, AssetPeriod};
use crate::transport::Transport;
use ego_tree::{NodeId, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Link keywords and the canonical document pages they point to. First match wins.
pub const KEYWORD_LINKS: &[(&str, &str)] = &[
    ("протокол", "https://ukraine-judo.github.io/protocols.html"),
    ("protocol", "https://ukraine-judo.github.io/protocols.html"),
    ("регламент", "https://ukraine-judo.github.io/regulations.html"),
    ("regulation", "https://ukraine-judo.github.io/regulations.html"),
    ("положення", "https://ukraine-judo.github.io/regulations.html"),
];

static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static BETWEEN_TAGS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s+<").unwrap());
static LINE_BREAKS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[\r\n]+\s*").unwrap());

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// An owned article body plus the rewrites to apply when serializing it.
#[derive(Debug)]
pub struct ArticleBody {
    fragment: Html,
    overrides: HashMap<NodeId, Vec<(String, String)>>,
    internal_links: HashSet<NodeId>,
    strip_styles: bool,
}

impl ArticleBody {
    /// Parse the inner HTML of a body container.
    pub fn parse(inner_html: &str) -> Self {
        Self {
            fragment: Html::parse_fragment(inner_html),
            overrides: HashMap::new(),
            internal_links: HashSet::new(),
            strip_styles: false,
        }
    }

    /// Text nodes, trimmed and joined with single spaces.
    pub fn plain_text(&self) -> String {
        self.fragment
            .root_element()
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The original `src` of the first image, if any.
    pub fn first_image_src(&self) -> Option<String> {
        self.fragment
            .select(&IMG_SELECTOR)
            .filter_map(|img| img.value().attr("src"))
            .map(clean_reference)
            .find(|src| !src.is_empty())
    }

    /// Current value of `name` on `node`, including recorded rewrites.
    fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        if let Some(value) = self
            .overrides
            .get(&node)
            .and_then(|attrs| attrs.iter().find(|(k, _)| k == name))
        {
            return Some(value.1.clone());
        }
        self.fragment
            .tree
            .get(node)
            .and_then(|n| n.value().as_element())
            .and_then(|el| el.attr(name))
            .map(str::to_string)
    }

    fn set_attr(&mut self, node: NodeId, name: &str, value: String) {
        let attrs = self.overrides.entry(node).or_default();
        match attrs.iter_mut().find(|(k, _)| k == name) {
            Some(existing) => existing.1 = value,
            None => attrs.push((name.to_string(), value)),
        }
    }

    /// `(node, src)` for every image, in document order.
    fn images(&self) -> Vec<(NodeId, String)> {
        self.fragment
            .select(&IMG_SELECTOR)
            .filter_map(|img| img.value().attr("src").map(|src| (img.id(), src.to_string())))
            .collect()
    }

    /// `(node, href, visible text)` for every link, in document order.
    fn links(&self) -> Vec<(NodeId, String, String)> {
        self.fragment
            .select(&LINK_SELECTOR)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                let text: String = a.text().map(str::trim).collect();
                Some((a.id(), href.to_string(), text))
            })
            .collect()
    }

    /// Serialize the body with all recorded rewrites applied.
    ///
    /// Whitespace between tags is dropped, line breaks inside text collapse to
    /// a single space, and `src` values use single quotes so the result embeds
    /// cleanly in a JSON string.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for child in self.fragment.root_element().children() {
            self.serialize_node(child, false, &mut out);
        }
        let out = BETWEEN_TAGS_RE.replace_all(&out, "><");
        let out = LINE_BREAKS_RE.replace_all(&out, " ");
        out.trim().to_string()
    }

    fn serialize_node(&self, node: NodeRef<'_, Node>, raw_text: bool, out: &mut String) {
        match node.value() {
            Node::Text(text) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    out.push_str(&escape_text(text));
                }
            }
            Node::Element(el) => {
                let name = el.name();
                out.push('<');
                out.push_str(name);

                let overrides = self.overrides.get(&node.id());
                for (key, value) in el.attrs() {
                    if self.strip_styles && key.eq_ignore_ascii_case("style") {
                        continue;
                    }
                    let value = overrides
                        .and_then(|attrs| attrs.iter().find(|(k, _)| k == key))
                        .map(|(_, v)| v.as_str())
                        .unwrap_or(value);
                    push_attr(out, key, value);
                }

                if VOID_ELEMENTS.contains(&name) {
                    out.push_str("/>");
                    return;
                }
                out.push('>');

                let raw = matches!(name, "script" | "style");
                for child in node.children() {
                    self.serialize_node(child, raw, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            _ => {}
        }
    }
}

fn push_attr(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    if key == "src" {
        out.push_str("='");
        out.push_str(&escape_attr(value).replace('\'', "&#39;"));
        out.push('\'');
    } else {
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Strip whitespace, stray quotes and trailing slashes from an image reference.
fn clean_reference(src: &str) -> String {
    src.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim_end_matches('/')
        .to_string()
}

/// Decoded last path segment of an image URL, as it should be named on disk.
///
/// Names that are empty or could escape the asset directory are rejected.
fn image_filename(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let name = urlencoding::decode(segment).ok()?;
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") || name == "." {
        return None;
    }
    Some(name.into_owned())
}

/// Downloads images and rewrites references for one site and asset tree.
#[derive(Debug)]
pub struct ContentLocalizer<'a> {
    transport: &'a Transport,
    site: &'a SiteConfig,
    assets_root: PathBuf,
}

impl<'a> ContentLocalizer<'a> {
    pub fn new(transport: &'a Transport, site: &'a SiteConfig, assets_root: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            site,
            assets_root: assets_root.into(),
        }
    }

    /// Absolute URL for an image reference found on the site.
    fn resolve_image(&self, src: &str) -> Option<Url> {
        let src = clean_reference(src);
        if src.is_empty() {
            return None;
        }
        if src.starts_with("http") {
            Url::parse(&src).ok()
        } else {
            self.site.resolve(&src)
        }
    }

    /// Make sure the image behind `src` exists locally and return its relative path.
    ///
    /// Returns `None` when the reference has no usable filename. A failed
    /// download is logged and the would-be local path is still returned.
    #[instrument(level = "debug", skip(self), fields(year = %period.year, month = %period.month))]
    pub async fn ensure_image(&self, src: &str, period: &AssetPeriod) -> Option<String> {
        let Some(url) = self.resolve_image(src) else {
            debug!(src, "Unresolvable image reference");
            return None;
        };
        let Some(filename) = image_filename(&url) else {
            debug!(%url, "Image URL has no filename");
            return None;
        };

        let dir = self.assets_root.join(&period.year).join(&period.month);
        let dest = dir.join(&filename);
        let local_path = dest.to_string_lossy().replace('\\', "/");

        if fs::try_exists(&dest).await.unwrap_or(false) {
            debug!(path = %local_path, "Image already present");
            return Some(local_path);
        }

        if let Err(e) = fs::create_dir_all(&dir).await {
            warn!(dir = %dir.display(), error = %e, "Cannot create asset directory");
            return Some(local_path);
        }

        match self.transport.fetch_bytes(url.as_str()).await {
            Ok(bytes) => match fs::write(&dest, &bytes).await {
                Ok(()) => info!(%url, path = %local_path, bytes = bytes.len(), "Downloaded image"),
                Err(e) => warn!(%url, path = %local_path, error = %e, "Failed to save image"),
            },
            Err(e) => warn!(url = e.url(), error = %e, "Image download failed"),
        }
        Some(local_path)
    }

    /// Download every body image and point its `src` at the local copy.
    ///
    /// Returns the number of rewritten references.
    pub async fn localize_images(&self, body: &mut ArticleBody, period: &AssetPeriod) -> usize {
        let mut rewritten = 0;
        for (node, src) in body.images() {
            if let Some(local) = self.ensure_image(&src, period).await {
                body.set_attr(node, "src", local);
                rewritten += 1;
            }
        }
        rewritten
    }

    /// Point links to articles already parsed in this run at their local slug.
    ///
    /// Links to articles not yet in `ids` are left alone.
    pub fn rewrite_internal_links(&self, body: &mut ArticleBody, ids: &ArticleIdMap) -> usize {
        let mut rewritten = 0;
        for (node, href, _) in body.links() {
            let Some(source_id) = self.site.article_id(&href) else {
                continue;
            };
            match ids.slug_for(&source_id) {
                Some(slug) => {
                    let local = format!("{}/{}", self.site.listing_path, slug);
                    debug!(%href, %local, "Rewrote internal link");
                    body.set_attr(node, "href", local);
                    body.internal_links.insert(node);
                    rewritten += 1;
                }
                None => debug!(%href, source_id, "Internal link target not parsed yet"),
            }
        }
        rewritten
    }

    /// Point document links (protocols, regulations) at their canonical pages.
    ///
    /// Links already rewritten as internal article links are skipped.
    pub fn rewrite_keyword_links(&self, body: &mut ArticleBody) -> usize {
        let mut rewritten = 0;
        for (node, href, text) in body.links() {
            if body.internal_links.contains(&node) {
                continue;
            }
            let text = text.to_lowercase();
            let current = body.attr(node, "href").unwrap_or(href).to_lowercase();

            if let Some((keyword, target)) = KEYWORD_LINKS
                .iter()
                .find(|(keyword, _)| text.contains(keyword) || current.contains(keyword))
            {
                debug!(keyword, href = %current, target, "Rewrote document link");
                body.set_attr(node, "href", target.to_string());
                rewritten += 1;
            }
        }
        rewritten
    }

    /// Drop inline `style` attributes from every element.
    pub fn strip_presentational_attributes(&self, body: &mut ArticleBody) {
        body.strip_styles = true;
    }
}
