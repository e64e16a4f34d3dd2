//! Reference discovery in HTML documents and stylesheets.
//!
//! Nothing here touches the network or the filesystem. Values are returned
//! in document order and are not de-duplicated; the existence guard takes
//! care of repeats when the references are dispatched.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::trace;

use super::path::{css_relative_path, strip_suffix};

/// `url(...)` occurrences inside a stylesheet.
#[allow(clippy::expect_used)]
static CSS_URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"url\((.*?)\)").expect("CSS url regex is valid"));

/// Prefixes that mark a reference as living outside the mirrored site.
const EXTERNAL_PREFIXES: &[&str] = &["http://", "https://", "//", "data:"];

/// A parsed HTML document with selector queries.
///
/// Wraps [`scraper::Html`], which is not `Send`: build it, query it and drop
/// it before the next `.await` in a spawned task.
#[derive(Debug)]
pub struct PageDocument {
    html: Html,
}

impl PageDocument {
    /// Parses a full HTML document. Parsing is lenient and never fails.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// Parses raw bytes, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(bytes))
    }

    /// Returns the elements matching `selector` in document order.
    ///
    /// An invalid selector matches nothing.
    #[must_use]
    pub fn query(&self, selector: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(selector) {
            Ok(parsed) => self.html.select(&parsed).collect(),
            Err(e) => {
                trace!(selector, error = %e, "invalid selector");
                Vec::new()
            }
        }
    }

    /// Returns the `attr` value of every element matching `selector`.
    /// Elements without the attribute are skipped.
    #[must_use]
    pub fn attr_values(&self, selector: &str, attr: &str) -> Vec<String> {
        self.query(selector)
            .into_iter()
            .filter_map(|element| element.value().attr(attr).map(str::to_string))
            .collect()
    }

    /// Re-serializes the document.
    #[must_use]
    pub fn html(&self) -> String {
        self.html.html()
    }

    /// Returns the concatenated text content.
    #[must_use]
    pub fn text(&self) -> String {
        self.html.root_element().text().collect()
    }
}

/// Raw references found in one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageAssets {
    /// `link[href]` values.
    pub css: Vec<String>,
    /// `script[src]` values.
    pub js: Vec<String>,
    /// `img[src]` values.
    pub img: Vec<String>,
    /// `a[href]` values that pass [`is_followable_page`].
    pub page_links: Vec<String>,
}

impl PageAssets {
    /// Number of asset references (pages excluded).
    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.css.len() + self.js.len() + self.img.len()
    }
}

/// Collects stylesheet, script, image and page references from a document.
#[must_use]
pub fn extract_from_html(doc: &PageDocument) -> PageAssets {
    let page_links = doc
        .attr_values("a[href]", "href")
        .into_iter()
        .filter(|href| {
            let followable = is_followable_page(href);
            if !followable {
                trace!(href = %href, "anchor not followed");
            }
            followable
        })
        .collect();

    PageAssets {
        css: doc.attr_values("link[href]", "href"),
        js: doc.attr_values("script[src]", "src"),
        img: doc.attr_values("img[src]", "src"),
        page_links,
    }
}

/// True for an anchor that points at another HTML page worth following:
/// not `#`, not `index.html`, and mentioning `.html`.
#[must_use]
pub fn is_followable_page(href: &str) -> bool {
    href != "#" && href != "index.html" && href.contains(".html")
}

/// True for references that are not relative to the mirrored site.
#[must_use]
pub fn is_external(raw: &str) -> bool {
    EXTERNAL_PREFIXES
        .iter()
        .any(|prefix| raw.starts_with(prefix))
}

/// Finds relative image paths inside a stylesheet.
///
/// Keeps `url(...)` entries that contain a `.` and do not mention `http`,
/// strips quotes plus any `?`/`#` suffix, and joins what is left onto the
/// directory of `css_path`.
#[must_use]
pub fn extract_from_css(css_path: &str, css_text: &str) -> Vec<String> {
    let mut images = Vec::new();

    for found in CSS_URL_PATTERN.find_iter(css_text) {
        let matched = found.as_str();
        if !matched.contains('.') || matched.contains("http") {
            trace!(entry = matched, "css url entry ignored");
            continue;
        }

        let unquoted = matched.replace(['\'', '"'], "");
        let Some(inner) = unquoted
            .strip_prefix("url(")
            .and_then(|rest| rest.strip_suffix(')'))
        else {
            continue;
        };

        let inner = strip_suffix(inner.trim());
        if inner.is_empty() {
            trace!(entry = matched, "css url entry empty after stripping");
            continue;
        }

        images.push(css_relative_path(css_path, inner));
    }

    images
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
  <link rel="stylesheet" href="css/site.css?v=2">
  <link rel="icon" href="favicon.ico">
  <link rel="stylesheet" href="http://cdn.example.net/lib.css">
  <link rel="preload">
  <script src="js/app.js"></script>
  <script>inline()</script>
</head>
<body>
  <h1>Welcome</h1>
  <img src="img/a.png"><img src="img/b.png"><img src="img/a.png"><img alt="none">
  <a href="#">top</a>
  <a href="index.html">home</a>
  <a href="about.html">about</a>
  <a href="blog/post.html#comments">post</a>
  <a href="contact.php">contact</a>
  <a>no href</a>
</body>
</html>"##;

    #[test]
    fn test_extract_from_html_collects_in_document_order() {
        let doc = PageDocument::parse(PAGE);
        let assets = extract_from_html(&doc);

        assert_eq!(
            assets.css,
            vec![
                "css/site.css?v=2",
                "favicon.ico",
                "http://cdn.example.net/lib.css"
            ]
        );
        assert_eq!(assets.js, vec!["js/app.js"]);
        assert_eq!(assets.img, vec!["img/a.png", "img/b.png", "img/a.png"]);
        assert_eq!(assets.page_links, vec!["about.html", "blog/post.html#comments"]);
        assert_eq!(assets.asset_count(), 7);
    }

    #[test]
    fn test_extract_from_empty_document() {
        let doc = PageDocument::parse("");
        assert_eq!(extract_from_html(&doc), PageAssets::default());
    }

    #[test]
    fn test_document_query_and_text() {
        let doc = PageDocument::parse(PAGE);
        assert_eq!(doc.query("h1").len(), 1);
        assert!(doc.text().contains("Welcome"));
        assert!(doc.html().contains("<h1>Welcome</h1>"));
    }

    #[test]
    fn test_document_invalid_selector_matches_nothing() {
        let doc = PageDocument::parse(PAGE);
        assert!(doc.query("a[[").is_empty());
        assert!(doc.attr_values("::::", "href").is_empty());
    }

    #[test]
    fn test_document_from_invalid_utf8() {
        let doc = PageDocument::from_bytes(b"<img src=\"x.png\">\xff\xfe");
        assert_eq!(doc.attr_values("img[src]", "src"), vec!["x.png"]);
    }

    #[test]
    fn test_is_followable_page() {
        assert!(is_followable_page("about.html"));
        assert!(is_followable_page("docs/guide.html?x=1"));
        assert!(is_followable_page("page.htmlx"));
        assert!(!is_followable_page("#"));
        assert!(!is_followable_page("index.html"));
        assert!(!is_followable_page("about.htm"));
        assert!(!is_followable_page("contact.php"));
        assert!(!is_followable_page(""));
    }

    #[test]
    fn test_is_external() {
        assert!(is_external("http://cdn.example.net/a.js"));
        assert!(is_external("https://cdn.example.net/a.js"));
        assert!(is_external("//cdn.example.net/a.js"));
        assert!(is_external("data:image/png;base64,AAAA"));
        assert!(!is_external("js/http-client.js"));
        assert!(!is_external("/js/app.js"));
    }

    #[test]
    fn test_extract_from_css_root_stylesheet_strips_query() {
        let images = extract_from_css("style.css", "h1 { background: url('img/logo.png?v=2'); }");
        assert_eq!(images, vec!["img/logo.png"]);
    }

    #[test]
    fn test_extract_from_css_joins_onto_stylesheet_directory() {
        let css = r#"
            .a { background: url("../img/bg.jpg#frag"); }
            .b { background: url(icons/sprite.svg); }
        "#;
        let images = extract_from_css("static/css/site.css", css);
        assert_eq!(
            images,
            vec!["static/css/../img/bg.jpg", "static/css/icons/sprite.svg"]
        );
    }

    #[test]
    fn test_extract_from_css_root_relative_entry_in_nested_stylesheet() {
        let css = ".logo { background: url(/img/x.png); }";
        assert_eq!(extract_from_css("css/site.css", css), vec!["css/img/x.png"]);
    }

    #[test]
    fn test_extract_from_css_filters_absolute_and_dotless() {
        let css = r#"
            .a { background: url(https://cdn.example.net/x.png); }
            .b { background: url(http://cdn.example.net/y.png); }
            .c { behavior: url(#default); }
            .d { background: url(none); }
            .e { background: url(ok.gif); }
        "#;
        assert_eq!(extract_from_css("style.css", css), vec!["ok.gif"]);
    }

    #[test]
    fn test_extract_from_css_skips_empty_after_stripping() {
        let css = ".a { background: url('?.v=1'); } .b { background: url(\"\") }";
        assert!(extract_from_css("style.css", css).is_empty());
    }

    #[test]
    fn test_extract_from_css_keeps_duplicates() {
        let css = ".a{background:url(a.png)} .b{background:url(a.png)}";
        assert_eq!(extract_from_css("style.css", css), vec!["a.png", "a.png"]);
    }
}
