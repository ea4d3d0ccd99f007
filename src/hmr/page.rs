//! Page meta tags injected by `serve`.
//!
//! When watching, the server inserts these right before `</head>` of every
//! HTML response:
//!
//! ```html
//! <meta name="_serve:fname" content="blog/index.html" />
//! <meta name="_serve:mtime" content="1718000000000" />
//! <meta name="_serve:fsize" content="2048" />
//! ```
//!
//! `fname` is what the current-page filter compares change paths against.

use std::path::Path;

use anyhow::{Context, Result};

pub const FNAME_META: &str = "_serve:fname";
pub const MTIME_META: &str = "_serve:mtime";
pub const FSIZE_META: &str = "_serve:fsize";

/// Metadata describing the file backing the current page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    /// Source path relative to the served root.
    pub fname: String,
    /// Last modification time in unix milliseconds.
    pub mtime: Option<u64>,
    /// Size of the original file in bytes.
    pub fsize: Option<u64>,
}

impl PageMeta {
    /// Extract the meta tags from an HTML document.
    ///
    /// Returns `None` when the document has no `_serve:fname` tag (the page
    /// was not served in watch mode) or cannot be parsed.
    pub fn from_html(html: &str) -> Option<Self> {
        let dom = tl::parse(html, tl::ParserOptions::default()).ok()?;

        let mut fname = None;
        let mut mtime = None;
        let mut fsize = None;

        for node in dom.nodes() {
            let Some(tag) = node.as_tag() else { continue };
            if !tag.name().as_utf8_str().eq_ignore_ascii_case("meta") {
                continue;
            }

            let attrs = tag.attributes();
            let (Some(Some(name)), Some(Some(content))) = (attrs.get("name"), attrs.get("content"))
            else {
                continue;
            };
            let content = content.as_utf8_str();

            match name.as_utf8_str().as_ref() {
                FNAME_META if fname.is_none() => fname = Some(content.into_owned()),
                MTIME_META => mtime = content.trim().parse().ok(),
                FSIZE_META => fsize = content.trim().parse().ok(),
                _ => {}
            }
        }

        fname.map(|fname| Self {
            fname,
            mtime,
            fsize,
        })
    }

    /// Read a saved HTML page from disk and extract its meta tags.
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read page `{}`", path.display()))?;
        Ok(Self::from_html(&html))
    }
}
