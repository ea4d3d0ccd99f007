//! HMR Frame Protocol
//!
//! Each WebSocket text frame sent by `serve` is one notification:
//!
//! ```text
//! changed:<path>
//! created:<path>
//! deleted:<path>
//! renamed:<new path>:<old path>
//! ```
//!
//! Prefixes are fixed 8-byte literals, the payload follows with no space.
//! Anything else is not a notification and is dropped by the caller.

use std::fmt;

use serde::Serialize;

/// Length of every kind prefix, delimiter included.
pub const PREFIX_LEN: usize = 8;

/// Separator between the new and old path of a `renamed:` frame.
pub const RENAME_DELIMITER: char = ':';

/// Classification of a file-system event relayed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChangeKind {
    #[serde(rename = "change")]
    Changed,
    #[serde(rename = "create")]
    Created,
    #[serde(rename = "delete")]
    Deleted,
    #[serde(rename = "rename")]
    Renamed,
}

impl ChangeKind {
    pub const ALL: [Self; 4] = [Self::Changed, Self::Created, Self::Deleted, Self::Renamed];

    /// Wire prefix, e.g. `"changed:"`.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Changed => "changed:",
            Self::Created => "created:",
            Self::Deleted => "deleted:",
            Self::Renamed => "renamed:",
        }
    }

    /// Event name subscribers know this kind by.
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::Changed => "change",
            Self::Created => "create",
            Self::Deleted => "delete",
            Self::Renamed => "rename",
        }
    }

    /// Dense index used by the dispatcher's registry.
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Changed => 0,
            Self::Created => 1,
            Self::Deleted => 2,
            Self::Renamed => 3,
        }
    }

    fn from_prefix(text: &str) -> Option<Self> {
        let prefix = text.get(..PREFIX_LEN)?;
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// A single parsed change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeNotification {
    pub kind: ChangeKind,
    /// Path relative to the served root.
    #[serde(rename = "file")]
    pub path: String,
    /// Previous path, only ever set for [`ChangeKind::Renamed`].
    #[serde(rename = "oldFile", skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
}

impl ChangeNotification {
    pub fn changed(path: impl Into<String>) -> Self {
        Self::single(ChangeKind::Changed, path)
    }

    pub fn created(path: impl Into<String>) -> Self {
        Self::single(ChangeKind::Created, path)
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self::single(ChangeKind::Deleted, path)
    }

    pub fn renamed(path: impl Into<String>, old_path: Option<String>) -> Self {
        Self {
            kind: ChangeKind::Renamed,
            path: path.into(),
            old_path,
        }
    }

    fn single(kind: ChangeKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            old_path: None,
        }
    }

    /// Parse one text frame.
    ///
    /// Returns `None` for any frame without a known prefix. A `renamed:` frame
    /// without a delimiter yields `old_path: None`.
    pub fn parse(text: &str) -> Option<Self> {
        let kind = ChangeKind::from_prefix(text)?;
        let rest = &text[PREFIX_LEN..];

        Some(match kind {
            ChangeKind::Renamed => match rest.split_once(RENAME_DELIMITER) {
                Some((path, old)) => Self::renamed(path, Some(old.to_string())),
                None => Self::renamed(rest, None),
            },
            _ => Self::single(kind, rest),
        })
    }

    /// Serialize to a JSON line for machine-readable output.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_path_kinds() {
        assert_eq!(
            ChangeNotification::parse("changed:index.html"),
            Some(ChangeNotification::changed("index.html"))
        );
        assert_eq!(
            ChangeNotification::parse("created:blog/post.html"),
            Some(ChangeNotification::created("blog/post.html"))
        );
        assert_eq!(
            ChangeNotification::parse("deleted:style.css"),
            Some(ChangeNotification::deleted("style.css"))
        );
    }

    #[test]
    fn test_parse_renamed() {
        let n = ChangeNotification::parse("renamed:new.js:old.js").unwrap();
        assert_eq!(n.kind, ChangeKind::Renamed);
        assert_eq!(n.path, "new.js");
        assert_eq!(n.old_path.as_deref(), Some("old.js"));
    }

    #[test]
    fn test_parse_renamed_without_delimiter() {
        let n = ChangeNotification::parse("renamed:new.js").unwrap();
        assert_eq!(n.path, "new.js");
        assert_eq!(n.old_path, None);
    }

    #[test]
    fn test_parse_renamed_splits_on_first_delimiter() {
        let n = ChangeNotification::parse("renamed:a.js:b:c.js").unwrap();
        assert_eq!(n.path, "a.js");
        assert_eq!(n.old_path.as_deref(), Some("b:c.js"));
    }

    #[test]
    fn test_parse_unknown_is_dropped() {
        assert_eq!(ChangeNotification::parse("ping"), None);
        assert_eq!(ChangeNotification::parse(""), None);
        assert_eq!(ChangeNotification::parse("modified:x.html"), None);
        assert_eq!(ChangeNotification::parse("Changed:x.html"), None);
        // multi-byte input shorter than a prefix must not panic
        assert_eq!(ChangeNotification::parse("änderung"), None);
    }

    #[test]
    fn test_parse_empty_payload() {
        assert_eq!(
            ChangeNotification::parse("changed:"),
            Some(ChangeNotification::changed(""))
        );
    }

    #[test]
    fn test_json_output() {
        let json = ChangeNotification::renamed("new.js", Some("old.js".into()))
            .to_json()
            .unwrap();
        assert_eq!(json, r#"{"kind":"rename","file":"new.js","oldFile":"old.js"}"#);

        let json = ChangeNotification::changed("index.html").to_json().unwrap();
        assert_eq!(json, r#"{"kind":"change","file":"index.html"}"#);
    }

    #[test]
    fn test_event_names() {
        let names: Vec<_> = ChangeKind::ALL.iter().map(|k| k.event_name()).collect();
        assert_eq!(names, ["change", "create", "delete", "rename"]);
        assert!(ChangeKind::ALL.iter().all(|k| k.prefix().len() == PREFIX_LEN));
    }
}
