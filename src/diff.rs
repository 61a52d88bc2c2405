//! Diff engine
//!
//! Compares two element sets by canonical rendering and, when they differ,
//! produces a line-oriented structured diff: a unified-text body for
//! notifications and a self-contained HTML artifact for upload. Both are
//! deterministic for identical inputs.

use crate::extract::ElementSet;
use similar::{ChangeTag, TextDiff};

/// Rendered differences between two element sets
///
/// Empty exactly when the sets are equivalent (same length, pairwise equal
/// canonical renderings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport {
    unified: String,
    html: String,
}

impl DiffReport {
    /// True when no difference was found
    pub fn is_empty(&self) -> bool {
        self.unified.is_empty()
    }

    /// Unified-diff text body, suitable for a notification message
    pub fn unified_text(&self) -> &str {
        &self.unified
    }

    /// Self-contained HTML artifact with inline styling
    pub fn html(&self) -> &str {
        &self.html
    }
}

/// Compare two element sets
///
/// Equality is checked on canonical renderings first; identical sets
/// short-circuit with an empty report and no diff computation.
pub fn compare(old: &ElementSet, new: &ElementSet) -> DiffReport {
    let old_canonical = old.canonical();
    let new_canonical = new.canonical();

    if old_canonical == new_canonical {
        return DiffReport {
            unified: String::new(),
            html: String::new(),
        };
    }

    let old_doc = old_canonical.join("\n");
    let new_doc = new_canonical.join("\n");
    let diff = TextDiff::from_lines(old_doc.as_str(), new_doc.as_str());

    let unified = diff
        .unified_diff()
        .context_radius(3)
        .header("archived", "live")
        .to_string();

    DiffReport {
        html: render_html(&diff),
        unified,
    }
}

/// Render a collapsed-context HTML view of the diff
///
/// Unchanged regions outside the context radius are folded behind a
/// separator row; changed lines are tinted per side.
fn render_html(diff: &TextDiff<'_, '_, '_, str>) -> String {
    let mut rows = String::new();
    for (group_index, group) in diff.grouped_ops(3).iter().enumerate() {
        if group_index > 0 {
            rows.push_str("<tr class=\"sep\"><td colspan=\"2\">&middot;&middot;&middot;</td></tr>\n");
        }
        for op in group {
            for change in diff.iter_changes(op) {
                let (class, marker) = match change.tag() {
                    ChangeTag::Delete => ("del", "-"),
                    ChangeTag::Insert => ("ins", "+"),
                    ChangeTag::Equal => ("ctx", "&nbsp;"),
                };
                rows.push_str(&format!(
                    "<tr class=\"{}\"><td>{}</td><td>{}</td></tr>\n",
                    class,
                    marker,
                    escape_html(change.value().trim_end_matches('\n'))
                ));
            }
        }
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Content change report</title>\n\
         <style>\n\
         body {{ font-family: monospace; margin: 1.5em; }}\n\
         table {{ border-collapse: collapse; width: 100%; }}\n\
         td {{ padding: 1px 6px; white-space: pre-wrap; }}\n\
         tr.del td {{ background: #ffdddd; }}\n\
         tr.ins td {{ background: #ddffdd; }}\n\
         tr.sep td {{ color: #888; text-align: center; }}\n\
         </style>\n</head>\n<body>\n\
         <h1>Content change report</h1>\n\
         <table>\n{}</table>\n</body>\n</html>\n",
        rows
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
