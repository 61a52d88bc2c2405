//! Content extraction
//!
//! Parses an HTML document, evaluates a CSS selector against it, and turns
//! the matched nodes into owned [`Fragment`] trees that survive past the
//! parsed document. Exclusion filtering is a generic tree transform over
//! those fragments, so the volatile-substructure rule stays decoupled from
//! the HTML-specific recursion.

use crate::error::{KlaxonError, Result};
use scraper::{ElementRef, Html, Selector};

/// One node in an owned DOM fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentNode {
    /// Nested element
    Element(Fragment),
    /// Text content
    Text(String),
}

/// An owned DOM element subtree
///
/// Attribute order is preserved as parsed; canonical rendering sorts
/// attributes so serialization is stable regardless of source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Lowercased tag name
    pub tag: String,
    /// Attribute name/value pairs
    pub attrs: Vec<(String, String)>,
    /// Child nodes in document order
    pub children: Vec<FragmentNode>,
}

impl Fragment {
    /// Rebuild this subtree through a node-level rule
    ///
    /// `rule` runs top-down on every element. Returning `None` drops the
    /// element and its whole subtree; returning a transformed element keeps
    /// it and recurses into its children. Text nodes pass through untouched.
    pub fn map_tree<F>(self, rule: &F) -> Option<Fragment>
    where
        F: Fn(Fragment) -> Option<Fragment>,
    {
        let node = rule(self)?;
        let children = node
            .children
            .into_iter()
            .filter_map(|child| match child {
                FragmentNode::Element(el) => el.map_tree(rule).map(FragmentNode::Element),
                text => Some(text),
            })
            .collect();
        Some(Fragment { children, ..node })
    }

    /// Render the canonical pretty-printed form
    ///
    /// Stable attribute ordering, two-space indentation, text collapsed to
    /// single spaces, whitespace-only text dropped. Two fragments are
    /// considered equivalent exactly when these renderings match.
    pub fn to_canonical_string(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, 0);
        out
    }

    fn render(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let mut attrs: Vec<&(String, String)> = self.attrs.iter().collect();
        attrs.sort();

        out.push_str(&indent);
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(value);
            out.push('"');
        }

        let rendered_children: Vec<String> = self
            .children
            .iter()
            .filter_map(|child| match child {
                FragmentNode::Element(el) => {
                    let mut nested = String::new();
                    el.render(&mut nested, depth + 1);
                    Some(nested)
                }
                FragmentNode::Text(text) => {
                    let collapsed = collapse_whitespace(text);
                    if collapsed.is_empty() {
                        None
                    } else {
                        Some(format!("{}  {}", indent, collapsed))
                    }
                }
            })
            .collect();

        if rendered_children.is_empty() {
            out.push_str("/>\n");
            return;
        }

        out.push_str(">\n");
        for child in rendered_children {
            out.push_str(&child);
            if !child.ends_with('\n') {
                out.push('\n');
            }
        }
        out.push_str(&indent);
        out.push_str("</");
        out.push_str(&self.tag);
        out.push_str(">\n");
    }
}

/// Ordered result of one selector evaluation against one document
///
/// Ordering is significant: two sets are equivalent only when they have the
/// same length and pairwise equal canonical renderings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSet {
    fragments: Vec<Fragment>,
}

impl ElementSet {
    /// Number of matched fragments
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// True when the selector matched nothing
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Canonical rendering of every fragment, in match order
    pub fn canonical(&self) -> Vec<String> {
        self.fragments
            .iter()
            .map(Fragment::to_canonical_string)
            .collect()
    }

    /// Drop volatile substructure before comparison
    ///
    /// Removes every direct or nested descendant element whose tag name
    /// case-insensitively matches `token`, and strips any attribute whose
    /// name matches `token` from retained elements (the token may denote
    /// either a tag or an attribute name). Matched top-level fragments are
    /// themselves kept; only their contents are pruned.
    pub fn apply_exclusion(self, token: &str) -> Self {
        let token = token.to_ascii_lowercase();
        let rule_token = token.clone();
        let rule = move |mut el: Fragment| -> Option<Fragment> {
            if el.tag.eq_ignore_ascii_case(&rule_token) {
                return None;
            }
            el.attrs
                .retain(|(name, _)| !name.eq_ignore_ascii_case(&rule_token));
            Some(el)
        };

        let fragments = self
            .fragments
            .into_iter()
            .map(|mut root| {
                // The root is a selector match; the drop rule applies to
                // descendants only, attribute stripping applies everywhere.
                root.attrs
                    .retain(|(name, _)| !name.eq_ignore_ascii_case(&token));
                let children = root
                    .children
                    .into_iter()
                    .filter_map(|child| match child {
                        FragmentNode::Element(el) => {
                            el.map_tree(&rule).map(FragmentNode::Element)
                        }
                        text => Some(text),
                    })
                    .collect();
                Fragment { children, ..root }
            })
            .collect();

        Self { fragments }
    }
}

/// Evaluate a CSS selector against an HTML document
///
/// # Arguments
///
/// * `html` - Document source, as fetched
/// * `selector` - CSS selector choosing the watched fragments
/// * `source_url` - Where the document came from, for error messages
///
/// # Errors
///
/// Returns [`KlaxonError::InvalidSelector`] if the selector does not parse.
/// Validation is eager: a bad selector fails here, before any diffing work.
pub fn extract(html: &str, selector: &str, source_url: &str) -> Result<ElementSet> {
    let parsed = Selector::parse(selector).map_err(|_| KlaxonError::InvalidSelector {
        selector: selector.to_string(),
        source_url: source_url.to_string(),
    })?;

    let document = Html::parse_document(html);
    let fragments = document.select(&parsed).map(to_fragment).collect();
    Ok(ElementSet { fragments })
}

/// Convert a borrowed `scraper` element into an owned fragment tree
///
/// Comments and processing instructions are dropped; they are not content.
fn to_fragment(element: ElementRef) -> Fragment {
    let value = element.value();
    let attrs = value
        .attrs()
        .map(|(name, val)| (name.to_string(), val.to_string()))
        .collect();
    let children = element
        .children()
        .filter_map(|child| {
            if let Some(el) = ElementRef::wrap(child) {
                Some(FragmentNode::Element(to_fragment(el)))
            } else {
                child
                    .value()
                    .as_text()
                    .map(|text| FragmentNode::Text(text.to_string()))
            }
        })
        .collect();

    Fragment {
        tag: value.name().to_string(),
        attrs,
        children,
    }
}

/// Collapse runs of whitespace to single spaces and trim the ends
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <div id="news" class="wrap">
                <h1>Headline</h1>
                <span class="ad" data-slot="top">Buy now</span>
                <p>Body <b>text</b> here.</p>
            </div>
        </body></html>
    "#;

    #[test]
    fn test_extract_matches_selector() {
        let set = extract(PAGE, "h1", "test://page").unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.canonical()[0].contains("Headline"));
    }

    #[test]
    fn test_extract_preserves_match_order() {
        let html = "<ul><li>one</li><li>two</li><li>three</li></ul>";
        let set = extract(html, "li", "test://page").unwrap();
        let canonical = set.canonical();
        assert_eq!(canonical.len(), 3);
        assert!(canonical[0].contains("one"));
        assert!(canonical[2].contains("three"));
    }

    #[test]
    fn test_extract_invalid_selector_is_eager() {
        let err = extract(PAGE, "h1 >>> p", "test://page").unwrap_err();
        let err = err.downcast::<KlaxonError>().unwrap();
        assert!(matches!(err, KlaxonError::InvalidSelector { .. }));
        assert!(err.to_string().contains("test://page"));
    }

    #[test]
    fn test_extract_no_match_is_empty_not_error() {
        let set = extract(PAGE, "article", "test://page").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_exclusion_drops_nested_tag_any_depth() {
        let html = "<div><p>keep <span>drop</span></p><span>also drop</span></div>";
        let set = extract(html, "div", "test://page")
            .unwrap()
            .apply_exclusion("span");
        let canonical = set.canonical().join("");
        assert!(!canonical.contains("span"));
        assert!(!canonical.contains("drop"));
        assert!(canonical.contains("keep"));
    }

    #[test]
    fn test_exclusion_is_case_insensitive() {
        let html = "<div><SPAN>gone</SPAN><p>stays</p></div>";
        let set = extract(html, "div", "test://page")
            .unwrap()
            .apply_exclusion("Span");
        let canonical = set.canonical().join("");
        assert!(!canonical.contains("gone"));
        assert!(canonical.contains("stays"));
    }

    #[test]
    fn test_exclusion_strips_matching_attribute_name() {
        let html = r#"<div data-ts="123"><p data-ts="456">text</p></div>"#;
        let set = extract(html, "div", "test://page")
            .unwrap()
            .apply_exclusion("data-ts");
        let canonical = set.canonical().join("");
        assert!(!canonical.contains("data-ts"));
        assert!(canonical.contains("text"));
    }

    #[test]
    fn test_exclusion_keeps_matched_root() {
        // The selector match itself survives even when its tag equals the token
        let html = "<div><span>inner</span></div>";
        let set = extract(html, "div", "test://page")
            .unwrap()
            .apply_exclusion("div");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_canonical_sorts_attributes() {
        let html = r#"<p id="z" class="a">x</p>"#;
        let set = extract(html, "p", "test://page").unwrap();
        let canonical = &set.canonical()[0];
        let class_pos = canonical.find("class=").unwrap();
        let id_pos = canonical.find("id=").unwrap();
        assert!(class_pos < id_pos);
    }

    #[test]
    fn test_canonical_collapses_whitespace() {
        let a = extract("<p>some   text</p>", "p", "t").unwrap();
        let b = extract("<p>some\n  text</p>", "p", "t").unwrap();
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_canonical_empty_element_self_closes() {
        let set = extract("<p><br></p>", "p", "t").unwrap();
        assert!(set.canonical()[0].contains("<br/>"));
    }

    #[test]
    fn test_map_tree_rule_can_rewrite_tags() {
        let fragment = Fragment {
            tag: "div".to_string(),
            attrs: vec![],
            children: vec![FragmentNode::Element(Fragment {
                tag: "b".to_string(),
                attrs: vec![],
                children: vec![FragmentNode::Text("x".to_string())],
            })],
        };
        let rule = |mut el: Fragment| -> Option<Fragment> {
            if el.tag == "b" {
                el.tag = "strong".to_string();
            }
            Some(el)
        };
        let mapped = fragment.map_tree(&rule).unwrap();
        assert!(mapped.to_canonical_string().contains("<strong>"));
    }

    #[test]
    fn test_map_tree_rule_can_drop_subtrees() {
        let fragment = Fragment {
            tag: "div".to_string(),
            attrs: vec![],
            children: vec![
                FragmentNode::Element(Fragment {
                    tag: "aside".to_string(),
                    attrs: vec![],
                    children: vec![FragmentNode::Text("noise".to_string())],
                }),
                FragmentNode::Text("signal".to_string()),
            ],
        };
        let rule = |el: Fragment| -> Option<Fragment> {
            if el.tag == "aside" {
                None
            } else {
                Some(el)
            }
        };
        let mapped = fragment.map_tree(&rule).unwrap();
        let rendered = mapped.to_canonical_string();
        assert!(!rendered.contains("noise"));
        assert!(rendered.contains("signal"));
    }
}
