//! Privacy decisions: blocking, text masking, input masking, obfuscation

use crate::options::{MaskInputFn, MaskInputOptions};
use dom::{Dom, NodeId, NodeType};
use rand::Rng;
use regex::Regex;

/// Class rule: a literal class name or a pattern tested against each class
#[derive(Debug, Clone)]
pub enum ClassMatcher {
    Name(String),
    Pattern(Regex),
}

impl ClassMatcher {
    pub fn matches_any(&self, classes: &[String]) -> bool {
        match self {
            ClassMatcher::Name(name) => classes.iter().any(|c| c == name),
            ClassMatcher::Pattern(re) => classes.iter().any(|c| re.is_match(c)),
        }
    }
}

/// A class rule plus an optional CSS selector; either one triggers
#[derive(Debug, Clone)]
pub struct PrivacyRule {
    pub class: ClassMatcher,
    pub selector: Option<String>,
}

impl PrivacyRule {
    pub fn new(class: ClassMatcher, selector: Option<String>) -> Self {
        Self { class, selector }
    }

    /// Whether this element itself matches (ancestors are not consulted)
    pub fn matches_element<D: Dom>(&self, dom: &D, el: NodeId) -> bool {
        if self.class.matches_any(&dom.class_list(el)) {
            return true;
        }
        let Some(selector) = self.selector.as_deref() else {
            return false;
        };
        match dom.matches(el, selector) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!("[Privacy] Ignoring selector {:?}: {}", selector, e);
                false
            }
        }
    }
}

/// Blocked elements are recorded as an empty box of the same size
pub fn is_blocked_element<D: Dom>(dom: &D, el: NodeId, rule: &PrivacyRule) -> bool {
    rule.matches_element(dom, el)
}

/// Whether text under `node` must be masked
///
/// Checks the node and then every ancestor up to the document, so one
/// masked container covers its whole subtree.
pub fn needs_masking_text<D: Dom>(dom: &D, node: NodeId, rule: &PrivacyRule) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if dom.node_type(n).ok() == Some(NodeType::Element) && rule.matches_element(dom, n) {
            return true;
        }
        current = dom.parent(n);
    }
    false
}

/// Replace every non-whitespace character with `*`
pub fn mask_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { c } else { '*' })
        .collect()
}

/// Replace every non-whitespace character with a random lowercase letter
pub fn obfuscate_text(text: &str) -> String {
    let mut rng = rand::thread_rng();
    text.chars()
        .map(|c| {
            if c.is_whitespace() {
                c
            } else {
                rng.gen_range(b'a'..=b'z') as char
            }
        })
        .collect()
}

/// Masked value of a form control, honouring the per-type switches
///
/// The control is masked when either its tag name (`textarea`, `select`) or
/// its `type` is enabled. The custom mask function wins over the `*` fill.
pub fn mask_input_value(
    options: &MaskInputOptions,
    tag_name: &str,
    input_type: Option<&str>,
    value: &str,
    mask_input_fn: Option<&MaskInputFn>,
) -> String {
    let masked = options.is_enabled(&tag_name.to_ascii_lowercase())
        || input_type
            .map(|t| options.is_enabled(&t.to_ascii_lowercase()))
            .unwrap_or(false);
    if !masked {
        return value.to_string();
    }
    match mask_input_fn {
        Some(mask) => mask(value),
        None => "*".repeat(value.chars().count()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::DomArena;
    use std::sync::Arc;

    fn rule(class: &str, selector: Option<&str>) -> PrivacyRule {
        PrivacyRule::new(ClassMatcher::Name(class.to_string()), selector.map(str::to_string))
    }

    #[test]
    fn test_blocked_by_class_pattern_or_selector() {
        let mut arena = DomArena::new();
        let doc = arena.create_document("https://example.com/");
        let div = arena.create_element(doc, "div");
        arena.set_attr(div, "class", "card highlight-block");
        let aside = arena.create_element(doc, "aside");

        assert!(is_blocked_element(&arena, div, &rule("highlight-block", None)));
        assert!(!is_blocked_element(&arena, aside, &rule("highlight-block", None)));
        assert!(is_blocked_element(&arena, aside, &rule("highlight-block", Some("aside"))));

        let pattern = PrivacyRule::new(ClassMatcher::Pattern(Regex::new("^highlight-").unwrap()), None);
        assert!(is_blocked_element(&arena, div, &pattern));
    }

    #[test]
    fn test_bad_selector_never_matches() {
        let mut arena = DomArena::new();
        let doc = arena.create_document("https://example.com/");
        let div = arena.create_element(doc, "div");
        assert!(!is_blocked_element(&arena, div, &rule("x", Some("div["))));
    }

    #[test]
    fn test_masking_is_inherited() {
        let mut arena = DomArena::new();
        let doc = arena.create_document("https://example.com/");
        let outer = arena.create_element(doc, "section");
        arena.set_attr(outer, "class", "rr-mask");
        let inner = arena.create_element(doc, "p");
        let text = arena.create_text(doc, "secret");
        arena.append_child(doc, outer).unwrap();
        arena.append_child(outer, inner).unwrap();
        arena.append_child(inner, text).unwrap();
        let other = arena.create_text(doc, "public");
        arena.append_child(doc, other).unwrap();

        let mask = rule("rr-mask", None);
        assert!(needs_masking_text(&arena, text, &mask));
        assert!(needs_masking_text(&arena, inner, &mask));
        assert!(!needs_masking_text(&arena, other, &mask));
    }

    #[test]
    fn test_mask_text_keeps_shape() {
        assert_eq!(mask_text("Jane Doe\n42"), "**** ***\n**");
    }

    #[test]
    fn test_obfuscate_keeps_length_and_spaces() {
        let out = obfuscate_text("card 4242 4242");
        assert_eq!(out.chars().count(), 14);
        assert_eq!(out.chars().nth(4), Some(' '));
        assert!(out.chars().filter(|c| !c.is_whitespace()).all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn test_mask_input_value() {
        let options = MaskInputOptions::password_only();
        assert_eq!(mask_input_value(&options, "input", Some("password"), "hunter2", None), "*******");
        assert_eq!(mask_input_value(&options, "input", Some("text"), "hello", None), "hello");

        let all = MaskInputOptions::all();
        assert_eq!(mask_input_value(&all, "textarea", None, "notes", None), "*****");

        let custom: MaskInputFn = Arc::new(|v: &str| format!("<{}>", v.len()));
        assert_eq!(
            mask_input_value(&options, "INPUT", Some("PASSWORD"), "abc", Some(&custom)),
            "<3>"
        );
    }
}
