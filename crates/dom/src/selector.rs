//! Minimal CSS selector matching for `Element.matches`
//!
//! Supports what privacy rules are written with in practice: selector lists,
//! compound selectors (`tag`, `*`, `#id`, `.class`, `[attr]`, `[attr=v]`,
//! `[attr^=v]`, `[attr$=v]`, `[attr*=v]`) and the descendant / child
//! combinators.

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Prefix,
    Suffix,
    Contains,
}

#[derive(Debug, Clone)]
struct AttrSelector {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

/// Compounds left to right; `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`
#[derive(Debug, Clone)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

/// A parsed selector list
#[derive(Debug, Clone)]
pub struct SelectorList {
    selectors: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self> {
        let selectors = split_list(input)
            .into_iter()
            .map(|part| parse_complex(part.trim(), input))
            .collect::<Result<Vec<_>>>()?;
        if selectors.is_empty() {
            return Err(DomError::InvalidSelector(input.to_string()));
        }
        Ok(Self { selectors })
    }

    pub fn matches(&self, arena: &DomArena, el: NodeId) -> bool {
        self.selectors.iter().any(|s| matches_complex(s, arena, el))
    }
}

fn split_list(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn parse_complex(input: &str, whole: &str) -> Result<Complex> {
    let invalid = || DomError::InvalidSelector(whole.to_string());
    if input.is_empty() {
        return Err(invalid());
    }

    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0;
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut pending: Option<Combinator> = None;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            if !compounds.is_empty() && pending.is_none() {
                pending = Some(Combinator::Descendant);
            }
            pos += 1;
            continue;
        }
        if c == '>' {
            if compounds.is_empty() {
                return Err(invalid());
            }
            pending = Some(Combinator::Child);
            pos += 1;
            continue;
        }

        let compound = parse_compound(&chars, &mut pos).ok_or_else(invalid)?;
        if !compounds.is_empty() {
            combinators.push(pending.take().ok_or_else(invalid)?);
        }
        pending = None;
        compounds.push(compound);
    }

    if compounds.is_empty() || pending == Some(Combinator::Child) {
        return Err(invalid());
    }
    Ok(Complex {
        compounds,
        combinators,
    })
}

fn read_ident(chars: &[char], pos: &mut usize) -> Option<String> {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    if *pos == start {
        None
    } else {
        Some(chars[start..*pos].iter().collect())
    }
}

fn parse_compound(chars: &[char], pos: &mut usize) -> Option<Compound> {
    let mut compound = Compound::default();
    let start = *pos;

    if chars[*pos] == '*' {
        *pos += 1;
    } else if is_ident_char(chars[*pos]) {
        compound.tag = Some(read_ident(chars, pos)?.to_ascii_lowercase());
    }

    while *pos < chars.len() {
        match chars[*pos] {
            '#' => {
                *pos += 1;
                compound.id = Some(read_ident(chars, pos)?);
            }
            '.' => {
                *pos += 1;
                compound.classes.push(read_ident(chars, pos)?);
            }
            '[' => {
                *pos += 1;
                compound.attrs.push(parse_attr(chars, pos)?);
            }
            _ => break,
        }
    }

    if *pos == start {
        None
    } else {
        Some(compound)
    }
}

fn parse_attr(chars: &[char], pos: &mut usize) -> Option<AttrSelector> {
    let name = read_ident(chars, pos)?.to_ascii_lowercase();
    let op = match chars.get(*pos)? {
        ']' => {
            *pos += 1;
            return Some(AttrSelector {
                name,
                op: AttrOp::Exists,
                value: String::new(),
            });
        }
        '=' => AttrOp::Equals,
        '^' => AttrOp::Prefix,
        '$' => AttrOp::Suffix,
        '*' => AttrOp::Contains,
        _ => return None,
    };
    if op != AttrOp::Equals {
        *pos += 1;
        if chars.get(*pos) != Some(&'=') {
            return None;
        }
    }
    *pos += 1;

    let value = match chars.get(*pos)? {
        q @ ('"' | '\'') => {
            let quote = *q;
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != quote {
                *pos += 1;
            }
            let value: String = chars.get(start..*pos)?.iter().collect();
            *pos += 1;
            value
        }
        _ => read_ident(chars, pos)?,
    };

    if chars.get(*pos) != Some(&']') {
        return None;
    }
    *pos += 1;
    Some(AttrSelector { name, op, value })
}

fn matches_compound(compound: &Compound, arena: &DomArena, el: NodeId) -> bool {
    let Ok(node) = arena.get(el) else {
        return false;
    };
    if !node.is_element() {
        return false;
    }
    if let Some(tag) = &compound.tag {
        if !node.node_name.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if node.attr("id") != Some(id.as_str()) {
            return false;
        }
    }
    if !compound.classes.is_empty() {
        let classes: Vec<&str> = node.attr("class").unwrap_or("").split_whitespace().collect();
        if !compound.classes.iter().all(|c| classes.contains(&c.as_str())) {
            return false;
        }
    }
    compound.attrs.iter().all(|a| {
        let Some(actual) = node.attr(&a.name) else {
            return false;
        };
        match a.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == a.value,
            AttrOp::Prefix => !a.value.is_empty() && actual.starts_with(&a.value),
            AttrOp::Suffix => !a.value.is_empty() && actual.ends_with(&a.value),
            AttrOp::Contains => !a.value.is_empty() && actual.contains(&a.value),
        }
    })
}

fn element_parent(arena: &DomArena, el: NodeId) -> Option<NodeId> {
    let parent = arena.get(el).ok()?.parent_id?;
    arena.get(parent).ok()?.is_element().then_some(parent)
}

/// Right-to-left match with backtracking over descendant combinators
fn matches_from(complex: &Complex, index: usize, arena: &DomArena, el: NodeId) -> bool {
    if !matches_compound(&complex.compounds[index], arena, el) {
        return false;
    }
    if index == 0 {
        return true;
    }
    match complex.combinators[index - 1] {
        Combinator::Child => element_parent(arena, el)
            .map(|p| matches_from(complex, index - 1, arena, p))
            .unwrap_or(false),
        Combinator::Descendant => {
            let mut current = element_parent(arena, el);
            while let Some(ancestor) = current {
                if matches_from(complex, index - 1, arena, ancestor) {
                    return true;
                }
                current = element_parent(arena, ancestor);
            }
            false
        }
    }
}

fn matches_complex(complex: &Complex, arena: &DomArena, el: NodeId) -> bool {
    matches_from(complex, complex.compounds.len() - 1, arena, el)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (DomArena, NodeId, NodeId) {
        let mut arena = DomArena::new();
        let doc = arena.create_document("https://example.com/");
        let section = arena.create_element(doc, "section");
        arena.set_attr(section, "class", "private area");
        arena.append_child(doc, section).unwrap();
        let input = arena.create_element(doc, "input");
        arena.set_attr(input, "type", "password");
        arena.set_attr(input, "id", "pw");
        arena.append_child(section, input).unwrap();
        (arena, section, input)
    }

    #[test]
    fn test_compound_selectors() {
        let (arena, section, input) = fixture();
        assert!(SelectorList::parse("section.private").unwrap().matches(&arena, section));
        assert!(SelectorList::parse("#pw").unwrap().matches(&arena, input));
        assert!(SelectorList::parse("input[type=password]").unwrap().matches(&arena, input));
        assert!(SelectorList::parse("[type^='pass']").unwrap().matches(&arena, input));
        assert!(!SelectorList::parse("input[type=text]").unwrap().matches(&arena, input));
    }

    #[test]
    fn test_combinators_and_lists() {
        let (arena, section, input) = fixture();
        assert!(SelectorList::parse(".private input").unwrap().matches(&arena, input));
        assert!(SelectorList::parse("section > input").unwrap().matches(&arena, input));
        assert!(!SelectorList::parse("div > input").unwrap().matches(&arena, input));
        assert!(SelectorList::parse("div, .area").unwrap().matches(&arena, section));
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(SelectorList::parse("").is_err());
        assert!(SelectorList::parse("> input").is_err());
        assert!(SelectorList::parse("input[type=").is_err());
        assert!(SelectorList::parse("a,,b").is_err());
    }
}
