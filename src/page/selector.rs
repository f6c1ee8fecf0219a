use super::dom::{Dom, NodeId};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    Contains { key: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SelectorStep {
    tag: Option<String>,
    universal: bool,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<SelectorAttrCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectorCombinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectorPart {
    step: SelectorStep,
    // Relation to the previous part; `None` for the leftmost one.
    combinator: Option<SelectorCombinator>,
}

/// Compiled comma separated selector list.
///
/// Supports type, universal, id, class and attribute (`[a]`, `[a=v]`, `[a*=v]`) selectors joined
/// by descendant or child combinators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorList {
    groups: Vec<Vec<SelectorPart>>,
}

impl SelectorList {
    pub(crate) fn parse(selector: &str) -> Result<Self> {
        let mut groups = Vec::new();
        for group in split_selector_groups(selector)? {
            groups.push(parse_selector_chain(&group)?);
        }
        Ok(Self { groups })
    }

    pub(crate) fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        dom.is_element(node) && self.groups.iter().any(|chain| match_chain(dom, node, chain))
    }

    /// Nearest inclusive ancestor matching the list, like `Element.closest`.
    pub(crate) fn closest(&self, dom: &Dom, node: NodeId) -> Option<NodeId> {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if self.matches(dom, current) {
                return Some(current);
            }
            cursor = dom.parent(current);
        }
        None
    }

    pub(crate) fn query_all(&self, dom: &Dom, root: NodeId) -> Vec<NodeId> {
        dom.descendants(root)
            .into_iter()
            .filter(|node| *node != root && self.matches(dom, *node))
            .collect()
    }
}

fn match_chain(dom: &Dom, node: NodeId, chain: &[SelectorPart]) -> bool {
    let Some((last, rest)) = chain.split_last() else {
        return false;
    };
    if !match_step(dom, node, &last.step) {
        return false;
    }
    match last.combinator {
        None => true,
        Some(SelectorCombinator::Child) => dom
            .parent(node)
            .is_some_and(|parent| match_chain(dom, parent, rest)),
        Some(SelectorCombinator::Descendant) => dom
            .ancestors(node)
            .into_iter()
            .any(|ancestor| match_chain(dom, ancestor, rest)),
    }
}

fn match_step(dom: &Dom, node: NodeId, step: &SelectorStep) -> bool {
    let Some(tag_name) = dom.tag_name(node) else {
        return false;
    };
    if let Some(tag) = &step.tag {
        if !tag.eq_ignore_ascii_case(tag_name) {
            return false;
        }
    }
    if let Some(id) = &step.id {
        if dom.attr(node, "id") != Some(id.as_str()) {
            return false;
        }
    }
    if !step.classes.iter().all(|class| dom.has_class(node, class)) {
        return false;
    }
    step.attrs.iter().all(|cond| match cond {
        SelectorAttrCondition::Exists { key } => dom.has_attr(node, key),
        SelectorAttrCondition::Eq { key, value } => dom.attr(node, key) == Some(value.as_str()),
        SelectorAttrCondition::Contains { key, value } => dom
            .attr(node, key)
            .is_some_and(|actual| actual.contains(value.as_str())),
    })
}

fn parse_selector_chain(group: &str) -> Result<Vec<SelectorPart>> {
    let mut parts = Vec::new();
    let mut pending: Option<SelectorCombinator> = None;
    for token in tokenize_selector(group)? {
        match token.as_str() {
            ">" => {
                if parts.is_empty() || pending.is_some() {
                    return Err(Error::UnsupportedSelector(group.into()));
                }
                pending = Some(SelectorCombinator::Child);
            }
            "+" | "~" => return Err(Error::UnsupportedSelector(group.into())),
            _ => {
                let combinator = if parts.is_empty() {
                    None
                } else {
                    Some(pending.take().unwrap_or(SelectorCombinator::Descendant))
                };
                parts.push(SelectorPart {
                    step: parse_selector_step(&token)?,
                    combinator,
                });
            }
        }
    }
    if parts.is_empty() || pending.is_some() {
        return Err(Error::UnsupportedSelector(group.into()));
    }
    Ok(parts)
}

fn split_selector_groups(selector: &str) -> Result<Vec<String>> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            ',' if bracket_depth == 0 => {
                let trimmed = current.trim();
                if trimmed.is_empty() {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                groups.push(trimmed.to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let trimmed = current.trim();
    if trimmed.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    groups.push(trimmed.to_string());
    Ok(groups)
}

fn tokenize_selector(selector: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            '>' | '+' | '~' if bracket_depth == 0 => {
                if !current.trim().is_empty() {
                    tokens.push(current.trim().to_string());
                }
                current.clear();
                tokens.push(ch.to_string());
            }
            ch if ch.is_ascii_whitespace() && bracket_depth == 0 => {
                if !current.trim().is_empty() {
                    tokens.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    if !current.trim().is_empty() {
        tokens.push(current.trim().to_string());
    }

    Ok(tokens)
}

fn parse_selector_step(part: &str) -> Result<SelectorStep> {
    let part = part.trim();
    if part.is_empty() {
        return Err(Error::UnsupportedSelector(part.into()));
    }

    let bytes = part.as_bytes();
    let mut i = 0usize;
    let mut step = SelectorStep::default();

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if step.universal {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                step.universal = true;
                i += 1;
            }
            b'#' => {
                i += 1;
                let Some((id, next)) = parse_selector_ident(part, i) else {
                    return Err(Error::UnsupportedSelector(part.into()));
                };
                if step.id.replace(id).is_some() {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                i = next;
            }
            b'.' => {
                i += 1;
                let Some((class_name, next)) = parse_selector_ident(part, i) else {
                    return Err(Error::UnsupportedSelector(part.into()));
                };
                step.classes.push(class_name);
                i = next;
            }
            b'[' => {
                let (attr, next) = parse_selector_attr_condition(part, i)?;
                step.attrs.push(attr);
                i = next;
            }
            _ => {
                if step.tag.is_some()
                    || step.id.is_some()
                    || !step.classes.is_empty()
                    || step.universal
                {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                let Some((tag, next)) = parse_selector_ident(part, i) else {
                    return Err(Error::UnsupportedSelector(part.into()));
                };
                step.tag = Some(tag);
                i = next;
            }
        }
    }

    Ok(step)
}

fn parse_selector_ident(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    if start >= bytes.len() || !is_selector_ident_char(bytes[start]) {
        return None;
    }
    let mut end = start + 1;
    while end < bytes.len() && is_selector_ident_char(bytes[end]) {
        end += 1;
    }
    Some((src.get(start..end)?.to_string(), end))
}

fn is_selector_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn parse_selector_attr_condition(
    src: &str,
    open_bracket: usize,
) -> Result<(SelectorAttrCondition, usize)> {
    let bytes = src.as_bytes();
    let mut i = open_bracket + 1;
    let mut quote: Option<u8> = None;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        if b == b'\'' || b == b'"' {
            quote = Some(b);
            i += 1;
            continue;
        }

        if b == b']' {
            let Some(body) = src.get(open_bracket + 1..i) else {
                return Err(Error::UnsupportedSelector(src.into()));
            };
            let body = body.trim();
            if body.is_empty() {
                return Err(Error::UnsupportedSelector(src.into()));
            }
            let cond = if let Some((key, value)) = body.split_once('=') {
                let (key, contains) = match key.strip_suffix('*') {
                    Some(key) => (key, true),
                    None => (key, false),
                };
                let key = key.trim().to_ascii_lowercase();
                if key.is_empty() || !key.bytes().all(is_selector_ident_char) {
                    return Err(Error::UnsupportedSelector(src.into()));
                }
                let value = unquote(value.trim()).to_string();
                if contains {
                    SelectorAttrCondition::Contains { key, value }
                } else {
                    SelectorAttrCondition::Eq { key, value }
                }
            } else {
                let key = body.to_ascii_lowercase();
                if !key.bytes().all(is_selector_ident_char) {
                    return Err(Error::UnsupportedSelector(src.into()));
                }
                SelectorAttrCondition::Exists { key }
            };
            return Ok((cond, i + 1));
        }
        i += 1;
    }

    Err(Error::UnsupportedSelector(src.into()))
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::html::parse_html_into;

    fn fixture() -> Result<(Dom, Vec<NodeId>)> {
        let mut dom = Dom::new();
        let document = dom.document();
        let top = parse_html_into(
            &mut dom,
            document,
            "<div id='app' class='shell'><form><input type='submit' id='go'><a href='/x' data-fancybox>x</a></form></div>",
        )?;
        Ok((dom, top))
    }

    #[test]
    fn descendant_child_and_attribute_steps() -> Result<()> {
        let (dom, _) = fixture()?;
        let go = dom.get_element_by_id("go").ok_or_else(|| Error::SelectorNotFound("#go".into()))?;
        assert!(SelectorList::parse("#app input")?.matches(&dom, go));
        assert!(SelectorList::parse("form > input[type=submit]")?.matches(&dom, go));
        assert!(SelectorList::parse("input[type=\"submit\"]")?.matches(&dom, go));
        assert!(!SelectorList::parse("#app > input")?.matches(&dom, go));
        assert!(SelectorList::parse("button, input[type=submit]")?.matches(&dom, go));
        assert!(SelectorList::parse("[type*=ubm]")?.matches(&dom, go));
        Ok(())
    }

    #[test]
    fn closest_walks_inclusive_ancestors() -> Result<()> {
        let (dom, top) = fixture()?;
        let go = dom.get_element_by_id("go").ok_or_else(|| Error::SelectorNotFound("#go".into()))?;
        assert_eq!(SelectorList::parse(".shell")?.closest(&dom, go), Some(top[0]));
        assert_eq!(SelectorList::parse(".missing")?.closest(&dom, go), None);
        Ok(())
    }

    #[test]
    fn sibling_combinators_are_rejected() {
        assert!(matches!(
            SelectorList::parse("a + b"),
            Err(Error::UnsupportedSelector(_))
        ));
        assert!(matches!(
            SelectorList::parse("div,"),
            Err(Error::UnsupportedSelector(_))
        ));
    }
}
