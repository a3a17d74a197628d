//! The selector subset `querySelector` understands: compound selectors made
//! of a tag, `#id`, `.class` and `[attr]`/`[attr=value]` parts, joined by
//! descendant combinators, in comma-separated lists.

use crate::runner::ds::error::JErrorType;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, Option<String>)>,
}

impl Compound {
    pub fn matches(
        &self,
        tag: &str,
        classes: &[String],
        attribute: &dyn Fn(&str) -> Option<String>,
    ) -> bool {
        if let Some(expected) = &self.tag {
            if expected != "*" && !expected.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if attribute("id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| classes.contains(c)) {
            return false;
        }
        self.attributes.iter().all(|(name, value)| match value {
            Some(value) => attribute(name).as_deref() == Some(value.as_str()),
            None => attribute(name).is_some(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    /// Left to right; each one must match an ancestor of the next.
    pub compounds: Vec<Compound>,
}

fn invalid(selector: &str) -> JErrorType {
    JErrorType::SyntaxError(format!("'{}' is not a valid selector", selector))
}

pub fn parse_selector_list(input: &str) -> Result<Vec<Selector>, JErrorType> {
    input
        .split(',')
        .map(|part| parse_selector(part.trim()).ok_or_else(|| invalid(input)))
        .collect()
}

fn parse_selector(input: &str) -> Option<Selector> {
    let compounds = split_compounds(input)?
        .iter()
        .map(|c| parse_compound(c))
        .collect::<Option<Vec<_>>>()?;
    if compounds.is_empty() {
        return None;
    }
    Some(Selector { compounds })
}

/// Splits on whitespace outside of brackets.
fn split_compounds(input: &str) -> Option<Vec<String>> {
    let mut parts = vec![];
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for c in input.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '"') | (None, '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (None, '[') => {
                depth += 1;
                current.push(c);
            }
            (None, ']') => {
                depth = depth.checked_sub(1)?;
                current.push(c);
            }
            (None, c) if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            (None, c) => current.push(c),
        }
    }
    if depth != 0 || quote.is_some() {
        return None;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    Some(parts)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn take_name(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && is_name_char(chars[end]) {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn parse_compound(input: &str) -> Option<Compound> {
    let chars: Vec<char> = input.chars().collect();
    let mut compound = Compound::default();
    let mut i = 0;
    if i < chars.len() && (chars[i] == '*' || is_name_char(chars[i])) {
        if chars[i] == '*' {
            compound.tag = Some("*".to_string());
            i += 1;
        } else {
            let (name, end) = take_name(&chars, i);
            compound.tag = Some(name);
            i = end;
        }
    }
    while i < chars.len() {
        match chars[i] {
            '#' => {
                let (name, end) = take_name(&chars, i + 1);
                if name.is_empty() {
                    return None;
                }
                compound.id = Some(name);
                i = end;
            }
            '.' => {
                let (name, end) = take_name(&chars, i + 1);
                if name.is_empty() {
                    return None;
                }
                compound.classes.push(name);
                i = end;
            }
            '[' => {
                let close = chars[i..].iter().position(|c| *c == ']')? + i;
                let body: String = chars[i + 1..close].iter().collect();
                compound.attributes.push(parse_attribute(&body)?);
                i = close + 1;
            }
            _ => return None,
        }
    }
    Some(compound)
}

fn parse_attribute(body: &str) -> Option<(String, Option<String>)> {
    match body.split_once('=') {
        None => {
            let name = body.trim();
            if name.is_empty() || !name.chars().all(is_name_char) {
                return None;
            }
            Some((name.to_lowercase(), None))
        }
        Some((name, value)) => {
            let name = name.trim();
            if name.is_empty() || !name.chars().all(is_name_char) {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            Some((name.to_lowercase(), Some(value.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compounds_and_lists() {
        let list = parse_selector_list("div.a#main[data-x='1'] span, head").unwrap();
        assert_eq!(list.len(), 2);
        let first = &list[0].compounds[0];
        assert_eq!(first.tag.as_deref(), Some("div"));
        assert_eq!(first.id.as_deref(), Some("main"));
        assert_eq!(first.classes, vec!["a".to_string()]);
        assert_eq!(
            first.attributes,
            vec![("data-x".to_string(), Some("1".to_string()))]
        );
        assert_eq!(list[0].compounds[1].tag.as_deref(), Some("span"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_selector_list("div > span").is_err());
        assert!(parse_selector_list("[unclosed").is_err());
        assert!(parse_selector_list("").is_err());
    }
}
