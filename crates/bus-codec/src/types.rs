//! Type-designator parsing: nested-bracket-aware splitting, supported-type
//! validation, and the type-equality algorithm used when checking a
//! callback's declared signature against its event's schema.

/// Splits `s` on `sep` only at bracket nesting depth zero, so that e.g.
/// splitting `"list[int],str"` on `,` yields `["list[int]", "str"]`
/// rather than cutting inside the `list[...]`.
pub fn split_with_nested(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '[' | '(' | '{' => {
                depth += 1;
                current.push(c);
            }
            ']' | ')' | '}' => {
                depth -= 1;
                current.push(c);
            }
            c if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn strip_typing_prefix(s: &str) -> &str {
    s.strip_prefix("typing_extensions.")
        .or_else(|| s.strip_prefix("typing."))
        .unwrap_or(s)
}

fn leaf_name(s: &str) -> &str {
    s.rsplit('.').next().unwrap_or(s)
}

/// Base keyword of a type designator: the part before any `[...]`,
/// with any dotted module path stripped, lowercased (`"List[int]"` ->
/// `"list"`, `"module.Version"` -> `"version"`).
fn base_keyword(t: &str) -> String {
    let before_bracket = t.trim().split('[').next().unwrap_or(t);
    leaf_name(before_bracket).trim().to_lowercase()
}

/// If `t` is `keyword[...]` (case-insensitively, ignoring a dotted
/// prefix on `keyword`), returns the bracketed contents.
fn bracket_contents(t: &str, keyword: &str) -> Option<String> {
    let t = t.trim();
    if base_keyword(t) != keyword {
        return None;
    }
    let start = t.find('[')?;
    if !t.ends_with(']') {
        return None;
    }
    Some(t[start + 1..t.len() - 1].to_string())
}

/// True if `type_str` is one of the declared types supported by the
/// value serializers (`int`, `float`, `str`/`string`, `bool`,
/// `datetime`, `Version`, `Any`, or a `list`/`tuple`/`dict` composed
/// from supported member types, or a `|`-joined union of the above).
pub fn is_supported_type(type_str: &str) -> bool {
    let t = strip_typing_prefix(type_str.trim());
    if t.contains('|') {
        return split_with_nested(t, '|')
            .iter()
            .all(|m| is_supported_type(m.trim()));
    }
    match base_keyword(t).as_str() {
        "int" | "float" | "str" | "string" | "bool" | "datetime" | "version" | "any" => true,
        "list" => bracket_contents(t, "list")
            .is_some_and(|inner| is_supported_type(&inner)),
        "tuple" => bracket_contents(t, "tuple").is_some_and(|inner| {
            split_with_nested(&inner, ',')
                .iter()
                .all(|p| is_supported_type(p.trim()))
        }),
        "dict" => bracket_contents(t, "dict").is_some_and(|inner| {
            let parts = split_with_nested(&inner, ',');
            parts.len() == 2 && parts.iter().all(|p| is_supported_type(p.trim()))
        }),
        _ => false,
    }
}

/// Compares two type designators the way callback registration checks
/// a declared parameter type against an event's schema: strip any
/// `typing[_extensions].` prefix, recurse into matching
/// `list`/`tuple`/`dict` containers, and otherwise compare the last
/// dotted-path segment case-insensitively.
pub fn types_equal(a: &str, b: &str) -> bool {
    let a = strip_typing_prefix(a.trim());
    let b = strip_typing_prefix(b.trim());
    if a == b {
        return true;
    }
    for kw in ["list", "tuple", "dict"] {
        if let (Some(ia), Some(ib)) = (bracket_contents(a, kw), bracket_contents(b, kw)) {
            let pa = split_with_nested(&ia, ',');
            let pb = split_with_nested(&ib, ',');
            return pa.len() == pb.len()
                && pa
                    .iter()
                    .zip(pb.iter())
                    .all(|(x, y)| types_equal(x.trim(), y.trim()));
        }
    }
    leaf_name(a).eq_ignore_ascii_case(leaf_name(b))
}

pub(crate) fn bracket_contents_for(t: &str, keyword: &str) -> Option<String> {
    bracket_contents(t, keyword)
}

pub(crate) fn base_keyword_of(t: &str) -> String {
    base_keyword(t)
}
