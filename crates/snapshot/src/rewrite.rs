//! URL rewriting for attributes, inline styles, `srcset` and stylesheet text
//!
//! Replay runs on another origin, so every URL-bearing value is made absolute
//! against the location it was written for.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

/// `url(...)` in CSS: single-quoted, double-quoted, or bare
static URL_IN_CSS_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\((?:(')([^']*)'|(")(.*?)"|([^)]*))\)"#).expect("valid regex"));

static DATA_URI: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^data:[^,]*,").expect("valid regex"));

static SCHEME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("valid regex"));

static DRIVE_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]:\\").expect("valid regex"));

/// Resolve `value` against `base`, the way `a.href = value` would
///
/// Blank values and values that already parse as absolute URLs come back
/// verbatim; values that cannot be resolved are left alone.
pub fn absolute_to_doc(base: &str, value: &str) -> String {
    if value.trim().is_empty() || Url::parse(value).is_ok() {
        return value.to_string();
    }
    match Url::parse(base).and_then(|b| b.join(value)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => value.to_string(),
    }
}

/// `scheme://host[:port]` of an href, or its first path segment when it has none
pub fn extract_origin(url: &str) -> String {
    let origin = if url.contains("//") {
        url.split('/').take(3).collect::<Vec<_>>().join("/")
    } else {
        url.split('/').next().unwrap_or("").to_string()
    };
    origin.split('?').next().unwrap_or("").to_string()
}

fn is_relative_path(path: &str) -> bool {
    !(path.starts_with("www.")
        || path.starts_with("//")
        || path.starts_with('#')
        || SCHEME_PREFIX.is_match(path)
        || DRIVE_LETTER.is_match(path))
}

/// Rewrite every relative `url(...)` in `css_text` against `href`
///
/// Quoting style is preserved. Root-relative paths resolve against the
/// origin of `href`; other relative paths walk `.`/`..` segments from the
/// directory of `href`.
pub fn absolute_to_stylesheet(css_text: &str, href: &str) -> String {
    URL_IN_CSS_REF
        .replace_all(css_text, |caps: &Captures| {
            let file_path = caps
                .get(2)
                .or_else(|| caps.get(4))
                .or_else(|| caps.get(5))
                .map(|m| m.as_str())
                .unwrap_or("");
            let quote = caps
                .get(1)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or("");

            if file_path.is_empty() {
                return caps[0].to_string();
            }
            if !is_relative_path(file_path) || DATA_URI.is_match(file_path) {
                return format!("url({quote}{file_path}{quote})");
            }
            if file_path.starts_with('/') {
                return format!("url({quote}{}{file_path}{quote})", extract_origin(href));
            }

            let mut stack: Vec<&str> = href.split('/').collect();
            stack.pop();
            for part in file_path.split('/') {
                match part {
                    "." => {}
                    ".." => {
                        stack.pop();
                    }
                    _ => stack.push(part),
                }
            }
            format!("url({quote}{}{quote})", stack.join("/"))
        })
        .into_owned()
}

fn is_srcset_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{000c}')
}

/// Rewrite the URL of every candidate in a `srcset` attribute
///
/// Follows the HTML candidate grammar: candidates are separated by commas,
/// a URL runs until whitespace, and descriptors may contain parenthesized
/// commas. Descriptors are kept as written; candidates are re-joined with
/// `", "`.
pub fn get_absolute_srcset_string(base: &str, value: &str) -> String {
    if value.trim().is_empty() {
        return value.to_string();
    }

    let chars: Vec<char> = value.chars().collect();
    let mut pos = 0;
    let mut output = Vec::new();

    loop {
        while pos < chars.len() && (chars[pos] == ',' || is_srcset_space(chars[pos])) {
            pos += 1;
        }
        if pos >= chars.len() {
            break;
        }

        let start = pos;
        while pos < chars.len() && !is_srcset_space(chars[pos]) {
            pos += 1;
        }
        let url: String = chars[start..pos].iter().collect();

        if let Some(stripped) = url.strip_suffix(',') {
            output.push(absolute_to_doc(base, stripped));
            continue;
        }

        let url = absolute_to_doc(base, &url);
        let mut descriptors = String::new();
        let mut in_parens = false;
        loop {
            let Some(&c) = chars.get(pos) else {
                output.push(format!("{url}{descriptors}").trim().to_string());
                break;
            };
            if !in_parens {
                if c == ',' {
                    pos += 1;
                    output.push(format!("{url}{descriptors}").trim().to_string());
                    break;
                } else if c == '(' {
                    in_parens = true;
                }
            } else if c == ')' {
                in_parens = false;
            }
            descriptors.push(c);
            pos += 1;
        }
    }

    output.join(", ")
}

/// Rewrite one attribute value if `(tag_name, name)` is URL-bearing
///
/// This table decides which attributes replay would otherwise fetch from the
/// wrong origin: `src`, `href` (except `<use href="#...">`), non-fragment
/// `xlink:href`, `background` on table cells, `srcset`, inline `style`, and
/// `object[data]`. Everything else passes through.
pub fn transform_attribute(base: &str, tag_name: &str, name: &str, value: &str) -> String {
    if value.is_empty() {
        return value.to_string();
    }
    match name {
        "src" => absolute_to_doc(base, value),
        "href" if !(tag_name == "use" && value.starts_with('#')) => absolute_to_doc(base, value),
        "xlink:href" if !value.starts_with('#') => absolute_to_doc(base, value),
        "background" if matches!(tag_name, "table" | "td" | "th") => absolute_to_doc(base, value),
        "srcset" => get_absolute_srcset_string(base, value),
        "style" => absolute_to_stylesheet(value, base),
        "data" if tag_name == "object" => absolute_to_doc(base, value),
        _ => value.to_string(),
    }
}
