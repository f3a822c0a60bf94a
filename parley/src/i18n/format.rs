//! ICU-style message rendering.
//!
//! [`MessageFormatRenderer`] understands the subset of ICU MessageFormat that
//! skill translations use:
//!
//! - `{name}` argument substitution,
//! - `{count, plural, offset:1 =0 {none} one {# item} other {# items}}`,
//! - `{gender, select, female {she} male {he} other {they}}`.
//!
//! Unknown arguments are left in place verbatim. Apostrophe quoting is not
//! supported.

use serde_json::Value;

use crate::dialog::param_to_string;

/// Renders a translation template with parameters.
pub trait TemplateRenderer: Send + Sync {
    /// Render `template` for `locale`.
    fn render(&self, locale: &str, template: &str, params: &Value) -> String;
}

/// Built-in renderer for the supported MessageFormat subset.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFormatRenderer;

impl TemplateRenderer for MessageFormatRenderer {
    fn render(&self, locale: &str, template: &str, params: &Value) -> String {
        let mut out = String::with_capacity(template.len());
        render_into(&mut out, template, params, locale, None);
        out
    }
}

/// Index of the `}` closing the `{` at `open`.
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in text.bytes().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn render_into(out: &mut String, text: &str, params: &Value, locale: &str, hash: Option<&str>) {
    let mut pos = 0;
    while pos < text.len() {
        let rest = &text[pos..];
        let Some(offset) = rest.find(|c: char| c == '{' || (hash.is_some() && c == '#')) else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..offset]);
        let at = pos + offset;
        if text.as_bytes()[at] == b'#' {
            out.push_str(hash.unwrap_or("#"));
            pos = at + 1;
            continue;
        }
        let Some(close) = matching_brace(text, at) else {
            out.push_str(&text[at..]);
            break;
        };
        render_argument(out, &text[at + 1..close], params, locale);
        pos = close + 1;
    }
}

fn render_argument(out: &mut String, inner: &str, params: &Value, locale: &str) {
    let mut parts = inner.splitn(3, ',');
    let name = parts.next().unwrap_or_default().trim();
    let kind = parts.next().map(str::trim);
    let body = parts.next().unwrap_or_default();
    let value = params.get(name);

    match (kind, value) {
        (Some("plural"), Some(value)) => {
            let n = value.as_f64().unwrap_or_default();
            let (offset, options) = parse_options(body);
            let shown = format_number(n - offset);
            let exact = options.iter().find(|(selector, _)| {
                selector
                    .strip_prefix('=')
                    .and_then(|v| v.parse::<f64>().ok())
                    .is_some_and(|v| (v - n).abs() < f64::EPSILON)
            });
            let category = plural_category(locale, n - offset);
            let chosen = exact
                .or_else(|| options.iter().find(|(selector, _)| *selector == category))
                .or_else(|| options.iter().find(|(selector, _)| *selector == "other"));
            if let Some((_, message)) = chosen {
                render_into(out, message, params, locale, Some(&shown));
            }
        }
        (Some("select"), Some(value)) => {
            let key = param_to_string(value);
            let (_, options) = parse_options(body);
            let chosen = options
                .iter()
                .find(|(selector, _)| *selector == key)
                .or_else(|| options.iter().find(|(selector, _)| *selector == "other"));
            if let Some((_, message)) = chosen {
                render_into(out, message, params, locale, None);
            }
        }
        (_, Some(value)) => out.push_str(&param_to_string(value)),
        (_, None) => {
            out.push('{');
            out.push_str(inner);
            out.push('}');
        }
    }
}

/// Parse `selector {message}` pairs, returning the plural offset and the pairs.
fn parse_options(body: &str) -> (f64, Vec<(&str, &str)>) {
    let mut offset = 0.0;
    let mut options = Vec::new();
    let mut pos = 0;
    loop {
        let rest = body[pos..].trim_start();
        pos = body.len() - rest.len();
        if rest.is_empty() {
            break;
        }
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '{')
            .unwrap_or(rest.len());
        let selector = &rest[..end];
        pos += end;
        if let Some(value) = selector.strip_prefix("offset:") {
            offset = value.trim().parse().unwrap_or_default();
            continue;
        }
        let after = body[pos..].trim_start();
        pos = body.len() - after.len();
        if !after.starts_with('{') {
            break;
        }
        let Some(close) = matching_brace(body, pos) else {
            break;
        };
        options.push((selector, &body[pos + 1..close]));
        pos = close + 1;
    }
    (offset, options)
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(n: f64) -> String {
    if n.fract().abs() < f64::EPSILON {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// CLDR cardinal category for the languages skills ship in.
fn plural_category(locale: &str, n: f64) -> &'static str {
    let language = locale.split(['-', '_']).next().unwrap_or(locale);
    match language {
        "ja" | "ko" | "zh" | "th" | "vi" | "id" => "other",
        "fr" | "pt" => {
            if (0.0..2.0).contains(&n) {
                "one"
            } else {
                "other"
            }
        }
        _ => {
            if (n - 1.0).abs() < f64::EPSILON {
                "one"
            } else {
                "other"
            }
        }
    }
}
