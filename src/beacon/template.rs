//! Response template rendering.
//!
//! Templates use brace placeholders: `{rssi_msg}` and `{snr_msg}` are replaced with the
//! formatted signal readings, `{{` and `}}` produce literal braces. A placeholder may
//! carry character indexing (`{rssi_msg[0]}`), a conversion (`!s`, `!r`, `!a`) and a
//! string format spec (`{rssi_msg:>12}`, `{snr_msg:*^14.5}`).
//!
//! Anything else inside braces is an error; callers decide what to fall back to.

use std::fmt::Write;
use thiserror::Error;

/// Placeholder names a template may reference.
pub const RSSI_PLACEHOLDER: &str = "rssi_msg";
pub const SNR_PLACEHOLDER: &str = "snr_msg";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder '{0}'")]
    UnknownPlaceholder(String),
    #[error("positional placeholder '{{{0}}}' is not supported")]
    Positional(String),
    #[error("invalid field access in placeholder '{0}'")]
    FieldAccess(String),
    #[error("index [{index}] not usable on placeholder '{name}'")]
    Index { name: String, index: String },
    #[error("invalid format spec ':{spec}' on placeholder '{name}': {reason}")]
    FormatSpec {
        name: String,
        spec: String,
        reason: &'static str,
    },
    #[error("conversion '!{conversion}' on placeholder '{name}' is not supported")]
    Conversion { name: String, conversion: String },
    #[error("single '{{' without closing brace at byte {0}")]
    UnclosedBrace(usize),
    #[error("single '}}' encountered at byte {0}")]
    UnmatchedClose(usize),
}

/// Values available to a template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub rssi_msg: &'a str,
    pub snr_msg: &'a str,
}

impl<'a> TemplateVars<'a> {
    fn lookup(&self, name: &str) -> Option<&'a str> {
        match name {
            RSSI_PLACEHOLDER => Some(self.rssi_msg),
            SNR_PLACEHOLDER => Some(self.snr_msg),
            _ => None,
        }
    }
}

/// Render `template`, substituting the known placeholders.
pub fn render(template: &str, vars: &TemplateVars<'_>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        match ch {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut field = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    match c {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(TemplateError::UnclosedBrace(idx)),
                        other => field.push(other),
                    }
                }
                if !closed {
                    return Err(TemplateError::UnclosedBrace(idx));
                }
                out.push_str(&resolve_field(&field, vars)?);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::UnmatchedClose(idx));
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Resolve the text between braces: `name[index]...!conversion:spec`.
fn resolve_field(field: &str, vars: &TemplateVars<'_>) -> Result<String, TemplateError> {
    // '!' and ':' inside an index belong to the index
    let mut in_index = false;
    let mut split_at = field.len();
    for (i, c) in field.char_indices() {
        match c {
            '[' => in_index = true,
            ']' => in_index = false,
            '!' | ':' if !in_index => {
                split_at = i;
                break;
            }
            _ => {}
        }
    }
    let (head, tail) = field.split_at(split_at);

    let name_end = head.find(['.', '[']).unwrap_or(head.len());
    let (name, accessors) = head.split_at(name_end);
    if name.is_empty() || name.chars().all(|c| c.is_ascii_digit()) {
        return Err(TemplateError::Positional(name.to_string()));
    }
    let mut value = vars
        .lookup(name)
        .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?
        .to_string();

    let mut rest = accessors;
    while !rest.is_empty() {
        let Some(after_open) = rest.strip_prefix('[') else {
            return Err(TemplateError::FieldAccess(field.to_string()));
        };
        let close = after_open
            .find(']')
            .ok_or_else(|| TemplateError::FieldAccess(field.to_string()))?;
        let index = &after_open[..close];
        value = index_char(&value, index).ok_or_else(|| TemplateError::Index {
            name: name.to_string(),
            index: index.to_string(),
        })?;
        rest = &after_open[close + 1..];
    }

    let (conversion, spec) = match tail.strip_prefix('!') {
        Some(conv) => {
            let mut conv_chars = conv.chars();
            let code = conv_chars.next();
            let after = conv_chars.as_str();
            let spec = match after.strip_prefix(':') {
                Some(spec) => Some(spec),
                None if after.is_empty() => None,
                None => {
                    return Err(TemplateError::Conversion {
                        name: name.to_string(),
                        conversion: conv.to_string(),
                    })
                }
            };
            (Some(code.unwrap_or_default()), spec)
        }
        None => (None, tail.strip_prefix(':')),
    };

    let converted = match conversion {
        None | Some('s') => value,
        Some('r') => quote(&value, false),
        Some('a') => quote(&value, true),
        Some(other) => {
            return Err(TemplateError::Conversion {
                name: name.to_string(),
                conversion: other.to_string(),
            })
        }
    };

    match spec {
        Some(spec) if !spec.is_empty() => {
            apply_spec(&converted, spec).map_err(|reason| TemplateError::FormatSpec {
                name: name.to_string(),
                spec: spec.to_string(),
                reason,
            })
        }
        _ => Ok(converted),
    }
}

/// Character at a non-negative decimal index.
fn index_char(value: &str, index: &str) -> Option<String> {
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let n: usize = index.parse().ok()?;
    value.chars().nth(n).map(String::from)
}

/// Quoted, escaped rendering of a string; `ascii_only` also escapes non-ASCII.
fn quote(value: &str, ascii_only: bool) -> String {
    let delim = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(delim);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() || (ascii_only && !c.is_ascii()) => {
                let code = c as u32;
                let _ = if code < 0x100 {
                    write!(out, "\\x{:02x}", code)
                } else if code < 0x10000 {
                    write!(out, "\\u{:04x}", code)
                } else {
                    write!(out, "\\U{:08x}", code)
                };
            }
            c => out.push(c),
        }
    }
    out.push(delim);
    out
}

/// Apply `[[fill]align][0][width][.precision][s]` to a string value.
fn apply_spec(value: &str, spec: &str) -> Result<String, &'static str> {
    let chars: Vec<char> = spec.chars().collect();
    let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');
    let mut i = 0;
    let mut fill = None;
    let mut align = None;
    if chars.len() >= 2 && is_align(chars[1]) {
        fill = Some(chars[0]);
        align = Some(chars[1]);
        i = 2;
    } else if !chars.is_empty() && is_align(chars[0]) {
        align = Some(chars[0]);
        i = 1;
    }
    if align == Some('=') {
        return Err("'=' alignment not allowed for text");
    }

    match chars.get(i) {
        Some('+' | '-' | ' ') => return Err("sign not allowed for text"),
        Some('z') => return Err("negative zero coercion not allowed for text"),
        Some('#') => return Err("alternate form not allowed for text"),
        _ => {}
    }
    if chars.get(i) == Some(&'0') {
        fill.get_or_insert('0');
        i += 1;
    }

    let width = take_number(&chars, &mut i);
    if matches!(chars.get(i), Some(',' | '_')) {
        return Err("grouping not allowed for text");
    }
    let precision = if chars.get(i) == Some(&'.') {
        i += 1;
        Some(take_number(&chars, &mut i).ok_or("missing precision")?)
    } else {
        None
    };
    if chars.get(i) == Some(&'s') {
        i += 1;
    }
    if i != chars.len() {
        return Err("unknown format code for text");
    }

    let truncated: String = match precision {
        Some(p) => value.chars().take(p).collect(),
        None => value.to_string(),
    };
    let len = truncated.chars().count();
    let width = width.unwrap_or(0);
    if len >= width {
        return Ok(truncated);
    }
    let pad = width - len;
    let fill = fill.unwrap_or(' ');
    let (left, right) = match align.unwrap_or('<') {
        '>' => (pad, 0),
        '^' => (pad / 2, pad - pad / 2),
        _ => (0, pad),
    };
    let mut out = String::with_capacity(truncated.len() + pad);
    out.extend(std::iter::repeat(fill).take(left));
    out.push_str(&truncated);
    out.extend(std::iter::repeat(fill).take(right));
    Ok(out)
}

fn take_number(chars: &[char], i: &mut usize) -> Option<usize> {
    let start = *i;
    while chars.get(*i).is_some_and(|c| c.is_ascii_digit()) {
        *i += 1;
    }
    if *i == start {
        return None;
    }
    chars[start..*i].iter().collect::<String>().parse().ok()
}
