// Copyright 2025 CloudWeGo Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Python string literal decoding and docstring cleanup.

const TAB_SIZE: usize = 8;

/// Decodes one Python string literal (prefix, quotes and escapes included).
///
/// Returns `None` for bytes and f-string literals, which never count as docstrings.
pub fn decode_literal(literal: &str) -> Option<String> {
    let quote_at = literal.find(|c| c == '"' || c == '\'')?;
    let prefix = literal[..quote_at].to_lowercase();
    if prefix.contains('b') || prefix.contains('f') {
        return None;
    }
    let raw = prefix.contains('r');

    let body = &literal[quote_at..];
    let quote_len = if body.starts_with("\"\"\"") || body.starts_with("'''") {
        3
    } else {
        1
    };
    if body.len() < quote_len * 2 {
        return None;
    }
    let content = &body[quote_len..body.len() - quote_len];

    if raw {
        Some(content.to_string())
    } else {
        Some(unescape(content))
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            // line continuation
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
            }
            'x' => push_hex(&mut out, &mut chars, 'x', 2),
            'u' => push_hex(&mut out, &mut chars, 'u', 4),
            'U' => push_hex(&mut out, &mut chars, 'U', 8),
            // unknown escapes (and \N{...}) are kept verbatim
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

fn push_hex<I>(out: &mut String, chars: &mut std::iter::Peekable<I>, tag: char, width: usize)
where
    I: Iterator<Item = char> + Clone,
{
    let digits: String = chars.clone().take(width).collect();
    let decoded = (digits.len() == width && digits.chars().all(|d| d.is_ascii_hexdigit()))
        .then(|| u32::from_str_radix(&digits, 16).ok())
        .flatten()
        .and_then(char::from_u32);
    match decoded {
        Some(c) => {
            out.push(c);
            for _ in 0..width {
                chars.next();
            }
        }
        None => {
            out.push('\\');
            out.push(tag);
        }
    }
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for c in line.chars() {
        match c {
            '\t' => {
                let pad = TAB_SIZE - column % TAB_SIZE;
                out.extend(std::iter::repeat(' ').take(pad));
                column += pad;
            }
            '\r' => {
                out.push(c);
                column = 0;
            }
            _ => {
                out.push(c);
                column += 1;
            }
        }
    }
    out
}

/// Normalizes docstring indentation the way `inspect.cleandoc` does: the first
/// line loses its leading whitespace, the common margin of the remaining lines is
/// removed, and blank lines at both ends are dropped.
pub fn clean_docstring(doc: &str) -> String {
    let mut lines: Vec<String> = doc.split('\n').map(expand_tabs).collect();

    let margin = lines
        .iter()
        .skip(1)
        .filter_map(|line| {
            let content = line.trim_start();
            (!content.is_empty()).then(|| line.chars().count() - content.chars().count())
        })
        .min();

    if let Some(first) = lines.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(margin) = margin {
        for line in lines.iter_mut().skip(1) {
            *line = line.chars().skip(margin).collect();
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let leading = lines.iter().take_while(|l| l.is_empty()).count();
    lines.drain(..leading);

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn decode_plain_and_prefixed_literals() {
        assert_eq!(decode_literal("\"Adds two numbers\"").as_deref(), Some("Adds two numbers"));
        assert_eq!(decode_literal("'''tri\\tple'''").as_deref(), Some("tri\tple"));
        assert_eq!(decode_literal("r\"raw\\n\"").as_deref(), Some("raw\\n"));
        assert_eq!(decode_literal("U'caf\\xe9'").as_deref(), Some("café"));
        assert_eq!(decode_literal("b\"bytes\""), None);
        assert_eq!(decode_literal("f\"{x}\""), None);
        assert_eq!(decode_literal("Rb'x'"), None);
    }

    #[test]
    fn unescape_sequences() {
        assert_eq!(unescape("a\\\nb"), "ab");
        assert_eq!(unescape("\\101\\u00e9\\U0001F600"), "Aé😀");
        assert_eq!(unescape("\\d\\N{DASH}"), "\\d\\N{DASH}");
        assert_eq!(unescape("\\xZZ"), "\\xZZ");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }

    #[test]
    fn clean_strips_common_margin() {
        let doc = "\n    Extract hashtags.\n\n    Args:\n        text: input\n    ";
        assert_eq!(clean_docstring(doc), "Extract hashtags.\n\nArgs:\n    text: input");
    }

    #[test]
    fn clean_keeps_first_line_and_expands_tabs() {
        assert_eq!(clean_docstring("  Summary.\n\tIndented"), "Summary.\nIndented");
        assert_eq!(clean_docstring("One line"), "One line");
        assert_eq!(clean_docstring("\n\n  Body.\n"), "Body.");
    }
}
