//! Python string literal evaluation and rendering.
//!
//! Evaluation turns a `string` / `concatenated_string` node into the value the
//! interpreter would see. f-strings become `str.format` templates: every
//! interpolation is replaced by a `{}` placeholder (keeping `!conv` and
//! `:spec`) and its expression text is kept so the call site can be rewritten
//! to `NAME.format(expr, ...)`.

use tree_sitter::Node;

use crate::parse::node_text;

/// The evaluated content of a string literal expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatedString {
    /// Decoded value, or the `str.format` template for interpolated f-strings
    pub value: String,
    /// Every part used raw quoting
    pub is_raw: bool,
    /// Interpolated expressions in placeholder order (empty for plain strings)
    pub format_args: Vec<String>,
}

impl EvaluatedString {
    /// Whether this literal is a template that needs `.format(...)` at its site.
    pub fn is_formatted(&self) -> bool {
        !self.format_args.is_empty()
    }
}

enum Piece {
    Text(String),
    Placeholder { spec: String, expr: String },
}

struct Part {
    pieces: Vec<Piece>,
    is_raw: bool,
}

/// Evaluate a `string` or `concatenated_string` node.
///
/// Returns `None` for anything that must not become a constant: bytes and
/// template literals, `\N{...}` escapes, f-strings using `=` or nested
/// format-spec expressions.
pub fn evaluate(node: Node<'_>, source: &str) -> Option<EvaluatedString> {
    let parts = match node.kind() {
        "string" => vec![evaluate_part(node, source)?],
        "concatenated_string" => {
            let mut cursor = node.walk();
            let strings: Vec<Node<'_>> = node
                .named_children(&mut cursor)
                .filter(|child| child.kind() == "string")
                .collect();
            if strings.is_empty() {
                return None;
            }
            strings
                .into_iter()
                .map(|child| evaluate_part(child, source))
                .collect::<Option<Vec<_>>>()?
        }
        _ => return None,
    };

    let is_raw = parts.iter().all(|p| p.is_raw);
    let formatted = parts
        .iter()
        .flat_map(|p| p.pieces.iter())
        .any(|piece| matches!(piece, Piece::Placeholder { .. }));

    let mut value = String::new();
    let mut format_args = Vec::new();
    for piece in parts.into_iter().flat_map(|p| p.pieces) {
        match piece {
            Piece::Text(text) if formatted => value.push_str(&escape_braces(&text)),
            Piece::Text(text) => value.push_str(&text),
            Piece::Placeholder { spec, expr } => {
                value.push('{');
                value.push_str(&spec);
                value.push('}');
                format_args.push(expr);
            }
        }
    }

    Some(EvaluatedString {
        value,
        is_raw,
        format_args,
    })
}

fn evaluate_part(node: Node<'_>, source: &str) -> Option<Part> {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();

    let start = children.iter().find(|c| c.kind() == "string_start")?;
    let end = children.iter().rev().find(|c| c.kind() == "string_end")?;

    let start_text = node_text(*start, source);
    let prefix = start_text
        .trim_end_matches(['"', '\''])
        .to_ascii_lowercase();
    if prefix.contains('b') || prefix.contains('t') {
        return None;
    }
    let is_raw = prefix.contains('r');
    let is_fstring = prefix.contains('f');

    let mut pieces = Vec::new();
    let mut offset = start.end_byte();
    for child in children.iter().filter(|c| c.kind() == "interpolation") {
        if !is_fstring {
            return None;
        }
        let text = source.get(offset..child.start_byte())?;
        pieces.push(Piece::Text(decode_segment(text, is_raw, true)?));
        pieces.push(placeholder(*child, source)?);
        offset = child.end_byte();
    }
    let text = source.get(offset..end.start_byte())?;
    pieces.push(Piece::Text(decode_segment(text, is_raw, is_fstring)?));

    Some(Part { pieces, is_raw })
}

fn placeholder(node: Node<'_>, source: &str) -> Option<Piece> {
    let expr = node.child_by_field_name("expression")?;

    let mut cursor = node.walk();
    if node.children(&mut cursor).any(|c| c.kind() == "=") {
        return None;
    }

    let mut spec = String::new();
    if let Some(conversion) = node.child_by_field_name("type_conversion") {
        spec.push_str(node_text(conversion, source));
    }
    if let Some(format_spec) = node.child_by_field_name("format_specifier") {
        let mut cursor = format_spec.walk();
        let nested = format_spec
            .named_children(&mut cursor)
            .any(|c| matches!(c.kind(), "format_expression" | "interpolation"));
        if nested {
            return None;
        }
        spec.push_str(node_text(format_spec, source));
    }
    if spec.contains(['{', '}']) {
        return None;
    }

    let text = node_text(expr, source);
    // Bare tuples, yields and lambdas are not valid call arguments.
    let expr = match expr.kind() {
        "expression_list" | "pattern_list" | "yield" | "lambda" => format!("({text})"),
        _ => text.to_string(),
    };
    Some(Piece::Placeholder { spec, expr })
}

fn decode_segment(text: &str, is_raw: bool, is_fstring: bool) -> Option<String> {
    let text = if is_fstring {
        text.replace("{{", "{").replace("}}", "}")
    } else {
        text.to_string()
    };
    if is_raw {
        Some(text)
    } else {
        decode_escapes(&text)
    }
}

fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

/// Decode backslash escapes of a non-raw `str` literal body.
///
/// Unknown escapes keep their backslash, as Python does. `\N{...}` needs the
/// Unicode name table and yields `None`.
pub fn decode_escapes(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

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
                let mut code = next.to_digit(8)?;
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code)?);
            }
            'x' => out.push(take_hex(&mut chars, 2)?),
            'u' => out.push(take_hex(&mut chars, 4)?),
            'U' => out.push(take_hex(&mut chars, 8)?),
            'N' => return None,
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

fn take_hex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, digits: usize) -> Option<char> {
    let mut code = 0u32;
    for _ in 0..digits {
        code = code * 16 + chars.next()?.to_digit(16)?;
    }
    char::from_u32(code)
}

/// Render a value as Python source.
///
/// Raw quoting is kept when the value can be expressed that way; values
/// containing a line break use triple quotes.
pub fn render_string_literal(value: &str, prefer_raw: bool) -> String {
    let multiline = value.contains('\n');
    let quotes = if multiline { "\"\"\"" } else { "\"" };

    if prefer_raw && can_render_raw(value) {
        return format!("r{quotes}{value}{quotes}");
    }

    let mut body = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => body.push_str("\\\\"),
            '"' => body.push_str("\\\""),
            '\n' => body.push('\n'),
            '\r' => body.push_str("\\r"),
            '\t' => body.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\x7f' => {
                body.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => body.push(c),
        }
    }
    format!("{quotes}{body}{quotes}")
}

fn can_render_raw(value: &str) -> bool {
    let trailing_backslashes = value.chars().rev().take_while(|c| *c == '\\').count();
    !value.contains('"')
        && !value.contains('\r')
        && trailing_backslashes % 2 == 0
        && !value.chars().any(|c| (c as u32) < 0x20 && c != '\n' && c != '\t')
}
