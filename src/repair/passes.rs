//! Individual text-repair passes.
//!
//! Each pass is a pure `&str -> String` (or `&str -> &str`) transform with
//! no knowledge of the pipeline ordering; `mod.rs` composes them. All
//! passes operate on `char` boundaries so multi-byte text (accented and
//! extended-Latin characters) survives untouched.

/// Strip a markdown code-fence wrapper (```json ... ``` or ``` ... ```).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...) on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Slice to the substring between the first `{` and the last `}`.
/// Returns the input unchanged when no such pair exists.
pub fn slice_to_braces(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}

/// Decode the HTML entities that upstream scraped content commonly leaks
/// into generated text. `&quot;` decodes to a bare quote on purpose: the
/// stray-quote pass afterwards escapes it properly for JSON.
pub fn decode_html_entities(text: &str) -> String {
    // `&amp;` last, so `&amp;quot;` does not double-decode.
    const ENTITIES: [(&str, &str); 8] = [
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&apos;", "'"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&nbsp;", " "),
        ("&hellip;", "…"),
        ("&amp;", "&"),
    ];
    let mut out = text.to_string();
    for (entity, replacement) in ENTITIES {
        if out.contains(entity) {
            out = out.replace(entity, replacement);
        }
    }
    out
}

/// Repair string interiors: fold raw line breaks into `\n` escapes and
/// escape stray quotes that do not terminate the string.
///
/// A quote inside a string is treated as the real terminator only when
/// the next non-space character is a JSON delimiter (`,`, `}`, `]`, `:`)
/// or the end of input; anything else means the model emitted an
/// unescaped quote mid-value.
pub fn fix_string_interiors(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            i += 1;
            continue;
        }

        match c {
            '\\' => {
                // Keep the escape pair as-is.
                out.push(c);
                if i + 1 < chars.len() {
                    out.push(chars[i + 1]);
                    i += 1;
                }
                i += 1;
            }
            '\r' | '\n' => {
                // Collapse \r\n into a single escaped newline.
                out.push_str("\\n");
                if c == '\r' && chars.get(i + 1) == Some(&'\n') {
                    i += 1;
                }
                i += 1;
            }
            '"' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                match next {
                    // A following `"` means the model dropped the comma
                    // before the next key; still a real terminator.
                    None | Some(',') | Some('}') | Some(']') | Some(':') | Some('"') => {
                        in_string = false;
                        out.push('"');
                    }
                    _ => out.push_str("\\\""),
                }
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Replace control characters (below 0x20, plus 0x7F) with a single space.
/// Char-based, so accented and extended-Latin characters are preserved —
/// a naive "printable ASCII only" filter would destroy legitimate
/// non-English text.
pub fn sanitize_control_chars(text: &str) -> String {
    text.chars()
        .map(|c| if c < '\u{20}' || c == '\u{7f}' { ' ' } else { c })
        .collect()
}

/// Insert the commas small models drop between adjacent members:
/// `}"key":` and `"value" "key":` both gain the missing `,`.
pub fn insert_missing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    // Set after a `}`/`]` or a closing quote; a bare `"` that follows one
    // of those starts a new member and needs a separator.
    let mut just_closed = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if c == '\\' {
                out.push(c);
                if i + 1 < chars.len() {
                    out.push(chars[i + 1]);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
                just_closed = true;
                out.push(c);
            } else {
                out.push(c);
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                if just_closed {
                    out.push(',');
                }
                in_string = true;
                just_closed = false;
                out.push(c);
            }
            '}' | ']' => {
                just_closed = true;
                out.push(c);
            }
            ',' | ':' => {
                just_closed = false;
                out.push(c);
            }
            c if c.is_whitespace() => out.push(c),
            _ => {
                just_closed = false;
                out.push(c);
            }
        }
        i += 1;
    }
    out
}

/// Close a string left unterminated at the end of the input.
pub fn close_unterminated_string(text: &str) -> String {
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            _ => {}
        }
    }
    if in_string {
        let mut out = text.trim_end().to_string();
        out.push('"');
        out
    } else {
        text.to_string()
    }
}

/// Truncate abnormally long string values, closing them with an explicit
/// marker instead of leaving the tail to whatever broke the output.
pub fn truncate_long_strings(text: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut run = 0usize;
    let mut dropping = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !in_string {
            if c == '"' {
                in_string = true;
                run = 0;
                dropping = false;
            }
            out.push(c);
            i += 1;
            continue;
        }

        match c {
            '\\' => {
                if !dropping {
                    out.push(c);
                    if i + 1 < chars.len() {
                        out.push(chars[i + 1]);
                    }
                }
                run += 1;
                i += 2;
            }
            '"' => {
                if dropping {
                    out.push_str("(truncated)");
                }
                in_string = false;
                out.push(c);
                i += 1;
            }
            _ => {
                run += 1;
                if run > max_len {
                    dropping = true;
                }
                if !dropping {
                    out.push(c);
                }
                i += 1;
            }
        }
    }
    if dropping {
        out.push_str("(truncated)");
    }
    out
}

/// Collapse runs of commas (`,,` or `, ,`) into a single comma.
pub fn collapse_repeated_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if i + 1 < chars.len() {
                    out.push(chars[i + 1]);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            ',' => {
                out.push(',');
                // Swallow any following whitespace-separated commas.
                let mut j = i + 1;
                while j < chars.len() && (chars[j] == ',' || chars[j].is_whitespace()) {
                    if chars[j] == ',' {
                        i = j;
                    }
                    j += 1;
                }
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Strip a trailing comma immediately before `}` or `]`.
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if i + 1 < chars.len() {
                    out.push(chars[i + 1]);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if matches!(next, Some('}') | Some(']')) {
                    i += 1; // drop the comma, keep the whitespace
                } else {
                    out.push(',');
                    i += 1;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Force the payload into a `{ ... }` envelope: prepend `{` if missing
/// and append enough `}` to balance unclosed objects.
pub fn enforce_object_envelope(text: &str) -> String {
    let mut out = text.trim().to_string();
    if !out.starts_with('{') {
        out.insert(0, '{');
    }

    let mut in_string = false;
    let mut escaped = false;
    let mut depth: i32 = 0;
    for c in out.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth -= 1,
            _ => {}
        }
    }
    for _ in 0..depth.max(0) {
        out.push('}');
    }
    out
}
