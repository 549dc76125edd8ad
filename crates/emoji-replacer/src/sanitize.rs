//! Sanitizer
//!
//! `sanitize` neutralizes markup metacharacters for use in attribute values
//! and text. An `&` that already starts a character reference is left as is,
//! which makes the function idempotent.

/// Escape markup metacharacters, keeping existing character references
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '&' if starts_char_ref(&text[i..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape literal text for inclusion in markup (not idempotent)
pub fn escape_text(text: &str) -> String {
    emoji_dom::escape_text(text)
}

/// `&name;`, `&#123;` or `&#x1F600;` at the start of `s`
fn starts_char_ref(s: &str) -> bool {
    let Some(body) = s.strip_prefix('&') else {
        return false;
    };
    let Some(end) = body.find(';') else {
        return false;
    };
    let name = &body[..end];
    if let Some(num) = name.strip_prefix('#') {
        return match num.strip_prefix(['x', 'X']) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()),
        };
    }
    !name.is_empty()
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}
