//! Markdown link normalization for outbound messages.
//!
//! The Feishu renderer mangles underscores and parentheses inside link
//! destinations, so URLs are percent-encoded (`_` `(` `)`) and bare URLs are
//! wrapped into explicit markdown links. Inline code spans and fenced code
//! blocks pass through untouched. Trailing sentence punctuation, and a
//! closing parenthesis with no opener inside the URL, stay outside the link.

const URL_SCHEMES: [&str; 2] = ["https://", "http://"];

/// Rewrite links in `text` into a form the platform renders stably.
#[must_use]
pub fn normalize_markdown_links(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < bytes.len() {
        let rest = &text[i..];
        if rest.starts_with("```") {
            let end = match rest[3..].find("```") {
                Some(pos) => i + 3 + pos + 3,
                None => bytes.len(),
            };
            out.push_str(&text[i..end]);
            i = end;
        } else if rest.starts_with('`') {
            let end = match rest[1..].find('`') {
                Some(pos) => i + 1 + pos + 1,
                None => bytes.len(),
            };
            out.push_str(&text[i..end]);
            i = end;
        } else if let Some(consumed) = try_autolink(rest, &mut out) {
            i += consumed;
        } else if let Some(consumed) = try_markdown_link(rest, &mut out) {
            i += consumed;
        } else if starts_with_url(rest) {
            let consumed = wrap_bare_url(rest, &mut out);
            i += consumed;
        } else {
            let ch = match rest.chars().next() {
                Some(c) => c,
                None => break,
            };
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    out
}

fn starts_with_url(s: &str) -> bool {
    URL_SCHEMES.iter().any(|scheme| s.starts_with(scheme))
}

/// Percent-encode the characters the renderer corrupts.
fn encode_destination(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for ch in url.chars() {
        match ch {
            '_' => out.push_str("%5F"),
            '(' => out.push_str("%28"),
            ')' => out.push_str("%29"),
            other => out.push(other),
        }
    }
    out
}

/// `<https://...>` autolink: rewrite to an explicit markdown link.
fn try_autolink(rest: &str, out: &mut String) -> Option<usize> {
    let inner = rest.strip_prefix('<')?;
    if !starts_with_url(inner) {
        return None;
    }
    let close = inner.find('>')?;
    let url = &inner[..close];
    if url.chars().any(char::is_whitespace) {
        return None;
    }
    let encoded = encode_destination(url);
    out.push_str(&format!("[{encoded}]({encoded})"));
    Some(close + 2)
}

/// `[label](dest)`: keep the label, encode the destination.
fn try_markdown_link(rest: &str, out: &mut String) -> Option<usize> {
    if !rest.starts_with('[') {
        return None;
    }
    let label_end = rest.find(']')?;
    let after_label = &rest[label_end + 1..];
    if !after_label.starts_with('(') {
        return None;
    }
    let dest_body = &after_label[1..];
    let mut depth = 1usize;
    let mut dest_len = None;
    for (idx, ch) in dest_body.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    dest_len = Some(idx);
                    break;
                }
            },
            c if c.is_whitespace() => return None,
            _ => {},
        }
    }
    let dest_len = dest_len?;
    let dest = &dest_body[..dest_len];
    if !starts_with_url(dest) {
        return None;
    }
    let label = &rest[..=label_end];
    out.push_str(label);
    out.push('(');
    out.push_str(&encode_destination(dest));
    out.push(')');
    Some(label_end + 1 + 1 + dest_len + 1)
}

/// Wrap a bare URL into `[url](url)`, leaving trailing punctuation and any
/// unbalanced closing parenthesis outside the link.
fn wrap_bare_url(rest: &str, out: &mut String) -> usize {
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '<' || c == '>')
        .unwrap_or(rest.len());
    let mut url = &rest[..end];

    loop {
        let Some(last) = url.chars().last() else { break };
        match last {
            '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '"' => {
                url = &url[..url.len() - last.len_utf8()];
            },
            ')' => {
                let opens = url.matches('(').count();
                let closes = url.matches(')').count();
                if closes > opens {
                    url = &url[..url.len() - 1];
                } else {
                    break;
                }
            },
            _ => break,
        }
    }

    let encoded = encode_destination(url);
    out.push_str(&format!("[{encoded}]({encoded})"));
    url.len()
}
