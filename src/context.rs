//! Context snippets attached to links and keywords.
//!
//! All lengths and radii are measured in characters, never bytes, so CJK
//! text is trimmed on character boundaries.

use crate::config::ContextSettings;

/// Join the lines surrounding `index` (inclusive) with `\n`.
pub fn surrounding_lines(lines: &[&str], index: usize, settings: &ContextSettings) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let start = index.saturating_sub(settings.lines_before);
    let end = (index + settings.lines_after + 1).min(lines.len());
    lines[start..end].join("\n")
}

/// Context for a link on `lines[index]`. Oversized windows are cut down to
/// the current line plus `radius` characters on either side.
pub fn line_context(lines: &[&str], index: usize, settings: &ContextSettings) -> String {
    let joined = surrounding_lines(lines, index, settings);
    let context = if char_len(&joined) > settings.trim_threshold() {
        recenter_on_line(&joined, lines[index], settings.radius)
    } else {
        joined
    };
    context.trim().to_string()
}

/// Context for a keyword found on `lines[index]`. Oversized windows are cut
/// to `radius` characters either side of the keyword's first occurrence.
pub fn token_context(
    lines: &[&str],
    index: usize,
    token: &str,
    settings: &ContextSettings,
) -> String {
    let joined = surrounding_lines(lines, index, settings);
    let context = if char_len(&joined) > settings.trim_threshold() {
        recenter_on_token(&joined, token, settings.radius)
    } else {
        joined
    };
    context.trim().to_string()
}

/// Falls back to the untrimmed text when `line` cannot be located.
pub fn recenter_on_line(joined: &str, line: &str, radius: usize) -> String {
    match joined.find(line) {
        Some(pos) => {
            let before = tail_chars(&joined[..pos], radius);
            let after = head_chars(&joined[pos + line.len()..], radius);
            format!("{}{}{}", before, line, after)
        }
        None => joined.to_string(),
    }
}

/// Falls back to the untrimmed text when `token` cannot be located.
pub fn recenter_on_token(joined: &str, token: &str, radius: usize) -> String {
    let Some(byte_pos) = joined.find(token) else {
        return joined.to_string();
    };
    let char_pos = joined[..byte_pos].chars().count();
    let start = char_pos.saturating_sub(radius);
    let end = (char_pos + radius).min(char_len(joined));
    joined.chars().skip(start).take(end - start).collect()
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn head_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn tail_chars(s: &str, n: usize) -> &str {
    let total = char_len(s);
    if total <= n {
        return s;
    }
    match s.char_indices().nth(total - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
