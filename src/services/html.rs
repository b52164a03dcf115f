//! Tolerant HTML slicing for scraped profile pages.
//!
//! Pages are treated as text: elements are located by tag name and class
//! list on a lowercased copy (ASCII-only lowering keeps byte offsets
//! aligned with the original), and text is taken up to the next closing tag
//! of the same name. Good enough for the leaf elements we read; only
//! `matching_close` balances nested same-name tags.

pub fn to_lower(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

/// Byte span `(start, open_end)` of the next `<tag ...>` at or after `from`
/// whose class attribute contains every class in `classes`
pub fn find_tag_with_classes(html: &str, tag: &str, classes: &[&str], from: usize) -> Option<(usize, usize)> {
    let lc = to_lower(html);
    let open = format!("<{}", to_lower(tag));
    let mut pos = from;

    while let Some(rel) = lc.get(pos..)?.find(&open) {
        let start = pos + rel;
        let after = start + open.len();
        let open_end = start + html[start..].find('>')? + 1;

        if is_tag_boundary(&lc, after) && has_classes(&html[start..open_end], classes) {
            return Some((start, open_end));
        }
        pos = after;
    }
    None
}

/// Text content from `open_end` up to the next `</tag`
pub fn text_until_close(html: &str, tag: &str, open_end: usize) -> Option<String> {
    let lc = to_lower(html);
    let close = format!("</{}", to_lower(tag));
    let end = lc.get(open_end..)?.find(&close)? + open_end;
    Some(strip_tags(&html[open_end..end]))
}

/// Byte offset of the `</tag` closing the element whose opening tag ends at
/// `open_end`, balancing nested elements of the same name
pub fn matching_close(html: &str, tag: &str, open_end: usize) -> Option<usize> {
    let lc = to_lower(html);
    let open = format!("<{}", to_lower(tag));
    let close = format!("</{}", to_lower(tag));
    let mut depth = 1usize;
    let mut pos = open_end;

    loop {
        let rest = lc.get(pos..)?;
        let next_close = pos + rest.find(&close)?;
        match rest.find(&open).map(|rel| pos + rel) {
            Some(next_open) if next_open < next_close => {
                if is_tag_boundary(&lc, next_open + open.len()) {
                    depth += 1;
                }
                pos = next_open + open.len();
            }
            _ => {
                depth -= 1;
                if depth == 0 {
                    return Some(next_close);
                }
                pos = next_close + close.len();
            }
        }
    }
}

fn is_tag_boundary(lc: &str, at: usize) -> bool {
    matches!(lc[at..].chars().next(), Some(c) if c.is_ascii_whitespace() || c == '>' || c == '/')
}

/// Text of the first `<tag>` matching `classes` at or after `from`
pub fn element_text(html: &str, tag: &str, classes: &[&str], from: usize) -> Option<String> {
    let (_, open_end) = find_tag_with_classes(html, tag, classes, from)?;
    text_until_close(html, tag, open_end)
}

/// Class names declared on an opening tag
pub fn class_list(open_tag: &str) -> Vec<String> {
    let lc = to_lower(open_tag);
    let mut search_from = 0;

    while let Some(rel) = lc[search_from..].find("class=") {
        let at = search_from + rel;
        let preceded_by_space = lc[..at]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_whitespace());
        if preceded_by_space {
            let value_start = at + "class=".len();
            let rest = &open_tag[value_start..];
            let value = match rest.chars().next() {
                Some(q @ ('"' | '\'')) => rest[1..].split(q).next().unwrap_or(""),
                _ => rest
                    .split(|c: char| c.is_ascii_whitespace() || c == '>')
                    .next()
                    .unwrap_or(""),
            };
            return value.split_whitespace().map(to_lower).collect();
        }
        search_from = at + 1;
    }
    Vec::new()
}

fn has_classes(open_tag: &str, classes: &[&str]) -> bool {
    if classes.is_empty() {
        return true;
    }
    let declared = class_list(open_tag);
    classes
        .iter()
        .all(|wanted| declared.iter().any(|c| c.eq_ignore_ascii_case(wanted)))
}

/// Drop markup, decode the common entities and collapse whitespace
pub fn strip_tags<S: AsRef<str>>(s: S) -> String {
    let s = s.as_ref();

    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;

    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    normalize_ws(&decode_entities(&out))
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
