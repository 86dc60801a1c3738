//! HTML 结构扫描
//!
//! 按属性结构定位 `<a>` 标签的 href 值再替换，不做裸字符串替换，
//! 避免破坏含嵌套引号的属性。不依赖完整的 HTML 解析器：
//! 邮件正文只需要识别标签边界与带引号的属性值。

/// 扫描 HTML 中的每个 `<a ... href="...">`，由回调决定是否替换 href 值
///
/// 回调收到原始 href 文本，返回 `Some(new)` 时替换，`None` 保留原样。
pub fn rewrite_anchor_hrefs<F>(html: &str, mut replace: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len() + 256);
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'<' && is_anchor_open(bytes, i) {
            let tag_end = find_tag_end(bytes, i);
            match find_href_value(html, i, tag_end) {
                Some((value_start, value_end)) => {
                    let href = &html[value_start..value_end];
                    out.push_str(&html[i..value_start]);
                    match replace(href) {
                        Some(new_href) => out.push_str(&new_href),
                        None => out.push_str(href),
                    }
                    out.push_str(&html[value_end..tag_end]);
                }
                None => out.push_str(&html[i..tag_end]),
            }
            i = tag_end;
        } else {
            let ch = html[i..].chars().next().unwrap_or('\u{FFFD}');
            out.push(ch);
            i += ch.len_utf8();
        }
    }

    out
}

/// 在 `</body>` 前插入片段，找不到时追加到末尾
pub fn insert_before_body_end(html: &str, fragment: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + fragment.len());
            out.push_str(&html[..pos]);
            out.push_str(fragment);
            out.push_str(&html[pos..]);
            out
        }
        None => {
            let mut out = String::with_capacity(html.len() + fragment.len());
            out.push_str(html);
            out.push_str(fragment);
            out
        }
    }
}

/// `<a` 后必须跟空白或 `>`，排除 `<abbr>` 等标签
fn is_anchor_open(bytes: &[u8], i: usize) -> bool {
    if i + 1 >= bytes.len() {
        return false;
    }
    let c = bytes[i + 1];
    if c != b'a' && c != b'A' {
        return false;
    }
    match bytes.get(i + 2) {
        Some(b) => b.is_ascii_whitespace() || *b == b'>' || *b == b'/',
        None => false,
    }
}

/// 找到标签的 `>`（含），返回其后的下标；考虑引号内的 `>`
fn find_tag_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                } else if b == b'>' {
                    return i + 1;
                }
            }
        }
        i += 1;
    }
    bytes.len()
}

/// 在 [tag_start, tag_end) 内定位 href 属性值的字节区间
fn find_href_value(html: &str, tag_start: usize, tag_end: usize) -> Option<(usize, usize)> {
    let bytes = html.as_bytes();
    let mut i = tag_start;
    let mut quote: Option<u8> = None;

    while i + 4 < tag_end {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if b == b'"' || b == b'\'' {
            quote = Some(b);
            i += 1;
            continue;
        }
        // 属性名必须以空白开头，排除 data-href 之类
        if b.is_ascii_whitespace() && html[i + 1..tag_end].len() >= 4 {
            let rest = &bytes[i + 1..];
            if rest.len() >= 4 && rest[..4].eq_ignore_ascii_case(b"href") {
                let mut j = i + 5;
                while j < tag_end && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j < tag_end && bytes[j] == b'=' {
                    j += 1;
                    while j < tag_end && bytes[j].is_ascii_whitespace() {
                        j += 1;
                    }
                    if j < tag_end {
                        return match bytes[j] {
                            q @ (b'"' | b'\'') => {
                                let value_start = j + 1;
                                let mut k = value_start;
                                while k < tag_end && bytes[k] != q {
                                    k += 1;
                                }
                                Some((value_start, k))
                            }
                            _ => {
                                // 无引号属性值，到空白或 > 为止
                                let value_start = j;
                                let mut k = value_start;
                                while k < tag_end
                                    && !bytes[k].is_ascii_whitespace()
                                    && bytes[k] != b'>'
                                {
                                    k += 1;
                                }
                                Some((value_start, k))
                            }
                        };
                    }
                }
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_double_quoted_href() {
        let html = r#"<p>hi</p><a href="https://example.com/a?x=1&y=2">link</a>"#;
        let out = rewrite_anchor_hrefs(html, |href| {
            assert_eq!(href, "https://example.com/a?x=1&y=2");
            Some("REPLACED".to_string())
        });
        assert_eq!(out, r#"<p>hi</p><a href="REPLACED">link</a>"#);
    }

    #[test]
    fn rewrites_single_quoted_href() {
        let html = r#"<a href='https://example.com/"quoted"'>x</a>"#;
        let out = rewrite_anchor_hrefs(html, |href| {
            assert_eq!(href, r#"https://example.com/"quoted""#);
            Some("Y".to_string())
        });
        assert_eq!(out, "<a href='Y'>x</a>");
    }

    #[test]
    fn skips_other_tags_and_data_href() {
        let html = r#"<abbr href="no"><img src="a.png"><div data-href="no">t</div>"#;
        let mut calls = 0;
        let out = rewrite_anchor_hrefs(html, |_| {
            calls += 1;
            None
        });
        assert_eq!(calls, 0);
        assert_eq!(out, html);
    }

    #[test]
    fn handles_href_after_other_attributes() {
        let html = r#"<a class="btn" title="a > b" href="https://e.com">x</a>"#;
        let out = rewrite_anchor_hrefs(html, |href| {
            assert_eq!(href, "https://e.com");
            Some("T".to_string())
        });
        assert_eq!(out, r#"<a class="btn" title="a > b" href="T">x</a>"#);
    }

    #[test]
    fn callback_none_keeps_original() {
        let html = r#"<a href="mailto:a@b.com">mail</a>"#;
        let out = rewrite_anchor_hrefs(html, |_| None);
        assert_eq!(out, html);
    }

    #[test]
    fn pixel_inserted_before_body_close() {
        let html = "<html><body><p>hi</p></body></html>";
        let out = insert_before_body_end(html, "<img>");
        assert_eq!(out, "<html><body><p>hi</p><img></body></html>");
    }

    #[test]
    fn pixel_appended_without_body() {
        let out = insert_before_body_end("<p>hi</p>", "<img>");
        assert_eq!(out, "<p>hi</p><img>");
    }
}
