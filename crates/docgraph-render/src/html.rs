/// HTML helpers: text escaping and the self-contained page shell.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub(crate) const EM_DASH: &str = "\u{2014}";

/// Wrap a rendered fragment into a standalone page with inline CSS.
pub fn page(title: &str, lang: &str, body: &str) -> String {
    let mut html = String::with_capacity(body.len() + INLINE_CSS.len() + 512);
    html.push_str("<!DOCTYPE html>\n");
    html.push_str(&format!("<html lang=\"{}\">\n<head>\n", escape_html(lang)));
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    html.push_str("<style>\n");
    html.push_str(INLINE_CSS);
    html.push_str("</style>\n</head>\n<body>\n");
    html.push_str(body);
    html.push_str("</body>\n</html>\n");
    html
}

const INLINE_CSS: &str = r#"body { font-family: -apple-system, "Noto Sans TC", "Segoe UI", sans-serif; margin: 0; padding: 24px; background: #f6f8fb; color: #1f2a44; }
.decision-document { max-width: 960px; margin: 0 auto; }
.doc-header { margin-bottom: 20px; }
.doc-badge { display: inline-block; padding: 2px 10px; border-radius: 12px; background: #1f2a44; color: #fff; font-size: 12px; }
.doc-title { margin: 8px 0; }
.doc-meta span { margin-right: 16px; color: #5b6478; font-size: 13px; }
.summary-card, .info-card, .context-card { background: #fff; border: 1px solid #dde3ea; border-radius: 10px; padding: 16px; margin-bottom: 16px; }
.grid-two { display: grid; grid-template-columns: 1fr 1fr; gap: 16px; }
.risk { display: inline-block; padding: 2px 8px; border-radius: 6px; font-weight: 600; background: #eef1f5; }
.risk.low { background: #e3f6e8; color: #1e7b3a; }
.risk.medium { background: #fff4d6; color: #9a6700; }
.risk.high { background: #fde2e1; color: #b42318; }
.chip-list .chip { display: inline-block; padding: 2px 10px; margin: 2px; border-radius: 12px; background: #eef1f5; }
.entity-item { border-bottom: 1px solid #eef1f5; padding: 8px 0; }
.entity-type { margin-left: 8px; font-size: 12px; color: #5b6478; }
.relation-table { display: table; width: 100%; border-collapse: collapse; }
.relation-row { display: table-row; }
.relation-row > span { display: table-cell; padding: 4px 8px; border-bottom: 1px solid #eef1f5; }
.relation-row.header > span { font-weight: 600; background: #f2f5f9; }
.key-value-grid .key-value-row { display: grid; grid-template-columns: 180px 1fr; gap: 8px; padding: 4px 0; }
.key-value-row .key { font-weight: 600; }
.muted { color: #8a93a6; }
.empty-state { text-align: center; padding: 48px 16px; color: #5b6478; }
.empty-state .hint { font-size: 13px; }
.context-group { margin-bottom: 24px; border-left: 4px solid var(--accent); padding-left: 12px; }
.context-group h2 { color: var(--accent); }
.context-title .alt-lang { display: block; font-size: 13px; color: #5b6478; }
.confidence { float: right; font-weight: 600; color: var(--accent); }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn page_wraps_body() {
        let html = page("A <b>", "en", "<p>hi</p>");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>A &lt;b&gt;</title>"));
        assert!(html.contains("<p>hi</p>"));
        assert!(html.contains("<html lang=\"en\">"));
    }
}
