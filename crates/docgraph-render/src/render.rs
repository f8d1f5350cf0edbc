/// Document rendering.
///
/// Section order for the flat shape is fixed: header, summary and risk badge,
/// background/clauses grid, risks/components grid, entities, causal relations,
/// then custom fields.
use std::fmt;

use serde_json::Value;

use crate::error::PayloadError;
use crate::html::{self, escape_html, EM_DASH};
use crate::label::format_label;
use crate::locale::{Locale, Strings};
use crate::model::{
    ContextGroup, ContextualDocument, DecisionContext, DocumentHeader, ExtractionPayload,
    FlatDocument, GenericDocument, LocalizedText, Shape,
};
use crate::value::render_value;

/// A rendered HTML fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    title: String,
    /// `None` for the empty-state placeholder.
    shape: Option<Shape>,
    html: String,
}

impl Document {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn shape(&self) -> Option<Shape> {
        self.shape
    }

    pub fn as_html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }

    /// The fragment wrapped in a self-contained page with inline CSS.
    pub fn standalone_page(&self, strings: &Strings) -> String {
        html::page(&self.title, strings.locale.as_str(), &self.html)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.html)
    }
}

/// Render an extraction payload. An absent or `null` payload yields the empty state.
pub fn render(data: Option<&Value>, strings: &Strings) -> Result<Document, PayloadError> {
    match data {
        None | Some(Value::Null) => Ok(empty_state(strings)),
        Some(value) => {
            let payload = ExtractionPayload::classify(value)?;
            Ok(render_payload(&payload, strings))
        }
    }
}

pub fn render_payload(payload: &ExtractionPayload, strings: &Strings) -> Document {
    let title = payload
        .header()
        .title
        .clone()
        .unwrap_or_else(|| strings.untitled.clone());

    let mut out = String::with_capacity(4096);
    out.push_str("<div class=\"decision-document\">\n");
    render_header(payload.header(), strings, &mut out);
    match payload {
        ExtractionPayload::Contextual(doc) => render_contextual(doc, strings, &mut out),
        ExtractionPayload::Flat(doc) => render_flat(doc, strings, &mut out),
        ExtractionPayload::Generic(doc) => render_generic(doc, strings, &mut out),
    }
    out.push_str("</div>\n");

    Document {
        title,
        shape: Some(payload.shape()),
        html: out,
    }
}

/// Confidence in `[0, 1]` as a rounded percentage, e.g. `0.756` -> `76%`.
pub fn format_confidence(score: f64) -> String {
    format!("{}%", (score * 100.0).round() as i64)
}

fn empty_state(strings: &Strings) -> Document {
    let html = format!(
        "<div class=\"empty-state\">\n<p>{}</p>\n<p class=\"hint\">{}</p>\n</div>\n",
        escape_html(&strings.empty_title),
        escape_html(&strings.empty_hint)
    );
    Document {
        title: strings.empty_title.clone(),
        shape: None,
        html,
    }
}

fn render_header(header: &DocumentHeader, strings: &Strings, out: &mut String) {
    let doc_type = header
        .document_type
        .as_deref()
        .unwrap_or(&strings.default_document_type);
    let title = header.title.as_deref().unwrap_or(&strings.untitled);

    out.push_str("<header class=\"doc-header\">\n");
    out.push_str(&format!("<div class=\"doc-badge\">{}</div>\n", escape_html(doc_type)));
    out.push_str(&format!("<h1 class=\"doc-title\">{}</h1>\n", escape_html(title)));
    out.push_str("<div class=\"doc-meta\">\n");
    out.push_str(&format!(
        "<span class=\"doc-id\">{}: {}</span>\n",
        escape_html(&strings.id_label),
        escape_html(header.document_id.as_deref().unwrap_or(&strings.not_available))
    ));
    out.push_str(&format!(
        "<span class=\"doc-version\">{}: {}</span>\n",
        escape_html(&strings.version_label),
        escape_html(header.version.as_deref().unwrap_or("-"))
    ));
    out.push_str(&format!(
        "<span class=\"doc-source\">{}: {}</span>\n",
        escape_html(&strings.source_label),
        escape_html(header.source.as_deref().unwrap_or("-"))
    ));
    out.push_str("</div>\n</header>\n");
}

// --- Flat ---

fn risk_class(level: &str) -> &'static str {
    match level {
        "low" => "risk low",
        "medium" => "risk medium",
        "high" => "risk high",
        _ => "risk",
    }
}

fn push_list(items: &[String], out: &mut String) {
    out.push_str("<ul>\n");
    for item in items {
        out.push_str(&format!("<li>{}</li>\n", escape_html(item)));
    }
    out.push_str("</ul>\n");
}

fn push_list_card(heading: &str, items: &[String], out: &mut String) {
    out.push_str("<div class=\"info-card\">\n");
    out.push_str(&format!("<h3>{}</h3>\n", escape_html(heading)));
    push_list(items, out);
    out.push_str("</div>\n");
}

fn render_flat(doc: &FlatDocument, strings: &Strings, out: &mut String) {
    out.push_str("<section class=\"summary-card\">\n");
    out.push_str(&format!("<h2>{}</h2>\n", escape_html(&strings.summary)));
    out.push_str(&format!(
        "<p>{}</p>\n",
        escape_html(doc.summary.as_deref().unwrap_or(EM_DASH))
    ));
    if let Some(level) = &doc.risk_level {
        out.push_str(&format!(
            "<span class=\"{}\">{}: {}</span>\n",
            risk_class(level),
            escape_html(&strings.risk_prefix),
            escape_html(&level.to_uppercase())
        ));
    }
    out.push_str("</section>\n");

    out.push_str("<section class=\"grid-two\">\n");
    push_list_card(&strings.decision_background, &doc.decision_background, out);
    push_list_card(&strings.key_clauses, &doc.key_clauses, out);
    out.push_str("</section>\n");

    out.push_str("<section class=\"grid-two\">\n");
    push_list_card(&strings.risks, &doc.risks, out);
    out.push_str("<div class=\"info-card\">\n");
    out.push_str(&format!("<h3>{}</h3>\n", escape_html(&strings.affected_components)));
    out.push_str("<div class=\"chip-list\">");
    for component in &doc.affected_components {
        out.push_str(&format!("<span class=\"chip\">{}</span>", escape_html(component)));
    }
    out.push_str("</div>\n</div>\n");
    out.push_str("</section>\n");

    out.push_str("<section class=\"info-card\">\n");
    out.push_str(&format!("<h3>{}</h3>\n", escape_html(&strings.entities)));
    out.push_str("<div class=\"entity-list\">\n");
    for entity in &doc.entities {
        out.push_str("<div class=\"entity-item\">\n");
        out.push_str(&format!("<div class=\"entity-title\">{}", escape_html(&entity.name)));
        if let Some(kind) = &entity.kind {
            out.push_str(&format!("<span class=\"entity-type\">{}</span>", escape_html(kind)));
        }
        out.push_str("</div>\n");
        if let Some(description) = &entity.description {
            out.push_str(&format!("<p>{}</p>\n", escape_html(description)));
        }
        out.push_str("</div>\n");
    }
    out.push_str("</div>\n</section>\n");

    out.push_str("<section class=\"info-card\">\n");
    out.push_str(&format!("<h3>{}</h3>\n", escape_html(&strings.causal_relations)));
    if doc.causal_relations.is_empty() {
        out.push_str(&format!(
            "<p class=\"muted\">{}</p>\n",
            escape_html(&strings.no_relations)
        ));
    } else {
        out.push_str("<div class=\"relation-table\">\n");
        for rel in &doc.causal_relations {
            out.push_str("<div class=\"relation-row\">");
            out.push_str(&format!(
                "<span class=\"relation-type\">{}</span>",
                escape_html(&rel.relation_type)
            ));
            out.push_str(&format!(
                "<span class=\"relation-source\">{}</span>",
                escape_html(&rel.source)
            ));
            out.push_str("<span class=\"relation-arrow\">\u{2192}</span>");
            out.push_str(&format!(
                "<span class=\"relation-target\">{}</span>",
                escape_html(&rel.target)
            ));
            if let Some(evidence) = &rel.evidence {
                out.push_str(&format!(
                    "<span class=\"relation-evidence\">{}</span>",
                    escape_html(evidence)
                ));
            }
            out.push_str("</div>\n");
        }
        out.push_str("</div>\n");
    }
    out.push_str("</section>\n");

    if !doc.custom_fields.is_empty() {
        out.push_str("<section class=\"info-card\">\n");
        out.push_str(&format!("<h3>{}</h3>\n", escape_html(&strings.custom_fields)));
        for (key, node) in &doc.custom_fields {
            out.push_str("<div class=\"custom-block\">\n");
            out.push_str(&format!("<h4>{}</h4>\n", escape_html(&format_label(key))));
            render_value(node, out);
            out.push_str("</div>\n");
        }
        out.push_str("</section>\n");
    }
}

// --- Generic ---

fn render_generic(doc: &GenericDocument, strings: &Strings, out: &mut String) {
    for (key, node) in &doc.sections {
        let heading = match key {
            Some(key) => format_label(key),
            None => strings.raw_payload.clone(),
        };
        out.push_str("<section class=\"info-card\">\n");
        out.push_str(&format!("<h3>{}</h3>\n", escape_html(&heading)));
        render_value(node, out);
        out.push_str("</section>\n");
    }
}

// --- Contextual ---

fn localized<'a>(text: &'a LocalizedText, locale: Locale) -> (&'a str, &'a str) {
    match locale {
        Locale::Zh => (&text.zh, &text.en),
        Locale::En => (&text.en, &text.zh),
    }
}

fn render_contextual(doc: &ContextualDocument, strings: &Strings, out: &mut String) {
    for group in doc.grouped() {
        render_context_group(&group, strings, out);
    }
}

fn render_context_group(group: &ContextGroup<'_>, strings: &Strings, out: &mut String) {
    out.push_str(&format!(
        "<section class=\"context-group level-{}\" style=\"--accent: {}\">\n",
        group.level.as_str().to_ascii_lowercase(),
        group.level.accent_color()
    ));
    out.push_str(&format!(
        "<h2>{} ({})</h2>\n",
        escape_html(strings.level_name(group.level)),
        group.contexts.len()
    ));
    for ctx in &group.contexts {
        render_context(ctx, strings, out);
    }
    out.push_str("</section>\n");
}

fn render_context(ctx: &DecisionContext, strings: &Strings, out: &mut String) {
    let (primary, secondary) = localized(&ctx.title, strings.locale);

    out.push_str("<article class=\"context-card\">\n");
    out.push_str("<div class=\"context-title\">\n");
    if let Some(score) = ctx.confidence_score {
        out.push_str(&format!(
            "<span class=\"confidence\" title=\"{}\">{}</span>\n",
            escape_html(&strings.confidence),
            format_confidence(score)
        ));
    }
    out.push_str(&format!("<h3>{}</h3>\n", escape_html(primary)));
    out.push_str(&format!("<span class=\"alt-lang\">{}</span>\n", escape_html(secondary)));
    if let Some(id) = &ctx.context_id {
        out.push_str(&format!("<span class=\"context-id muted\">{}</span>\n", escape_html(id)));
    }
    out.push_str("</div>\n");

    if !ctx.primary_roles.is_empty() {
        out.push_str(&format!("<h4>{}</h4>\n", escape_html(&strings.primary_roles)));
        out.push_str("<div class=\"chip-list\">");
        for role in &ctx.primary_roles {
            out.push_str(&format!("<span class=\"chip\">{}</span>", escape_html(role)));
        }
        out.push_str("</div>\n");
    }

    if !ctx.decision_boundaries.is_empty() {
        out.push_str(&format!("<h4>{}</h4>\n", escape_html(&strings.decision_boundaries)));
        out.push_str("<ul class=\"boundary-list\">\n");
        for boundary in &ctx.decision_boundaries {
            let (text, _) = localized(&boundary.description, strings.locale);
            out.push_str(&format!(
                "<li><span class=\"boundary-type\">{}</span> {}</li>\n",
                escape_html(&boundary.boundary_type),
                escape_html(text)
            ));
        }
        out.push_str("</ul>\n");
    }

    if !ctx.conditions.is_empty() {
        out.push_str(&format!("<h4>{}</h4>\n", escape_html(&strings.conditions)));
        push_list(&ctx.conditions, out);
    }
    if !ctx.risks.is_empty() {
        out.push_str(&format!("<h4>{}</h4>\n", escape_html(&strings.context_risks)));
        push_list(&ctx.risks, out);
    }

    for (heading, note) in [
        (&strings.non_applicability, &ctx.non_applicability),
        (&strings.architecture_evolution, &ctx.architecture_evolution),
    ] {
        if let Some(note) = note {
            let (text, _) = localized(note, strings.locale);
            out.push_str(&format!("<h4>{}</h4>\n", escape_html(heading)));
            out.push_str(&format!("<p>{}</p>\n", escape_html(text)));
        }
    }

    out.push_str("</article>\n");
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn zh() -> Strings {
        Strings::for_locale(Locale::Zh)
    }

    fn render_ok(value: Value, strings: &Strings) -> String {
        render(Some(&value), strings).expect("renders").into_html()
    }

    #[test]
    fn absent_payload_renders_empty_state() {
        let strings = zh();
        for doc in [render(None, &strings), render(Some(&Value::Null), &strings)] {
            let doc = doc.expect("renders");
            assert_eq!(doc.shape(), None);
            let html = doc.into_html();
            assert!(html.contains("class=\"empty-state\""));
            assert!(html.contains("尚未產生解析內容"));
        }
    }

    #[test]
    fn confidence_is_rounded_percentage() {
        assert_eq!(format_confidence(0.756), "76%");
        assert_eq!(format_confidence(0.0), "0%");
        assert_eq!(format_confidence(1.0), "100%");
        assert_eq!(format_confidence(0.125), "13%");
        assert_eq!(format_confidence(0.5), "50%");
    }

    #[test]
    fn summary_and_entity_card() {
        let html = render_ok(
            json!({"summary": "ok", "entities": [{"name": "Beam A", "type": "steel"}]}),
            &zh(),
        );
        assert!(html.contains("<h2>摘要</h2>\n<p>ok</p>"));
        assert_eq!(html.matches("class=\"entity-item\"").count(), 1);
        assert!(html.contains(
            "<div class=\"entity-title\">Beam A<span class=\"entity-type\">steel</span></div>"
        ));
        assert!(!html.contains("自定義欄位"));
    }

    #[test]
    fn empty_relations_show_message() {
        let html = render_ok(json!({"summary": "s", "causal_relations": []}), &zh());
        assert!(html.contains("<p class=\"muted\">未解析到明確關係。</p>"));
        assert!(!html.contains("relation-row"));
    }

    #[test]
    fn relations_render_as_rows() {
        let html = render_ok(
            json!({
                "summary": "s",
                "causal_relations": [
                    {"relation_type": "CAUSES", "source": "Load", "target": "Crack", "evidence": "p.3"},
                    {"relation_type": "AFFECTS", "source": "Crack", "target": "Beam"},
                ],
            }),
            &zh(),
        );
        assert_eq!(html.matches("<div class=\"relation-row\">").count(), 2);
        assert!(html.contains("<span class=\"relation-evidence\">p.3</span>"));
        assert_eq!(html.matches("relation-evidence").count(), 1);
    }

    #[test]
    fn flat_sections_keep_fixed_order() {
        let html = render_ok(
            json!({
                "zz_custom": "last",
                "risks": ["r"],
                "summary": "s",
                "risk_level": "high",
                "document_metadata": {"document_title": "ECN", "document_id": "ECN-9"},
            }),
            &Strings::for_locale(Locale::En),
        );
        let order = [
            "class=\"doc-header\"",
            "class=\"summary-card\"",
            "Decision Background",
            "Risks &amp; Issues",
            "Key Entities",
            "Causal / Logical Relations",
            "Custom Fields",
            "<h4>Zz Custom</h4>",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|needle| html.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "order: {positions:?}");
        assert!(html.contains("<span class=\"risk high\">Risk: HIGH</span>"));
        assert!(html.contains("ID: ECN-9"));
        assert!(html.contains("Version: -"));
    }

    #[test]
    fn unrecognized_payload_falls_back_to_generic() {
        let payload = json!({"foo": [1, 2, 3], "bar": "x"});
        let doc = render(Some(&payload), &zh()).expect("renders");
        assert_eq!(doc.shape(), Some(Shape::Generic));
        let html = doc.into_html();
        assert!(html.contains("<h3>Foo</h3>\n<ul>\n<li>1</li>\n<li>2</li>\n<li>3</li>\n</ul>"));
        assert!(html.contains("<h3>Bar</h3>\n<p>x</p>"));
        assert!(html.contains("<h1 class=\"doc-title\">未命名文件</h1>"));
        assert!(html.contains("<div class=\"doc-badge\">Document</div>"));
    }

    #[test]
    fn cjk_keys_keep_their_label() {
        let html = render_ok(json!({"標題": "x", "document_id": "D-1"}), &zh());
        assert!(html.contains("<h3>標題</h3>"));
        assert!(html.contains("<h3>Document Id</h3>"));
        assert!(html.contains("ID: D-1"));
    }

    #[test]
    fn contextual_groups_and_confidence() {
        let payload = json!({
            "document_metadata": {"document_title": "Tower B"},
            "contexts": [
                {
                    "decision_level": "M",
                    "title": {"zh": "採用鋼構", "en": "Adopt steel frame"},
                    "confidence_score": 0.756,
                    "primary_roles": ["Structural engineer"],
                    "decision_boundaries": [
                        {"boundary_type": "budget", "description": {"zh": "預算上限", "en": "Budget cap"}}
                    ],
                    "non_applicability": {"zh": "非高樓", "en": "Low-rise"},
                },
            ],
        });
        let strings = Strings::for_locale(Locale::En);
        let html = render_ok(payload, &strings);
        assert!(html.contains("Medium decisions (1)"));
        assert!(!html.contains("Large decisions"));
        assert!(!html.contains("Strategic decisions"));
        assert!(html.contains(">76%</span>"));
        assert!(html.contains("<h3>Adopt steel frame</h3>\n<span class=\"alt-lang\">採用鋼構</span>"));
        assert!(html.contains("Budget cap"));
        assert!(html.contains("Low-rise"));
        assert!(!html.contains("Architecture Evolution"));
    }

    #[test]
    fn malformed_contextual_payload_is_an_error() {
        let payload = json!({"contexts": [{"decision_level": "L", "title": {"zh": "只有中文"}}]});
        assert!(render(Some(&payload), &zh()).is_err());
    }

    #[test]
    fn rendering_is_pure() {
        let payload = json!({
            "summary": "ok",
            "extra": [{"a": 1}, {"b": 2}],
            "entities": [{"name": "Beam A"}],
        });
        let before = payload.clone();
        let strings = zh();
        let first = render(Some(&payload), &strings).expect("renders");
        let second = render(Some(&payload), &strings).expect("renders");
        assert_eq!(first, second);
        assert_eq!(payload, before);
    }

    #[test]
    fn standalone_page_carries_title() {
        let strings = zh();
        let doc = render(Some(&json!({"title": "Memo <1>", "x": 1})), &strings).expect("renders");
        assert_eq!(doc.title(), "Memo <1>");
        let page = doc.standalone_page(&strings);
        assert!(page.contains("<title>Memo &lt;1&gt;</title>"));
        assert!(page.contains("lang=\"zh-Hant\""));
    }
}
