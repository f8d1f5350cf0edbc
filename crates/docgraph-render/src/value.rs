/// Generic value rendering.
///
/// A raw JSON value is first classified into a [`ValueNode`] that records what
/// display shape it takes; [`render_value`] then draws the node. Nothing here
/// depends on the payload schema.
use serde_json::{Map, Value};

use crate::html::{escape_html, EM_DASH};
use crate::label::format_label;

#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    /// `null` or an empty sequence.
    Null,
    Scalar(String),
    /// Non-empty sequence with at least one non-record element.
    List(Vec<String>),
    /// Label/value pairs of a record, nested values flattened to compact JSON.
    Record(Vec<(String, String)>),
    /// Non-empty sequence of records. Columns are the union of keys in first-seen order.
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

impl ValueNode {
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::Null => ValueNode::Null,
            Value::Array(items) if items.is_empty() => ValueNode::Null,
            Value::Array(items) => {
                let records: Option<Vec<&Map<String, Value>>> =
                    items.iter().map(Value::as_object).collect();
                match records {
                    Some(records) => table_from_records(&records),
                    None => ValueNode::List(items.iter().map(text_of).collect()),
                }
            }
            Value::Object(map) => ValueNode::Record(
                map.iter()
                    .map(|(k, v)| (k.clone(), text_of(v)))
                    .collect(),
            ),
            scalar => ValueNode::Scalar(text_of(scalar)),
        }
    }
}

fn table_from_records(records: &[&Map<String, Value>]) -> ValueNode {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|col| match record.get(col) {
                    None | Some(Value::Null) => String::new(),
                    Some(v) => text_of(v),
                })
                .collect()
        })
        .collect();
    ValueNode::Table { columns, rows }
}

/// Stringify a JSON value for display: strings verbatim, everything else as compact JSON.
pub(crate) fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn render_value(node: &ValueNode, out: &mut String) {
    match node {
        ValueNode::Null => {
            out.push_str(&format!("<p class=\"muted\">{EM_DASH}</p>\n"));
        }
        ValueNode::Scalar(text) => {
            out.push_str(&format!("<p>{}</p>\n", escape_html(text)));
        }
        ValueNode::List(items) => {
            out.push_str("<ul>\n");
            for item in items {
                out.push_str(&format!("<li>{}</li>\n", escape_html(item)));
            }
            out.push_str("</ul>\n");
        }
        ValueNode::Record(pairs) => {
            out.push_str("<div class=\"key-value-grid\">\n");
            for (key, value) in pairs {
                out.push_str(&format!(
                    "<div class=\"key-value-row\"><span class=\"key\">{}</span><span class=\"value\">{}</span></div>\n",
                    escape_html(&format_label(key)),
                    escape_html(value)
                ));
            }
            out.push_str("</div>\n");
        }
        ValueNode::Table { columns, rows } => {
            out.push_str("<div class=\"relation-table\">\n");
            out.push_str("<div class=\"relation-row header\">");
            for col in columns {
                out.push_str(&format!(
                    "<span class=\"relation-type\">{}</span>",
                    escape_html(&format_label(col))
                ));
            }
            out.push_str("</div>\n");
            for row in rows {
                out.push_str("<div class=\"relation-row\">");
                for cell in row {
                    out.push_str(&format!(
                        "<span class=\"relation-source\">{}</span>",
                        escape_html(cell)
                    ));
                }
                out.push_str("</div>\n");
            }
            out.push_str("</div>\n");
        }
    }
}
