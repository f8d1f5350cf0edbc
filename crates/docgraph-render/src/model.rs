/// Typed extraction payloads.
///
/// The raw JSON is classified exactly once, at this boundary:
/// - a non-null `contexts` key selects the contextual decision shape, parsed strictly
/// - otherwise a truthy `document_metadata`, `summary` or `entities` selects the flat shape
/// - anything else is kept as a generic, ordered map of values
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PayloadError;
use crate::value::{text_of, ValueNode};

/// Top-level keys the flat renderer draws itself; anything else is a custom field.
pub const FLAT_FIELDS: &[&str] = &[
    "document_metadata",
    "summary",
    "summary_text",
    "risk_level",
    "decision_background",
    "key_clauses",
    "risks",
    "affected_components",
    "entities",
    "causal_relations",
];

const FLAT_MARKERS: &[&str] = &["document_metadata", "summary", "entities"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Contextual,
    Flat,
    Generic,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Contextual => "contextual",
            Shape::Flat => "flat",
            Shape::Generic => "generic",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionPayload {
    Contextual(ContextualDocument),
    Flat(FlatDocument),
    Generic(GenericDocument),
}

impl ExtractionPayload {
    pub fn classify(value: &Value) -> Result<Self, PayloadError> {
        let Some(data) = value.as_object() else {
            debug!("payload is not a record, rendering generically");
            return Ok(ExtractionPayload::Generic(GenericDocument::from_raw(value)));
        };

        let payload = match data.get("contexts") {
            Some(contexts) if !contexts.is_null() => {
                ExtractionPayload::Contextual(ContextualDocument::parse(data, contexts)?)
            }
            _ if FLAT_MARKERS
                .iter()
                .any(|key| data.get(*key).is_some_and(is_truthy)) =>
            {
                ExtractionPayload::Flat(FlatDocument::from_map(data))
            }
            _ => ExtractionPayload::Generic(GenericDocument::from_map(data)),
        };
        debug!(shape = payload.shape().as_str(), keys = data.len(), "payload classified");
        Ok(payload)
    }

    pub fn shape(&self) -> Shape {
        match self {
            ExtractionPayload::Contextual(_) => Shape::Contextual,
            ExtractionPayload::Flat(_) => Shape::Flat,
            ExtractionPayload::Generic(_) => Shape::Generic,
        }
    }

    pub fn header(&self) -> &DocumentHeader {
        match self {
            ExtractionPayload::Contextual(doc) => &doc.header,
            ExtractionPayload::Flat(doc) => &doc.header,
            ExtractionPayload::Generic(doc) => &doc.header,
        }
    }
}

/// Loose truthiness used for shape markers: `null`, `false`, `0` and `""` do not count.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Non-empty display text of a field, if any.
fn field_text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Bool(false) => None,
        v => Some(text_of(v)),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(text_of).collect(),
        Some(other) => vec![text_of(other)],
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentHeader {
    pub title: Option<String>,
    pub document_type: Option<String>,
    pub document_id: Option<String>,
    pub version: Option<String>,
    pub source: Option<String>,
}

impl DocumentHeader {
    /// Header built from `document_metadata`, with title and type falling back to
    /// top-level keys. With `top_level_meta`, id/version/source fall back too.
    fn from_map(data: &Map<String, Value>, top_level_meta: bool) -> Self {
        let empty = Map::new();
        let meta = data
            .get("document_metadata")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let fallback = |key: &str| {
            field_text(meta, key).or_else(|| {
                if top_level_meta {
                    field_text(data, key)
                } else {
                    None
                }
            })
        };

        Self {
            title: field_text(meta, "document_title")
                .or_else(|| field_text(meta, "title"))
                .or_else(|| field_text(data, "document_title"))
                .or_else(|| field_text(data, "title")),
            document_type: field_text(meta, "document_type")
                .or_else(|| field_text(data, "document_type")),
            document_id: fallback("document_id"),
            version: fallback("version"),
            source: fallback("source"),
        }
    }
}

// --- Flat document shape ---

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    pub kind: Option<String>,
    pub description: Option<String>,
}

impl Entity {
    fn from_value(value: &Value) -> Self {
        match value.as_object() {
            Some(map) => Self {
                name: field_text(map, "name").unwrap_or_default(),
                kind: field_text(map, "type"),
                description: field_text(map, "description"),
            },
            None => Self {
                name: text_of(value),
                kind: None,
                description: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CausalRelation {
    pub relation_type: String,
    pub source: String,
    pub target: String,
    pub evidence: Option<String>,
}

impl CausalRelation {
    fn from_value(value: &Value) -> Self {
        let empty = Map::new();
        let map = value.as_object().unwrap_or(&empty);
        Self {
            relation_type: field_text(map, "relation_type").unwrap_or_default(),
            source: field_text(map, "source").unwrap_or_default(),
            target: field_text(map, "target").unwrap_or_default(),
            evidence: field_text(map, "evidence"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatDocument {
    pub header: DocumentHeader,
    pub summary: Option<String>,
    pub risk_level: Option<String>,
    pub decision_background: Vec<String>,
    pub key_clauses: Vec<String>,
    pub risks: Vec<String>,
    pub affected_components: Vec<String>,
    pub entities: Vec<Entity>,
    pub causal_relations: Vec<CausalRelation>,
    pub custom_fields: Vec<(String, ValueNode)>,
}

impl FlatDocument {
    fn from_map(data: &Map<String, Value>) -> Self {
        let items = |key: &str| match data.get(key) {
            Some(Value::Array(items)) => items.clone(),
            None | Some(Value::Null) => Vec::new(),
            Some(other) => vec![other.clone()],
        };

        Self {
            header: DocumentHeader::from_map(data, false),
            summary: field_text(data, "summary").or_else(|| field_text(data, "summary_text")),
            risk_level: field_text(data, "risk_level"),
            decision_background: string_list(data.get("decision_background")),
            key_clauses: string_list(data.get("key_clauses")),
            risks: string_list(data.get("risks")),
            affected_components: string_list(data.get("affected_components")),
            entities: items("entities").iter().map(Entity::from_value).collect(),
            causal_relations: items("causal_relations")
                .iter()
                .map(CausalRelation::from_value)
                .collect(),
            custom_fields: data
                .iter()
                .filter(|(key, _)| !FLAT_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), ValueNode::classify(value)))
                .collect(),
        }
    }
}

// --- Generic shape ---

#[derive(Debug, Clone, PartialEq)]
pub struct GenericDocument {
    pub header: DocumentHeader,
    /// Every top-level key except `document_metadata`, in payload order.
    /// A `None` key marks a non-record payload rendered as a whole.
    pub sections: Vec<(Option<String>, ValueNode)>,
}

impl GenericDocument {
    fn from_map(data: &Map<String, Value>) -> Self {
        Self {
            header: DocumentHeader::from_map(data, true),
            sections: data
                .iter()
                .filter(|(key, _)| key.as_str() != "document_metadata")
                .map(|(key, value)| (Some(key.clone()), ValueNode::classify(value)))
                .collect(),
        }
    }

    fn from_raw(value: &Value) -> Self {
        Self {
            header: DocumentHeader::default(),
            sections: vec![(None, ValueNode::classify(value))],
        }
    }
}

// --- Contextual decision shape ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionLevel {
    L,
    M,
    S,
}

impl DecisionLevel {
    pub const ALL: [DecisionLevel; 3] = [DecisionLevel::L, DecisionLevel::M, DecisionLevel::S];

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionLevel::L => "L",
            DecisionLevel::M => "M",
            DecisionLevel::S => "S",
        }
    }

    pub fn accent_color(&self) -> &'static str {
        match self {
            DecisionLevel::L => "#b42318",
            DecisionLevel::M => "#b54708",
            DecisionLevel::S => "#175cd3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub zh: String,
    pub en: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionBoundary {
    pub boundary_type: String,
    pub description: LocalizedText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    #[serde(default, deserialize_with = "id_text")]
    pub context_id: Option<String>,
    pub decision_level: DecisionLevel,
    pub title: LocalizedText,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub primary_roles: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub decision_boundaries: Vec<DecisionBoundary>,
    #[serde(default)]
    pub non_applicability: Option<LocalizedText>,
    #[serde(default)]
    pub architecture_evolution: Option<LocalizedText>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub conditions: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub risks: Vec<String>,
}

/// `null` reads as an empty sequence, like a missing key.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Context ids arrive as strings or bare numbers.
fn id_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::invalid_type(
            de::Unexpected::Other(&text_of(&other)),
            &"a string or number",
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextualDocument {
    pub header: DocumentHeader,
    pub contexts: Vec<DecisionContext>,
}

/// Contexts sharing one decision level, in payload order.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextGroup<'a> {
    pub level: DecisionLevel,
    pub contexts: Vec<&'a DecisionContext>,
}

impl ContextualDocument {
    fn parse(data: &Map<String, Value>, contexts: &Value) -> Result<Self, PayloadError> {
        let items = contexts.as_array().ok_or(PayloadError::ContextsNotSequence)?;
        let contexts = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                DecisionContext::deserialize(item)
                    .map_err(|source| PayloadError::MalformedContext { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            header: DocumentHeader::from_map(data, false),
            contexts,
        })
    }

    /// Partition contexts into the `L`, `M`, `S` buckets, dropping empty ones.
    pub fn grouped(&self) -> Vec<ContextGroup<'_>> {
        DecisionLevel::ALL
            .iter()
            .map(|level| ContextGroup {
                level: *level,
                contexts: self
                    .contexts
                    .iter()
                    .filter(|ctx| ctx.decision_level == *level)
                    .collect(),
            })
            .filter(|group| !group.contexts.is_empty())
            .collect()
    }
}
