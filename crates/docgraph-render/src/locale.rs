/// Locale handling and the string table injected into every render call.
use serde::{Deserialize, Serialize};

use crate::model::DecisionLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Zh,
    En,
}

impl Locale {
    /// Resolve a language tag such as `zh-Hant`, `zh_TW` or `en`.
    ///
    /// An empty tag resolves to Chinese, the default output language of the
    /// extraction service.
    pub fn parse(tag: &str) -> Self {
        let normalized = tag.trim().to_ascii_lowercase().replace('_', "-");
        if normalized.is_empty() || normalized.starts_with("zh") {
            Locale::Zh
        } else {
            Locale::En
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Zh => "zh-Hant",
            Locale::En => "en",
        }
    }
}

/// Every label the renderer prints, resolved for one locale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strings {
    pub locale: Locale,
    pub empty_title: String,
    pub empty_hint: String,
    pub untitled: String,
    pub default_document_type: String,
    pub not_available: String,
    pub id_label: String,
    pub version_label: String,
    pub source_label: String,
    pub summary: String,
    pub risk_prefix: String,
    pub decision_background: String,
    pub key_clauses: String,
    pub risks: String,
    pub affected_components: String,
    pub entities: String,
    pub causal_relations: String,
    pub no_relations: String,
    pub custom_fields: String,
    pub raw_payload: String,
    pub level_large: String,
    pub level_medium: String,
    pub level_strategic: String,
    pub confidence: String,
    pub primary_roles: String,
    pub decision_boundaries: String,
    pub conditions: String,
    pub context_risks: String,
    pub non_applicability: String,
    pub architecture_evolution: String,
}

impl Strings {
    pub fn for_locale(locale: Locale) -> Self {
        match locale {
            Locale::Zh => Self::zh(),
            Locale::En => Self::en(),
        }
    }

    pub fn level_name(&self, level: DecisionLevel) -> &str {
        match level {
            DecisionLevel::L => &self.level_large,
            DecisionLevel::M => &self.level_medium,
            DecisionLevel::S => &self.level_strategic,
        }
    }

    fn zh() -> Self {
        Self {
            locale: Locale::Zh,
            empty_title: "尚未產生解析內容".to_string(),
            empty_hint: "上傳 PDF、IFC 或貼上文字後，這裡會顯示抽取結果。".to_string(),
            untitled: "未命名文件".to_string(),
            default_document_type: "Document".to_string(),
            not_available: "N/A".to_string(),
            id_label: "ID".to_string(),
            version_label: "Version".to_string(),
            source_label: "Source".to_string(),
            summary: "摘要".to_string(),
            risk_prefix: "Risk".to_string(),
            decision_background: "決策背景".to_string(),
            key_clauses: "關鍵條款".to_string(),
            risks: "風險與問題".to_string(),
            affected_components: "受影響構件".to_string(),
            entities: "涉及實體".to_string(),
            causal_relations: "因果 / 邏輯關係".to_string(),
            no_relations: "未解析到明確關係。".to_string(),
            custom_fields: "自定義欄位".to_string(),
            raw_payload: "原始內容".to_string(),
            level_large: "大型決策".to_string(),
            level_medium: "中型決策".to_string(),
            level_strategic: "策略決策".to_string(),
            confidence: "信心度".to_string(),
            primary_roles: "主要角色".to_string(),
            decision_boundaries: "決策邊界".to_string(),
            conditions: "前提條件".to_string(),
            context_risks: "風險".to_string(),
            non_applicability: "不適用情境".to_string(),
            architecture_evolution: "架構演進".to_string(),
        }
    }

    fn en() -> Self {
        Self {
            locale: Locale::En,
            empty_title: "No extraction result yet".to_string(),
            empty_hint: "Upload a PDF or IFC file, or paste text, to see the extracted result here."
                .to_string(),
            untitled: "Untitled document".to_string(),
            default_document_type: "Document".to_string(),
            not_available: "N/A".to_string(),
            id_label: "ID".to_string(),
            version_label: "Version".to_string(),
            source_label: "Source".to_string(),
            summary: "Summary".to_string(),
            risk_prefix: "Risk".to_string(),
            decision_background: "Decision Background".to_string(),
            key_clauses: "Key Clauses".to_string(),
            risks: "Risks & Issues".to_string(),
            affected_components: "Impacted Components".to_string(),
            entities: "Key Entities".to_string(),
            causal_relations: "Causal / Logical Relations".to_string(),
            no_relations: "No explicit relations found.".to_string(),
            custom_fields: "Custom Fields".to_string(),
            raw_payload: "Raw Payload".to_string(),
            level_large: "Large decisions".to_string(),
            level_medium: "Medium decisions".to_string(),
            level_strategic: "Strategic decisions".to_string(),
            confidence: "Confidence".to_string(),
            primary_roles: "Primary Roles".to_string(),
            decision_boundaries: "Decision Boundaries".to_string(),
            conditions: "Conditions".to_string(),
            context_risks: "Risks".to_string(),
            non_applicability: "Not Applicable When".to_string(),
            architecture_evolution: "Architecture Evolution".to_string(),
        }
    }
}

impl Default for Strings {
    fn default() -> Self {
        Self::for_locale(Locale::Zh)
    }
}
