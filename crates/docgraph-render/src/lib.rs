//! Adaptive rendering of extraction payloads into HTML documents.
//!
//! A payload is classified once into an [`ExtractionPayload`] (contextual decision
//! shape, flat document shape, or a generic map of values) and then rendered by a
//! separate pass. Rendering is a pure function of the payload and the injected
//! [`Strings`] table.

pub mod error;
pub mod html;
pub mod label;
pub mod locale;
pub mod model;
pub mod render;
pub mod value;

pub use error::PayloadError;
pub use label::format_label;
pub use locale::{Locale, Strings};
pub use model::{
    CausalRelation, ContextGroup, ContextualDocument, DecisionBoundary, DecisionContext,
    DecisionLevel, DocumentHeader, Entity, ExtractionPayload, FlatDocument, GenericDocument,
    LocalizedText, Shape,
};
pub use render::{format_confidence, render, render_payload, Document};
pub use value::{render_value, ValueNode};
