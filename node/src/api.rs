// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use cim_kernel::aggregate::Aggregate;
use cim_kernel::cid::Cid;
use cim_kernel::dialog::{DialogCommand, DialogState};
use cim_kernel::fxp::ops::{from_f64_checked, to_f64};
use cim_kernel::graph::{GraphCommand, GraphState};
use cim_kernel::types::attrs::{AttrValue, Attributes};
use cim_kernel::types::enums::{EdgeKind, NodeKind, SpeakerRole};
use cim_kernel::types::id::{EdgeId, NodeId, StreamId};
use cim_kernel::types::Sequence;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::events::CommandOutcome;
use crate::projection::Projection;
use crate::store::ExportedEnvelope;

// Kinds and roles travel as their u8 discriminants, like the kernel's `from_u8`.

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphCommandRequest {
    CreateGraph {
        name: String,
    },
    RenameGraph {
        name: String,
    },
    TagGraph {
        tag: String,
    },
    UntagGraph {
        tag: String,
    },
    AddNode {
        id: u64,
        #[serde(default)]
        kind: u8,
        #[serde(default)]
        attributes: Map<String, Value>,
    },
    UpdateNode {
        id: u64,
        #[serde(default)]
        set: Map<String, Value>,
        #[serde(default)]
        unset: Vec<String>,
    },
    RemoveNode {
        id: u64,
    },
    AddEdge {
        id: u64,
        source: u64,
        target: u64,
        #[serde(default)]
        kind: u8,
        #[serde(default)]
        attributes: Map<String, Value>,
    },
    RemoveEdge {
        id: u64,
    },
}

impl GraphCommandRequest {
    pub fn into_command(self) -> Result<GraphCommand, String> {
        Ok(match self {
            GraphCommandRequest::CreateGraph { name } => GraphCommand::CreateGraph { name },
            GraphCommandRequest::RenameGraph { name } => GraphCommand::RenameGraph { name },
            GraphCommandRequest::TagGraph { tag } => GraphCommand::TagGraph { tag },
            GraphCommandRequest::UntagGraph { tag } => GraphCommand::UntagGraph { tag },
            GraphCommandRequest::AddNode { id, kind, attributes } => GraphCommand::AddNode {
                id: NodeId(id),
                kind: NodeKind::from_u8(kind).ok_or_else(|| format!("unknown node kind {}", kind))?,
                attributes: json_to_attrs(attributes)?,
            },
            GraphCommandRequest::UpdateNode { id, set, unset } => GraphCommand::UpdateNode {
                id: NodeId(id),
                set: json_to_attrs(set)?,
                unset,
            },
            GraphCommandRequest::RemoveNode { id } => GraphCommand::RemoveNode { id: NodeId(id) },
            GraphCommandRequest::AddEdge {
                id,
                source,
                target,
                kind,
                attributes,
            } => GraphCommand::AddEdge {
                id: EdgeId(id),
                source: NodeId(source),
                target: NodeId(target),
                kind: EdgeKind::from_u8(kind).ok_or_else(|| format!("unknown edge kind {}", kind))?,
                attributes: json_to_attrs(attributes)?,
            },
            GraphCommandRequest::RemoveEdge { id } => GraphCommand::RemoveEdge { id: EdgeId(id) },
        })
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogCommandRequest {
    StartDialog {
        title: String,
        #[serde(default)]
        model: Option<String>,
    },
    AddTurn {
        role: u8,
        content: String,
        at_ms: u64,
        /// Score in [-1, 1].
        #[serde(default)]
        sentiment: Option<f64>,
        #[serde(default)]
        tokens: u32,
    },
    TagDialog {
        tag: String,
    },
    CloseDialog,
}

impl DialogCommandRequest {
    pub fn into_command(self) -> Result<DialogCommand, String> {
        Ok(match self {
            DialogCommandRequest::StartDialog { title, model } => DialogCommand::StartDialog { title, model },
            DialogCommandRequest::AddTurn {
                role,
                content,
                at_ms,
                sentiment,
                tokens,
            } => DialogCommand::AddTurn {
                role: SpeakerRole::from_u8(role).ok_or_else(|| format!("unknown speaker role {}", role))?,
                content,
                at_ms,
                sentiment: sentiment
                    .map(|s| from_f64_checked(s).ok_or_else(|| format!("sentiment {} out of range", s)))
                    .transpose()?,
                tokens,
            },
            DialogCommandRequest::TagDialog { tag } => DialogCommand::TagDialog { tag },
            DialogCommandRequest::CloseDialog => DialogCommand::CloseDialog,
        })
    }
}

/// JSON object → canonical attribute map. Non-integral numbers become Q16.16.
pub fn json_to_attrs(map: Map<String, Value>) -> Result<Attributes, String> {
    let mut attrs = Attributes::new();
    for (key, value) in map {
        let attr = match value {
            Value::String(s) => AttrValue::Text(s),
            Value::Bool(b) => AttrValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttrValue::Int(i),
                None => n
                    .as_f64()
                    .and_then(from_f64_checked)
                    .map(AttrValue::Fixed)
                    .ok_or_else(|| format!("attribute {:?} is not representable", key))?,
            },
            _ => return Err(format!("attribute {:?} must be a string, number or bool", key)),
        };
        attrs.insert(key, attr);
    }
    Ok(attrs)
}

pub fn attrs_to_json(attrs: &Attributes) -> Map<String, Value> {
    attrs
        .iter()
        .map(|(k, v)| {
            let value = match v {
                AttrValue::Text(s) => Value::from(s.clone()),
                AttrValue::Int(i) => Value::from(*i),
                AttrValue::Bool(b) => Value::from(*b),
                AttrValue::Fixed(f) => Value::from(to_f64(*f)),
            };
            (k.clone(), value)
        })
        .collect()
}

#[derive(Serialize)]
pub struct CommandResponse {
    pub accepted: bool,
    pub sequence: Option<Sequence>,
    pub head_cid: Option<Cid>,
    pub event_types: Vec<String>,
    pub state_digest: Option<String>,
    pub reason: Option<String>,
}

impl CommandResponse {
    pub fn from_outcome<A: Aggregate>(outcome: &CommandOutcome<A>) -> Self {
        match outcome {
            CommandOutcome::Accepted(change) => {
                let notice = change.notice();
                Self {
                    accepted: true,
                    sequence: Some(notice.sequence),
                    head_cid: Some(notice.head_cid),
                    event_types: notice.event_types,
                    state_digest: Some(notice.state_digest),
                    reason: None,
                }
            }
            CommandOutcome::Rejected(e) => Self {
                accepted: false,
                sequence: None,
                head_cid: None,
                event_types: Vec::new(),
                state_digest: None,
                reason: Some(e.to_string()),
            },
        }
    }
}

#[derive(Serialize)]
pub struct NodeView {
    pub id: u64,
    pub kind: u8,
    pub attributes: Map<String, Value>,
}

#[derive(Serialize)]
pub struct EdgeView {
    pub id: u64,
    pub kind: u8,
    pub source: u64,
    pub target: u64,
    pub attributes: Map<String, Value>,
}

#[derive(Serialize)]
pub struct GraphView {
    pub stream_id: StreamId,
    pub sequence: Option<Sequence>,
    pub head_cid: Option<Cid>,
    pub version: u64,
    pub name: String,
    pub tags: Vec<String>,
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

impl From<&Projection<GraphState>> for GraphView {
    fn from(p: &Projection<GraphState>) -> Self {
        let state = &p.state;
        Self {
            stream_id: p.stream_id.clone(),
            sequence: p.sequence,
            head_cid: p.head_cid,
            version: state.version().0,
            name: state.meta().name.clone(),
            tags: state.meta().tags.iter().cloned().collect(),
            nodes: state
                .nodes()
                .map(|n| NodeView {
                    id: n.id.0,
                    kind: n.kind as u8,
                    attributes: attrs_to_json(&n.attributes),
                })
                .collect(),
            edges: state
                .edges()
                .map(|e| EdgeView {
                    id: e.id.0,
                    kind: e.kind as u8,
                    source: e.from.0,
                    target: e.to.0,
                    attributes: attrs_to_json(&e.attributes),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct TurnView {
    pub turn: u32,
    pub role: u8,
    pub content: String,
    pub at_ms: u64,
    pub sentiment: Option<f32>,
    pub tokens: u32,
}

#[derive(Serialize)]
pub struct MetricsView {
    pub turns: u64,
    pub tokens_total: u64,
    pub average_response_ms: Option<u64>,
    pub sentiment_trend: f32,
    pub coherence: f32,
}

#[derive(Serialize)]
pub struct DialogView {
    pub stream_id: StreamId,
    pub sequence: Option<Sequence>,
    pub head_cid: Option<Cid>,
    pub version: u64,
    pub title: String,
    pub model: Option<String>,
    pub tags: Vec<String>,
    pub closed: bool,
    pub turns: Vec<TurnView>,
    pub metrics: MetricsView,
}

impl From<&Projection<DialogState>> for DialogView {
    fn from(p: &Projection<DialogState>) -> Self {
        let state = &p.state;
        let m = state.metrics();
        Self {
            stream_id: p.stream_id.clone(),
            sequence: p.sequence,
            head_cid: p.head_cid,
            version: state.version().0,
            title: state.title().to_string(),
            model: state.model().map(str::to_string),
            tags: state.tags().iter().cloned().collect(),
            closed: state.is_closed(),
            turns: state
                .turns()
                .iter()
                .map(|t| TurnView {
                    turn: t.id.0,
                    role: t.role as u8,
                    content: t.content.clone(),
                    at_ms: t.at_ms,
                    sentiment: t.sentiment.map(|s| to_f64(s) as f32),
                    tokens: t.tokens,
                })
                .collect(),
            metrics: MetricsView {
                turns: m.turns,
                tokens_total: m.tokens_total,
                average_response_ms: m.average_response_ms(),
                sentiment_trend: to_f64(m.sentiment_trend) as f32,
                coherence: to_f64(m.coherence) as f32,
            },
        }
    }
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub from: Option<Sequence>,
    pub to: Option<Sequence>,
}

/// Default ancestry depth of a CID-anchored export.
pub const DEFAULT_ANCESTRY_DEPTH: u64 = 100;

#[derive(Deserialize)]
pub struct AncestryQuery {
    pub depth: Option<u64>,
}

/// An envelope looked up by CID, with the stream it belongs to.
#[derive(Serialize)]
pub struct EnvelopeView {
    pub stream_id: StreamId,
    #[serde(flatten)]
    pub envelope: ExportedEnvelope,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub streams: usize,
    pub envelopes: u64,
    pub sealed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attrs_json_conversion() {
        let map = json!({"name": "a", "n": 3, "w": 0.5, "ok": true});
        let attrs = json_to_attrs(map.as_object().unwrap().clone()).unwrap();
        assert_eq!(attrs.get("n"), Some(&AttrValue::Int(3)));
        assert_eq!(attrs.get("ok"), Some(&AttrValue::Bool(true)));
        assert!(matches!(attrs.get("w"), Some(AttrValue::Fixed(_))));
        assert_eq!(attrs_to_json(&attrs).get("w"), Some(&json!(0.5)));

        let bad = json!({"x": [1, 2]});
        assert!(json_to_attrs(bad.as_object().unwrap().clone()).is_err());
    }

    #[test]
    fn test_command_parsing() {
        let req: GraphCommandRequest =
            serde_json::from_value(json!({"type": "add_edge", "id": 1, "source": 1, "target": 2, "kind": 9})).unwrap();
        assert!(req.into_command().is_err());

        let req: DialogCommandRequest =
            serde_json::from_value(json!({"type": "add_turn", "role": 0, "content": "hi", "at_ms": 5, "sentiment": 0.25}))
                .unwrap();
        assert!(matches!(req.into_command().unwrap(), DialogCommand::AddTurn { tokens: 0, .. }));
    }
}
