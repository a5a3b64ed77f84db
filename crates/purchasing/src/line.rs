//! Line records before and after sub-object resolution.
//!
//! A stored line ("stub") keeps flat references to its sub-objects: one id
//! string for single-valued kinds, a list of ids for multi-valued kinds. The
//! orchestration layer detaches those references, resolves them against
//! storage and writes the documents back, producing a [`CompositeLine`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use acqorders_core::id::ensure_path_segment;
use acqorders_core::{DomainError, DomainResult, LineId};

use crate::adjustment::Adjustment;
use crate::operation::Operation;
use crate::registry::SubObjectKind;

/// A reference to one sub-object as found on a line.
#[derive(Debug, Clone, PartialEq)]
pub enum SubObjectRef {
    /// Flat reference by id.
    Id(String),
    /// Embedded document (the disassemble direction of create/update).
    Document(Map<String, JsonValue>),
}

impl SubObjectRef {
    /// Interpret a JSON value found in a sub-object position. `null` means
    /// "no reference".
    pub fn from_json(kind: SubObjectKind, value: JsonValue) -> DomainResult<Option<Self>> {
        match value {
            JsonValue::Null => Ok(None),
            JsonValue::String(id) => Ok(Some(SubObjectRef::Id(id))),
            JsonValue::Object(doc) => Ok(Some(SubObjectRef::Document(doc))),
            other => Err(DomainError::validation(format!(
                "'{kind}' must be an id string or a document, found {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Id of the referenced sub-object, if known.
    pub fn id(&self) -> Option<&str> {
        match self {
            SubObjectRef::Id(id) => Some(id.as_str()),
            SubObjectRef::Document(doc) => doc.get("id").and_then(JsonValue::as_str),
        }
    }

    /// Build the storage call that applies `operation` to this reference.
    ///
    /// - id reference: `operation` at `prefix + id`, no body;
    /// - document on create: POST the document to the collection endpoint;
    /// - document on update: PUT the document to `prefix + document.id`;
    /// - document on read/delete: `operation` at `prefix + document.id`.
    pub fn to_call(&self, kind: SubObjectKind, operation: Operation) -> DomainResult<SubObjectCall> {
        match self {
            SubObjectRef::Id(id) => {
                ensure_path_segment(kind.field_name(), id)?;
                Ok(SubObjectCall {
                    kind,
                    operation,
                    path: kind.record_path(id),
                    body: None,
                })
            }
            SubObjectRef::Document(doc) if operation == Operation::Create => Ok(SubObjectCall {
                kind,
                operation,
                path: kind.collection_path().to_string(),
                body: Some(JsonValue::Object(doc.clone())),
            }),
            SubObjectRef::Document(doc) => {
                let id = self.id().ok_or_else(|| {
                    DomainError::validation(format!(
                        "embedded '{kind}' document has no id for {operation}"
                    ))
                })?;
                ensure_path_segment(kind.field_name(), id)?;
                Ok(SubObjectCall {
                    kind,
                    operation,
                    path: kind.record_path(id),
                    body: operation
                        .carries_body()
                        .then(|| JsonValue::Object(doc.clone())),
                })
            }
        }
    }
}

/// One storage call derived from a sub-object reference.
#[derive(Debug, Clone, PartialEq)]
pub struct SubObjectCall {
    pub kind: SubObjectKind,
    pub operation: Operation,
    pub path: String,
    pub body: Option<JsonValue>,
}

/// References removed from a stub, grouped by cardinality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetachedReferences {
    pub single: Vec<(SubObjectKind, SubObjectRef)>,
    pub multi: Vec<(SubObjectKind, Vec<SubObjectRef>)>,
}

impl DetachedReferences {
    /// Total number of sub-object references (one storage call each).
    pub fn len(&self) -> usize {
        self.single.len() + self.multi.iter().map(|(_, refs)| refs.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A line record as retrieved from storage, before resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineStub(Map<String, JsonValue>);

impl LineStub {
    pub fn new(fields: Map<String, JsonValue>) -> Self {
        Self(fields)
    }

    /// Accept only JSON objects as line records.
    pub fn from_json(value: JsonValue) -> DomainResult<Self> {
        match value {
            JsonValue::Object(fields) => Ok(Self(fields)),
            other => Err(DomainError::validation(format!(
                "line record must be an object, found {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(JsonValue::as_str)
    }

    /// Id of the line, required for operations on the line record itself.
    pub fn line_id(&self) -> DomainResult<LineId> {
        let raw = self
            .id()
            .ok_or_else(|| DomainError::validation("line record has no id"))?;
        LineId::parse(raw)
    }

    pub fn purchase_order_id(&self) -> Option<&str> {
        self.0.get("purchase_order_id").and_then(JsonValue::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    /// Remove every registered sub-object reference from the stub.
    ///
    /// Single-valued fields holding `null` are removed and produce nothing.
    /// Multi-valued fields must be arrays (or `null`, treated as absent);
    /// `null` elements inside the array are skipped.
    pub fn detach_references(&mut self) -> DomainResult<DetachedReferences> {
        let mut detached = DetachedReferences::default();

        for kind in SubObjectKind::SUB_OBJECTS {
            let Some(value) = self.0.remove(kind.field_name()) else {
                continue;
            };

            if !kind.is_multi_valued() {
                if let Some(reference) = SubObjectRef::from_json(kind, value)? {
                    detached.single.push((kind, reference));
                }
                continue;
            }

            match value {
                JsonValue::Null => {}
                JsonValue::Array(items) => {
                    let mut refs = Vec::with_capacity(items.len());
                    for item in items {
                        if let Some(reference) = SubObjectRef::from_json(kind, item)? {
                            refs.push(reference);
                        }
                    }
                    detached.multi.push((kind, refs));
                }
                other => {
                    return Err(DomainError::validation(format!(
                        "'{kind}' must be a list, found {}",
                        json_type_name(&other)
                    )));
                }
            }
        }

        Ok(detached)
    }

    /// Put a value back into a field position.
    pub fn insert(&mut self, kind: SubObjectKind, value: JsonValue) {
        self.0.insert(kind.field_name().to_string(), value);
    }

    pub fn into_fields(self) -> Map<String, JsonValue> {
        self.0
    }
}

/// Non-fatal condition recorded while resolving a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionWarning {
    pub kind: SubObjectKind,
    pub sub_object_id: Option<String>,
    pub line_id: Option<String>,
    pub operation: Operation,
}

impl core::fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "the '{}' sub-object with id={} is empty for order line with id={} ({})",
            self.kind,
            self.sub_object_id.as_deref().unwrap_or("<none>"),
            self.line_id.as_deref().unwrap_or("<none>"),
            self.operation,
        )
    }
}

/// A line after its sub-object phase completed.
///
/// Serializes as the line document alone; warnings stay on the Rust side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeLine {
    #[serde(flatten)]
    document: Map<String, JsonValue>,
    #[serde(skip)]
    warnings: Vec<ResolutionWarning>,
}

impl CompositeLine {
    pub fn new(document: Map<String, JsonValue>, warnings: Vec<ResolutionWarning>) -> Self {
        Self { document, warnings }
    }

    pub fn id(&self) -> Option<&str> {
        self.document.get("id").and_then(JsonValue::as_str)
    }

    pub fn line_id(&self) -> DomainResult<LineId> {
        let raw = self
            .id()
            .ok_or_else(|| DomainError::validation("composite line has no id"))?;
        LineId::parse(raw)
    }

    pub fn purchase_order_id(&self) -> Option<&str> {
        self.document
            .get("purchase_order_id")
            .and_then(JsonValue::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.document.get(field)
    }

    /// Resolved document of a sub-object kind, if present.
    pub fn sub_object(&self, kind: SubObjectKind) -> Option<&JsonValue> {
        self.document.get(kind.field_name())
    }

    pub fn document(&self) -> &Map<String, JsonValue> {
        &self.document
    }

    pub fn into_document(self) -> Map<String, JsonValue> {
        self.document
    }

    pub fn warnings(&self) -> &[ResolutionWarning] {
        &self.warnings
    }

    /// Typed view of the resolved adjustment. A document that does not read
    /// as an adjustment is a validation error.
    pub fn try_adjustment(&self) -> DomainResult<Option<Adjustment>> {
        match self.sub_object(SubObjectKind::Adjustment) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| DomainError::validation(format!("malformed adjustment: {e}"))),
        }
    }
}

/// Collection of line records returned by a storage list query.
///
/// `po_lines` is required: a response without it is malformed, not empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineCollection {
    pub po_lines: Vec<JsonValue>,
    #[serde(default, alias = "totalRecords")]
    pub total_records: u64,
}

impl LineCollection {
    pub fn into_stubs(self) -> DomainResult<Vec<LineStub>> {
        self.po_lines.into_iter().map(LineStub::from_json).collect()
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
