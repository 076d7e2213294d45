use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{TcError, TcResult};

// ---------------------------------------------------------------------------
// Schema: declarative record-shape descriptor
// ---------------------------------------------------------------------------

/// Primitive value types a container field may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Long,
}

impl SchemaType {
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Long => "long",
        }
    }

    fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "long" => Some(Self::Long),
            _ => None,
        }
    }
}

/// Per-field ordering hint. `Ignore` marks a field as not contributing to
/// any required ordering (the word-count value field carries it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
    Ignore,
}

impl SortOrder {
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
            Self::Ignore => "ignore",
        }
    }

    fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "ascending" => Some(Self::Ascending),
            "descending" => Some(Self::Descending),
            "ignore" => Some(Self::Ignore),
            _ => None,
        }
    }
}

/// One named, typed field of a record schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: SchemaType,
    pub order: Option<SortOrder>,
}

impl FieldDef {
    #[must_use]
    pub fn new(name: &str, field_type: SchemaType) -> Self {
        Self {
            name: name.to_owned(),
            field_type,
            order: None,
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }
}

/// Structural type descriptor for container records.
///
/// Two schemas cover the word-count scenario: the input schema (a bare
/// string per record) and the `Pair` output schema (`key: string`,
/// `value: long` with `order=ignore`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    Primitive(SchemaType),
    Record {
        name: String,
        namespace: Option<String>,
        fields: Vec<FieldDef>,
    },
}

impl Schema {
    /// The input schema: one unstructured text value per record.
    #[must_use]
    pub fn text() -> Self {
        Self::Primitive(SchemaType::String)
    }

    /// The canonical word-count output schema.
    #[must_use]
    pub fn word_count_pair() -> Self {
        Self::Record {
            name: "Pair".to_owned(),
            namespace: Some("tethercount.mapred".to_owned()),
            fields: vec![
                FieldDef::new("key", SchemaType::String),
                FieldDef::new("value", SchemaType::Long).with_order(SortOrder::Ignore),
            ],
        }
    }

    /// Render the JSON descriptor. A primitive schema renders as a bare JSON
    /// string (`"string"`); a record schema as a `{"type":"record",...}`
    /// object, with `order` emitted only where a hint is present.
    #[must_use]
    pub fn to_descriptor(&self) -> Value {
        match self {
            Self::Primitive(primitive) => Value::String(primitive.wire_name().to_owned()),
            Self::Record {
                name,
                namespace,
                fields,
            } => {
                let fields: Vec<Value> = fields
                    .iter()
                    .map(|field| {
                        let mut entry = json!({
                            "name": field.name,
                            "type": field.field_type.wire_name(),
                        });
                        if let Some(order) = field.order
                            && let Some(map) = entry.as_object_mut()
                        {
                            map.insert("order".to_owned(), json!(order.wire_name()));
                        }
                        entry
                    })
                    .collect();

                let mut descriptor = json!({
                    "type": "record",
                    "name": name,
                    "fields": fields,
                });
                if let Some(namespace) = namespace
                    && let Some(map) = descriptor.as_object_mut()
                {
                    map.insert("namespace".to_owned(), json!(namespace));
                }
                descriptor
            }
        }
    }

    /// The descriptor as the standalone text artifact handed to the
    /// job controller.
    #[must_use]
    pub fn to_descriptor_string(&self) -> String {
        serde_json::to_string_pretty(&self.to_descriptor()).unwrap_or_else(|_| "null".to_owned())
    }

    /// Parse a JSON descriptor string back into a schema.
    pub fn parse(text: &str) -> TcResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|error| TcError::Encoding(format!("schema descriptor is not json: {error}")))?;
        Self::from_descriptor(&value)
    }

    pub fn from_descriptor(value: &Value) -> TcResult<Self> {
        match value {
            Value::String(name) => SchemaType::from_wire_name(name)
                .map(Self::Primitive)
                .ok_or_else(|| {
                    TcError::Encoding(format!("unknown primitive schema type `{name}`"))
                }),
            Value::Object(map) => {
                if map.get("type").and_then(Value::as_str) != Some("record") {
                    return Err(TcError::Encoding(
                        "schema object must have type `record`".to_owned(),
                    ));
                }
                let name = map
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| TcError::Encoding("record schema missing `name`".to_owned()))?
                    .to_owned();
                let namespace = map
                    .get("namespace")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                let raw_fields = map
                    .get("fields")
                    .and_then(Value::as_array)
                    .ok_or_else(|| TcError::Encoding("record schema missing `fields`".to_owned()))?;

                let mut fields = Vec::with_capacity(raw_fields.len());
                for raw in raw_fields {
                    let field_name = raw
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| TcError::Encoding("field missing `name`".to_owned()))?;
                    let type_name = raw.get("type").and_then(Value::as_str).ok_or_else(|| {
                        TcError::Encoding(format!("field `{field_name}` missing `type`"))
                    })?;
                    let field_type = SchemaType::from_wire_name(type_name).ok_or_else(|| {
                        TcError::Encoding(format!(
                            "field `{field_name}` has unknown type `{type_name}`"
                        ))
                    })?;
                    let order = match raw.get("order").and_then(Value::as_str) {
                        Some(order_name) => {
                            Some(SortOrder::from_wire_name(order_name).ok_or_else(|| {
                                TcError::Encoding(format!(
                                    "field `{field_name}` has unknown order `{order_name}`"
                                ))
                            })?)
                        }
                        None => None,
                    };
                    fields.push(FieldDef {
                        name: field_name.to_owned(),
                        field_type,
                        order,
                    });
                }

                Ok(Self::Record {
                    name,
                    namespace,
                    fields,
                })
            }
            other => Err(TcError::Encoding(format!(
                "schema descriptor must be a string or object, got {other}"
            ))),
        }
    }

    /// Whether a record value matches this schema's shape.
    #[must_use]
    pub fn conforms(&self, record: &Record) -> bool {
        match (self, record) {
            (Self::Primitive(SchemaType::String), Record::Text(_)) => true,
            (Self::Record { fields, .. }, Record::Pair { .. }) => {
                fields.len() == 2
                    && fields[0].field_type == SchemaType::String
                    && fields[1].field_type == SchemaType::Long
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Record: one schema-typed container value
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Text(String),
    Pair { key: String, value: i64 },
}

impl Record {
    #[must_use]
    pub fn pair(key: &str, value: i64) -> Self {
        Self::Pair {
            key: key.to_owned(),
            value,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(line) => write!(f, "{line}"),
            Self::Pair { key, value } => write!(f, "{key}\t{value}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tether transport selector
// ---------------------------------------------------------------------------

/// Transport the controller uses to tether the worker. Exactly one is
/// supported in the single-node scenario.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
}

impl Protocol {
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Http => "http",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Summary of a verification pass over one output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Number of output records compared against ground truth.
    pub records_checked: usize,
}

/// Summary of one end-to-end scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub run_id: String,
    pub started_at_rfc3339: String,
    pub finished_at_rfc3339: String,
    /// Controller exit code, if the process exited on its own.
    pub exit_code: Option<i32>,
    /// Distinct words in the locally computed ground truth.
    pub distinct_words: usize,
    /// Output records that matched ground truth.
    pub records_verified: usize,
}
