//! Schema Tree
//!
//! A closed representation of JSON Schema values. Author payloads, shared
//! definitions and synthesized envelopes are all held as [`SchemaNode`] trees,
//! so every structural walk (reference rewriting, reference collection) is an
//! exhaustive match over a fixed set of node kinds.
//!
//! Nodes convert losslessly to and from `serde_json::Value`:
//!
//! | JSON shape                   | Node                        |
//! |------------------------------|-----------------------------|
//! | `{"$ref": "x", ...}`         | [`SchemaNode::Ref`]          |
//! | `{"anyOf": [...], ...}`      | [`SchemaNode::Union`]        |
//! | `{"allOf": [...], ...}`      | [`SchemaNode::Intersection`] |
//! | `{"const": v, ...}`          | [`SchemaNode::Literal`]      |
//! | `{"properties": {...}, ...}` | [`SchemaNode::Object`]       |
//! | `{"items": {...}, ...}`      | [`SchemaNode::Array`]        |
//! | any other object             | [`SchemaNode::Keywords`]     |
//! | array                        | [`SchemaNode::List`]         |
//! | string/number/bool/null      | [`SchemaNode::Scalar`]       |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keyword map of a schema object. Sorted, so serialized output is stable.
pub type Keywords = BTreeMap<String, SchemaNode>;

/// A node in a schema tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum SchemaNode {
    /// Reference to a shared definition
    Ref { target: String, keywords: Keywords },
    /// Object schema with named properties
    Object { properties: Keywords, keywords: Keywords },
    /// Array schema with a single item schema
    Array { items: Box<SchemaNode>, keywords: Keywords },
    /// `anyOf` union
    Union { variants: Vec<SchemaNode>, keywords: Keywords },
    /// `allOf` intersection
    Intersection { parts: Vec<SchemaNode>, keywords: Keywords },
    /// Constant value. `$ref` strings nested in the value are walked like any other.
    Literal { value: Value, keywords: Keywords },
    /// Any other keyword map (scalar types, enums, nested keyword maps)
    Keywords(Keywords),
    /// JSON array in a non-schema position (`required`, `oneOf`, `examples`)
    List(Vec<SchemaNode>),
    /// String, number, boolean or null
    Scalar(Value),
}

impl SchemaNode {
    /// `{"type": "string"}`
    pub fn string() -> Self {
        Self::Keywords(keywords([("type", Self::text("string"))]))
    }

    /// `{"const": value, "type": <json type of value>}`
    pub fn literal(value: impl Into<Value>) -> Self {
        let value = value.into();
        let mut kw = Keywords::new();
        if let Some(json_type) = json_type_of(&value) {
            kw.insert("type".to_string(), Self::text(json_type));
        }
        Self::Literal { value, keywords: kw }
    }

    /// `{"type": "string", "enum": [...]}`
    pub fn string_enum<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Self::text).collect();
        Self::Keywords(keywords([
            ("type", Self::text("string")),
            ("enum", Self::List(values)),
        ]))
    }

    /// Object whose listed properties are all required, in the given order
    pub fn object<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = (S, SchemaNode)>,
        S: Into<String>,
    {
        let mut required = Vec::new();
        let mut props = Keywords::new();
        for (name, node) in properties {
            let name = name.into();
            required.push(Self::text(name.clone()));
            props.insert(name, node);
        }
        Self::Object {
            properties: props,
            keywords: keywords([
                ("type", Self::text("object")),
                ("required", Self::List(required)),
            ]),
        }
    }

    /// `{"anyOf": [...]}`
    pub fn union(variants: Vec<SchemaNode>) -> Self {
        Self::Union {
            variants,
            keywords: Keywords::new(),
        }
    }

    /// String scalar
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(Value::String(value.into()))
    }

    /// Add or replace a keyword. No-op on lists and scalars.
    pub fn with_keyword(mut self, key: impl Into<String>, value: SchemaNode) -> Self {
        if let Some(kw) = self.keywords_mut() {
            kw.insert(key.into(), value);
        }
        self
    }

    /// Keyword map of schema-object nodes
    pub fn keywords(&self) -> Option<&Keywords> {
        match self {
            Self::Ref { keywords, .. }
            | Self::Object { keywords, .. }
            | Self::Array { keywords, .. }
            | Self::Union { keywords, .. }
            | Self::Intersection { keywords, .. }
            | Self::Literal { keywords, .. }
            | Self::Keywords(keywords) => Some(keywords),
            Self::List(_) | Self::Scalar(_) => None,
        }
    }

    fn keywords_mut(&mut self) -> Option<&mut Keywords> {
        match self {
            Self::Ref { keywords, .. }
            | Self::Object { keywords, .. }
            | Self::Array { keywords, .. }
            | Self::Union { keywords, .. }
            | Self::Intersection { keywords, .. }
            | Self::Literal { keywords, .. }
            | Self::Keywords(keywords) => Some(keywords),
            Self::List(_) | Self::Scalar(_) => None,
        }
    }

    /// Look up a keyword (not a property) by name
    pub fn keyword(&self, key: &str) -> Option<&SchemaNode> {
        self.keywords().and_then(|kw| kw.get(key))
    }

    /// String value of a keyword, e.g. `title` or `$id`
    pub fn keyword_str(&self, key: &str) -> Option<&str> {
        match self.keyword(key) {
            Some(Self::Scalar(Value::String(s))) => Some(s),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.keyword_str("title")
    }

    /// Set `title` unless one is already present
    pub fn set_default_title(&mut self, title: impl Into<String>) {
        if let Some(kw) = self.keywords_mut() {
            kw.entry("title".to_string())
                .or_insert_with(|| Self::text(title));
        }
    }

    /// Properties of an object node
    pub fn properties(&self) -> Option<&Keywords> {
        match self {
            Self::Object { properties, .. } => Some(properties),
            _ => None,
        }
    }

    /// Members of a union node
    pub fn variants(&self) -> Option<&[SchemaNode]> {
        match self {
            Self::Union { variants, .. } => Some(variants),
            _ => None,
        }
    }

    /// Visit every `$ref` target in the tree, depth first
    pub fn for_each_ref<F: FnMut(&str)>(&self, f: &mut F) {
        match self {
            Self::Ref { target, keywords } => {
                f(target.as_str());
                walk_keywords(keywords, f);
            }
            Self::Object {
                properties,
                keywords,
            } => {
                walk_keywords(properties, f);
                walk_keywords(keywords, f);
            }
            Self::Array { items, keywords } => {
                items.for_each_ref(f);
                walk_keywords(keywords, f);
            }
            Self::Union { variants: nodes, keywords }
            | Self::Intersection { parts: nodes, keywords } => {
                nodes.iter().for_each(|n| n.for_each_ref(f));
                walk_keywords(keywords, f);
            }
            Self::Literal { value, keywords } => {
                walk_value(value, f);
                walk_keywords(keywords, f);
            }
            Self::Keywords(keywords) => walk_keywords(keywords, f),
            Self::List(items) => items.iter().for_each(|n| n.for_each_ref(f)),
            Self::Scalar(_) => {}
        }
    }

    /// Mutable counterpart of [`for_each_ref`](Self::for_each_ref)
    pub fn for_each_ref_mut<F: FnMut(&mut String)>(&mut self, f: &mut F) {
        match self {
            Self::Ref { target, keywords } => {
                f(target);
                walk_keywords_mut(keywords, f);
            }
            Self::Object {
                properties,
                keywords,
            } => {
                walk_keywords_mut(properties, f);
                walk_keywords_mut(keywords, f);
            }
            Self::Array { items, keywords } => {
                items.for_each_ref_mut(f);
                walk_keywords_mut(keywords, f);
            }
            Self::Union { variants: nodes, keywords }
            | Self::Intersection { parts: nodes, keywords } => {
                nodes.iter_mut().for_each(|n| n.for_each_ref_mut(f));
                walk_keywords_mut(keywords, f);
            }
            Self::Literal { value, keywords } => {
                walk_value_mut(value, f);
                walk_keywords_mut(keywords, f);
            }
            Self::Keywords(keywords) => walk_keywords_mut(keywords, f),
            Self::List(items) => items.iter_mut().for_each(|n| n.for_each_ref_mut(f)),
            Self::Scalar(_) => {}
        }
    }

    /// Rewrite every `$ref` value `x` to `prefix + x + suffix`
    pub fn rewrite_refs(&mut self, prefix: &str, suffix: &str) {
        self.for_each_ref_mut(&mut |target| {
            *target = format!("{prefix}{target}{suffix}");
        });
    }

    /// Copy of this tree with references rewritten
    pub fn with_refs_rewritten(&self, prefix: &str, suffix: &str) -> Self {
        let mut node = self.clone();
        node.rewrite_refs(prefix, suffix);
        node
    }

    /// All `$ref` targets, in walk order (duplicates kept)
    pub fn refs(&self) -> Vec<String> {
        let mut refs = Vec::new();
        self.for_each_ref(&mut |target| refs.push(target.to_string()));
        refs
    }

    pub fn to_value(&self) -> Value {
        self.clone().into()
    }
}

fn walk_keywords<F: FnMut(&str)>(keywords: &Keywords, f: &mut F) {
    keywords.values().for_each(|n| n.for_each_ref(f));
}

fn walk_keywords_mut<F: FnMut(&mut String)>(keywords: &mut Keywords, f: &mut F) {
    keywords.values_mut().for_each(|n| n.for_each_ref_mut(f));
}

/// Raw JSON inside a `const`: any object with a string `$ref` counts
fn walk_value<F: FnMut(&str)>(value: &Value, f: &mut F) {
    match value {
        Value::Object(map) => map.iter().for_each(|(key, child)| match child {
            Value::String(target) if key == "$ref" => f(target.as_str()),
            other => walk_value(other, f),
        }),
        Value::Array(items) => items.iter().for_each(|item| walk_value(item, f)),
        _ => {}
    }
}

fn walk_value_mut<F: FnMut(&mut String)>(value: &mut Value, f: &mut F) {
    match value {
        Value::Object(map) => map.iter_mut().for_each(|(key, child)| match child {
            Value::String(target) if key == "$ref" => f(target),
            other => walk_value_mut(other, f),
        }),
        Value::Array(items) => items.iter_mut().for_each(|item| walk_value_mut(item, f)),
        _ => {}
    }
}

fn keywords<const N: usize>(entries: [(&str, SchemaNode); N]) -> Keywords {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn json_type_of(value: &Value) -> Option<&'static str> {
    match value {
        Value::String(_) => Some("string"),
        Value::Bool(_) => Some("boolean"),
        Value::Number(n) if n.is_f64() => Some("number"),
        Value::Number(_) => Some("integer"),
        Value::Null => Some("null"),
        Value::Array(_) | Value::Object(_) => None,
    }
}

// =============================================================================
// Value conversion
// =============================================================================

impl From<Value> for SchemaNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => from_object(map),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            scalar => Self::Scalar(scalar),
        }
    }
}

fn from_object(mut map: Map<String, Value>) -> SchemaNode {
    if let Some(Value::String(target)) = take_if(&mut map, "$ref", Value::is_string) {
        return SchemaNode::Ref {
            target,
            keywords: into_keywords(map),
        };
    }
    if let Some(Value::Array(variants)) = take_if(&mut map, "anyOf", Value::is_array) {
        return SchemaNode::Union {
            variants: variants.into_iter().map(SchemaNode::from).collect(),
            keywords: into_keywords(map),
        };
    }
    if let Some(Value::Array(parts)) = take_if(&mut map, "allOf", Value::is_array) {
        return SchemaNode::Intersection {
            parts: parts.into_iter().map(SchemaNode::from).collect(),
            keywords: into_keywords(map),
        };
    }
    if let Some(value) = map.remove("const") {
        return SchemaNode::Literal {
            value,
            keywords: into_keywords(map),
        };
    }
    if let Some(Value::Object(properties)) = take_if(&mut map, "properties", Value::is_object) {
        return SchemaNode::Object {
            properties: into_keywords(properties),
            keywords: into_keywords(map),
        };
    }
    if let Some(items) = take_if(&mut map, "items", Value::is_object) {
        return SchemaNode::Array {
            items: Box::new(items.into()),
            keywords: into_keywords(map),
        };
    }
    SchemaNode::Keywords(into_keywords(map))
}

fn take_if(map: &mut Map<String, Value>, key: &str, accept: fn(&Value) -> bool) -> Option<Value> {
    if map.get(key).is_some_and(accept) {
        map.remove(key)
    } else {
        None
    }
}

fn into_keywords(map: Map<String, Value>) -> Keywords {
    map.into_iter().map(|(k, v)| (k, SchemaNode::from(v))).collect()
}

impl From<SchemaNode> for Value {
    fn from(node: SchemaNode) -> Self {
        match node {
            SchemaNode::Ref { target, keywords } => {
                with_entry(keywords, "$ref", Value::String(target))
            }
            SchemaNode::Object {
                properties,
                keywords,
            } => with_entry(keywords, "properties", Value::Object(into_map(properties))),
            SchemaNode::Array { items, keywords } => with_entry(keywords, "items", (*items).into()),
            SchemaNode::Union { variants, keywords } => {
                with_entry(keywords, "anyOf", into_array(variants))
            }
            SchemaNode::Intersection { parts, keywords } => {
                with_entry(keywords, "allOf", into_array(parts))
            }
            SchemaNode::Literal { value, keywords } => with_entry(keywords, "const", value),
            SchemaNode::Keywords(keywords) => Value::Object(into_map(keywords)),
            SchemaNode::List(items) => into_array(items),
            SchemaNode::Scalar(value) => value,
        }
    }
}

fn with_entry(keywords: Keywords, key: &str, value: Value) -> Value {
    let mut map = into_map(keywords);
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn into_map(keywords: Keywords) -> Map<String, Value> {
    keywords.into_iter().map(|(k, v)| (k, v.into())).collect()
}

fn into_array(nodes: Vec<SchemaNode>) -> Value {
    Value::Array(nodes.into_iter().map(Value::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn battle_status() -> Value {
        json!({
            "$id": "battleStatus",
            "anyOf": [
                {
                    "allOf": [
                        { "type": "object", "properties": { "battleId": { "type": "string" } } },
                        {
                            "allOf": [
                                { "type": "object", "properties": { "isSpectator": { "type": "boolean" } } },
                                { "$ref": "player" }
                            ]
                        }
                    ]
                },
                { "type": "null" }
            ]
        })
    }

    #[test]
    fn test_value_round_trip_preserves_structure() {
        let value = battle_status();
        let node = SchemaNode::from(value.clone());
        assert!(matches!(node, SchemaNode::Union { .. }));
        assert_eq!(node.to_value(), value);
    }

    #[test]
    fn test_rewrite_without_refs_is_identity() {
        let value = json!({
            "type": "object",
            "properties": {
                "users": { "type": "array", "items": { "type": "string" } },
                "mode": { "const": "ffa", "type": "string" }
            },
            "required": ["users"]
        });
        let mut node = SchemaNode::from(value.clone());
        node.rewrite_refs("../../definitions/", ".json");
        assert_eq!(node.to_value(), value);
    }

    #[test]
    fn test_rewrite_reaches_nested_intersection() {
        let mut node = SchemaNode::from(battle_status());
        node.rewrite_refs("../definitions/", ".json");
        let value = node.to_value();
        assert_eq!(
            value["anyOf"][0]["allOf"][1]["allOf"][1]["$ref"],
            json!("../definitions/player.json")
        );
        assert_eq!(value["$id"], json!("battleStatus"));
    }

    #[test]
    fn test_rewrite_reaches_array_items_and_union_branches() {
        let mut node = SchemaNode::from(json!({
            "anyOf": [
                { "type": "object", "properties": { "self": { "$ref": "privateUser" } } },
                { "type": "object", "properties": { "users": { "type": "array", "items": { "$ref": "user" } } } }
            ]
        }));
        node.rewrite_refs("#/definitions/", "");
        assert_eq!(node.refs(), vec!["#/definitions/privateUser", "#/definitions/user"]);
    }

    #[test]
    fn test_rewrite_reaches_unclassified_keywords() {
        let mut node = SchemaNode::from(json!({
            "type": "object",
            "additionalProperties": { "$ref": "player" },
            "oneOf": [{ "$ref": "user" }]
        }));
        node.rewrite_refs("p/", ".s");
        let value = node.to_value();
        assert_eq!(value["additionalProperties"]["$ref"], json!("p/player.s"));
        assert_eq!(value["oneOf"][0]["$ref"], json!("p/user.s"));
    }

    #[test]
    fn test_property_named_ref_is_not_a_reference() {
        let value = json!({
            "type": "object",
            "properties": { "$ref": { "type": "string" } }
        });
        let mut node = SchemaNode::from(value.clone());
        assert!(node.refs().is_empty());
        node.rewrite_refs("x/", "");
        assert_eq!(node.to_value(), value);
    }

    #[test]
    fn test_refs_inside_literal_are_rewritten() {
        let value = json!({
            "const": { "$ref": "player", "tags": [{ "$ref": "battleStatus" }], "note": "$ref" }
        });
        let mut node = SchemaNode::from(value);
        assert!(matches!(node, SchemaNode::Literal { .. }));
        assert_eq!(node.refs(), vec!["player", "battleStatus"]);

        node.rewrite_refs("../definitions/", ".json");
        assert_eq!(
            node.to_value(),
            json!({
                "const": {
                    "$ref": "../definitions/player.json",
                    "tags": [{ "$ref": "../definitions/battleStatus.json" }],
                    "note": "$ref"
                }
            })
        );
    }

    #[test]
    fn test_builders_emit_typebox_shapes() {
        let node = SchemaNode::object([
            ("type", SchemaNode::literal("request")),
            ("messageId", SchemaNode::string()),
        ]);
        assert_eq!(
            node.to_value(),
            json!({
                "type": "object",
                "properties": {
                    "type": { "const": "request", "type": "string" },
                    "messageId": { "type": "string" }
                },
                "required": ["type", "messageId"]
            })
        );
        assert_eq!(
            SchemaNode::string_enum(["muted", "not_in_lobby"]).to_value(),
            json!({ "type": "string", "enum": ["muted", "not_in_lobby"] })
        );
    }

    #[test]
    fn test_default_title_keeps_author_title() {
        let mut titled = SchemaNode::from(json!({ "type": "object", "title": "Custom" }));
        titled.set_default_title("Generated");
        assert_eq!(titled.title(), Some("Custom"));

        let mut untitled = SchemaNode::from(json!({ "type": "object" }));
        untitled.set_default_title("Generated");
        assert_eq!(untitled.title(), Some("Generated"));
    }
}
