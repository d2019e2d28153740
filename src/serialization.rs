use crate::document::{Document, DocumentNode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;

/// A native value extracted from a document: a cell's coerced word, a constant, or a
/// whole typed subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Boolean(bool),
    Null,
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Renders the value the way it is substituted into compiler templates: arrays are
    /// joined with `delimiter`, null renders empty.
    pub fn to_template_string(&self, delimiter: &str) -> String {
        match self {
            Value::Array(items) => items
                .iter()
                .map(|v| v.to_template_string(delimiter))
                .collect::<Vec<_>>()
                .join(delimiter),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Null => write!(f, "null"),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Object(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

/// Inserts `value` under `key`, either replacing a scalar or accumulating into an array.
pub(crate) fn insert_typed(
    map: &mut BTreeMap<String, Value>,
    key: String,
    value: Value,
    accumulate: bool,
) {
    if !accumulate {
        map.insert(key, value);
        return;
    }
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        _ => {
            map.insert(key, Value::Array(vec![value]));
        }
    }
}

impl Document<'_> {
    /// The document as a nested map keyed by each line's first word.
    pub fn to_typed_value(&self) -> Value {
        Value::Object(self.children_map(self.root()))
    }

    /// Serializes the typed value to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_typed_value())
    }

    /// Serializes the typed value to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_typed_value())
    }

    pub fn typed_value(&self, node: &DocumentNode) -> Value {
        let def = self.definition(node);
        let content = node.content();
        if def.is_blob() {
            return Value::String(if node.children().is_empty() {
                node.line().to_string()
            } else {
                node.children_to_string()
            });
        }
        if def.content_key.is_some() || def.children_key.is_some() {
            let mut object = BTreeMap::new();
            if let Some(key) = &def.content_key {
                object.insert(key.clone(), content.map_or(Value::Null, |c| Value::String(c.into())));
            }
            let children = self.children_map(node);
            match &def.children_key {
                Some(key) => {
                    object.insert(key.clone(), Value::Object(children));
                }
                None => object.extend(children),
            }
            return Value::Object(object);
        }
        if !node.children().is_empty() {
            return match content {
                None => Value::Object(self.children_map(node)),
                Some(content) => Value::String(format!("{content}\n{}", node.children_to_string())),
            };
        }
        if let (Some(delimiter), Some(content)) = (&def.list_delimiter, content) {
            return Value::Array(
                content
                    .split(delimiter.as_str())
                    .map(|item| Value::String(item.to_string()))
                    .collect(),
            );
        }
        let cells = self.cells(node);
        if cells.len() == 2 {
            return cells[1].value.clone();
        }
        content.map_or(Value::Null, |c| Value::String(c.to_string()))
    }

    fn children_map(&self, node: &DocumentNode) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        for child in node.children() {
            let key = child.first_word();
            if key.is_empty() {
                continue;
            }
            let def = self.definition(child);
            insert_typed(
                &mut map,
                key.to_string(),
                self.typed_value(child),
                !def.single || def.unique_first_word,
            );
        }
        map
    }
}
