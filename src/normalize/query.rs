use serde_json::Value;
use std::collections::HashMap;

/// Value of one query parameter; repeated names collect into `Many`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    One(String),
    Many(Vec<String>),
    /// Present without a value (a JSON `null` overlay)
    Null,
}

impl ParamValue {
    /// First value, used wherever a scalar is expected
    pub fn first(&self) -> Option<&str> {
        match self {
            ParamValue::One(v) => Some(v),
            ParamValue::Many(values) => values.first().map(String::as_str),
            ParamValue::Null => None,
        }
    }

    fn push(&mut self, value: String) {
        match self {
            ParamValue::Null => *self = ParamValue::One(value),
            ParamValue::One(existing) => {
                let first = std::mem::take(existing);
                *self = ParamValue::Many(vec![first, value]);
            }
            ParamValue::Many(values) => values.push(value),
        }
    }
}

/// Decoded beacon parameters of a single hit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: HashMap<String, ParamValue>,
}

impl QueryParams {
    /// Decode an `application/x-www-form-urlencoded` string.
    ///
    /// Parameters with blank values are dropped, so a blank value and an
    /// absent one look the same to the transformer.
    pub fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            params.append(key.into_owned(), value.into_owned());
        }
        params
    }

    fn append(&mut self, key: String, value: String) {
        match self.values.get_mut(&key) {
            Some(existing) => existing.push(value),
            None => {
                self.values.insert(key, ParamValue::One(value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(ParamValue::first)
    }

    pub fn get_value(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        self.values.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy of these parameters with the keys of a JSON overlay applied on
    /// top. A `null` value keeps the key present with no value.
    pub fn with_overlay(&self, overlay: &serde_json::Map<String, Value>) -> Self {
        let mut merged = self.clone();
        for (key, value) in overlay {
            merged.insert(key.clone(), json_to_param(value));
        }
        merged
    }
}

fn json_to_param(value: &Value) -> ParamValue {
    match value {
        Value::Array(items) => {
            let mut values: Vec<String> = items.iter().filter_map(json_scalar).collect();
            match values.len() {
                0 => ParamValue::Null,
                1 => ParamValue::One(values.remove(0)),
                _ => ParamValue::Many(values),
            }
        }
        other => json_scalar(other).map_or(ParamValue::Null, ParamValue::One),
    }
}

fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        // Nested structures travel as their JSON text
        other => Some(other.to_string()),
    }
}
