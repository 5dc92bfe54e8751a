use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
};

use graphql_parser::query::Value as ParserValue;
use serde::{Deserialize, Serialize};

/// A GraphQL input literal, detached from the parser's lifetimes.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum Value {
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Names of all variables referenced by this literal, nested ones included.
    pub fn variable_usages(&self) -> Vec<&str> {
        let mut usages = Vec::new();
        self.collect_variables(&mut usages);
        usages
    }

    fn collect_variables<'a>(&'a self, usages: &mut Vec<&'a str>) {
        match self {
            Value::Variable(name) => usages.push(name),
            Value::List(items) => items.iter().for_each(|v| v.collect_variables(usages)),
            Value::Object(fields) => fields.values().for_each(|v| v.collect_variables(usages)),
            _ => {}
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Value::Variable(name) => Some(name),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            // Only meaningful for defaults, which never reference variables.
            Value::Variable(_) | Value::Null => serde_json::Value::Null,
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::String(s) | Value::Enum(s) => serde_json::Value::String(s.clone()),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::List(items) => items.iter().map(Value::to_json).collect(),
            Value::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<&ParserValue<'_, String>> for Value {
    fn from(value: &ParserValue<'_, String>) -> Self {
        match value {
            ParserValue::Variable(name) => Value::Variable(name.to_owned()),
            ParserValue::Int(i) => Value::Int(i.as_i64().unwrap_or_default()),
            ParserValue::Float(f) => Value::Float(*f),
            ParserValue::String(s) => Value::String(s.to_owned()),
            ParserValue::Boolean(b) => Value::Boolean(*b),
            ParserValue::Null => Value::Null,
            ParserValue::Enum(e) => Value::Enum(e.to_owned()),
            ParserValue::List(l) => Value::List(l.iter().map(Value::from).collect()),
            ParserValue::Object(o) => Value::Object(
                o.iter()
                    .map(|(k, v)| (k.to_string(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Variable(name) => write!(f, "${}", name),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => {
                let escaped = serde_json::to_string(s).map_err(|_| fmt::Error)?;
                f.write_str(&escaped)
            }
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => f.write_str("null"),
            Value::Enum(e) => f.write_str(e),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}:{}", name, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Value;

    #[test]
    fn prints_graphql_literals() {
        let value = Value::Object(
            [
                ("name".to_string(), Value::String("a \"b\"".to_string())),
                (
                    "ids".to_string(),
                    Value::List(vec![Value::Int(1), Value::Variable("id".to_string())]),
                ),
            ]
            .into_iter()
            .collect(),
        );

        assert_eq!(value.to_string(), r#"{ids:[1,$id],name:"a \"b\""}"#);
        assert_eq!(value.variable_usages(), vec!["id"]);
    }
}
