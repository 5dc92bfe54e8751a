use std::collections::HashMap;

use query_planner::ast::operation::NormalizedOperation;
use serde_json::{Map, Value};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VariablesError {
    #[error("Variable \"${0}\" of required type \"{1}\" was not provided.")]
    MissingRequired(String, String),
}

/// Resolves the operation's variables from the client's input.
///
/// Provided values win, explicit `null` included. Declared defaults fill the
/// gaps. Variables the operation does not declare are ignored.
pub fn coerce_variables(
    operation: &NormalizedOperation,
    provided: Option<&Map<String, Value>>,
) -> Result<HashMap<String, Value>, VariablesError> {
    let mut coerced = HashMap::with_capacity(operation.variable_definitions.len());

    for definition in &operation.variable_definitions {
        if let Some(value) = provided.and_then(|provided| provided.get(&definition.name)) {
            coerced.insert(definition.name.clone(), value.clone());
            continue;
        }

        if let Some(default_value) = &definition.default_value {
            coerced.insert(definition.name.clone(), default_value.to_json());
            continue;
        }

        if definition.type_name.ends_with('!') {
            return Err(VariablesError::MissingRequired(
                definition.name.clone(),
                definition.type_name.clone(),
            ));
        }
    }

    Ok(coerced)
}

#[cfg(test)]
mod tests {
    use query_planner::ast::{
        operation::{NormalizedOperation, OperationKind, VariableDefinition},
        selection_set::SelectionSet,
        value::Value as AstValue,
    };
    use serde_json::json;

    use super::{coerce_variables, VariablesError};

    fn operation(variable_definitions: Vec<VariableDefinition>) -> NormalizedOperation {
        NormalizedOperation {
            kind: OperationKind::Query,
            name: None,
            variable_definitions,
            selection_set: SelectionSet::default(),
        }
    }

    fn definition(name: &str, type_name: &str, default_value: Option<AstValue>) -> VariableDefinition {
        VariableDefinition {
            name: name.to_string(),
            type_name: type_name.to_string(),
            default_value,
        }
    }

    #[test]
    fn applies_defaults_and_keeps_explicit_values() {
        let operation = operation(vec![
            definition("first", "Int", Some(AstValue::Int(3))),
            definition("withReviews", "Boolean!", None),
            definition("cursor", "String", None),
        ]);
        let provided = json!({ "withReviews": false, "unused": 1 });

        let coerced = coerce_variables(&operation, provided.as_object()).unwrap();

        assert_eq!(coerced.len(), 2);
        assert_eq!(coerced.get("first"), Some(&json!(3)));
        assert_eq!(coerced.get("withReviews"), Some(&json!(false)));
        assert!(!coerced.contains_key("cursor"));
    }

    #[test]
    fn rejects_missing_required_variables() {
        let operation = operation(vec![definition("id", "ID!", None)]);

        assert_eq!(
            coerce_variables(&operation, None),
            Err(VariablesError::MissingRequired(
                "id".to_string(),
                "ID!".to_string()
            ))
        );
    }
}
