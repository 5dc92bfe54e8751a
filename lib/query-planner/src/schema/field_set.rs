use graphql_parser::query::{
    Definition, OperationDefinition, Selection, SelectionSet as ParserSelectionSet, TypeCondition,
};

use crate::ast::selection_set::{FieldSelection, InlineFragmentSelection, SelectionSet};

use super::error::SchemaError;

/// Parses a `@key`/`@requires` field set such as `id sku` or `dimensions { weight }`.
pub fn parse_field_set(type_name: &str, fields: &str) -> Result<SelectionSet, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidFieldSet {
        type_name: type_name.to_string(),
        fields: fields.to_string(),
        reason,
    };

    let source = format!("{{{}}}", fields);
    let document =
        graphql_parser::parse_query::<String>(&source).map_err(|e| invalid(e.to_string()))?;

    match document.definitions.as_slice() {
        [Definition::Operation(OperationDefinition::SelectionSet(selection_set))] => {
            convert_selection_set(selection_set).map_err(invalid)
        }
        _ => Err(invalid("expected a single selection set".to_string())),
    }
}

fn convert_selection_set(
    selection_set: &ParserSelectionSet<'_, String>,
) -> Result<SelectionSet, String> {
    let mut result = SelectionSet::default();

    for selection in &selection_set.items {
        match selection {
            Selection::Field(field) => {
                let mut converted = FieldSelection::new(field.name.clone());
                converted.alias = field.alias.clone();
                converted.arguments = (&field.arguments).into();
                converted.selections = convert_selection_set(&field.selection_set)?;
                result.add_item(converted).map_err(|e| e.to_string())?;
            }
            Selection::InlineFragment(fragment) => {
                let selections = convert_selection_set(&fragment.selection_set)?;
                match &fragment.type_condition {
                    Some(TypeCondition::On(type_condition)) => {
                        let mut converted = InlineFragmentSelection::new(type_condition.clone());
                        converted.selections = selections;
                        result.add_item(converted).map_err(|e| e.to_string())?;
                    }
                    None => result.merge(selections).map_err(|e| e.to_string())?,
                }
            }
            Selection::FragmentSpread(spread) => {
                return Err(format!(
                    "fragment spread \"{}\" is not allowed in a field set",
                    spread.fragment_name
                ))
            }
        }
    }

    Ok(result)
}
