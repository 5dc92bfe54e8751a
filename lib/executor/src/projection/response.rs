use std::collections::HashMap;

use query_planner::{
    ast::{
        condition::Condition,
        operation::NormalizedOperation,
        selection_item::SelectionItem,
        selection_set::{FieldSelection, SelectionSet},
    },
    schema::{
        type_ref::{NullabilityMode, TypeRef},
        FieldDefinition, FusedSchema,
    },
};
use serde_json::{Map, Value};
use tracing::{instrument, trace, warn};

use crate::response::{
    graphql_error::{
        GraphQLError, GraphQLErrorPathSegment, INTERNAL_EXECUTION_ERROR,
        SEMANTIC_NON_NULL_VIOLATION,
    },
    merge::deep_merge,
};

const TYPENAME_FIELD_NAME: &str = "__typename";

/// A non-null position resolved to null; the enclosing value must be nulled as well.
struct NullBubble;

struct ResponseProjector<'a> {
    schema: &'a FusedSchema,
    variables: &'a HashMap<String, Value>,
    errors: &'a mut Vec<GraphQLError>,
    path: Vec<GraphQLErrorPathSegment>,
}

/// Shapes the assembled result tree after the client operation.
///
/// Applies nullability per field and per list depth, records the errors
/// this causes, and drops every key the operation did not ask for.
/// Returns `null` when a violation bubbles up to the root.
#[instrument(level = "trace", skip_all)]
pub fn project_response(
    schema: &FusedSchema,
    operation: &NormalizedOperation,
    variables: &HashMap<String, Value>,
    data: &Value,
    errors: &mut Vec<GraphQLError>,
) -> Value {
    let Some(root_type) = schema.root_type(operation.kind) else {
        return Value::Null;
    };

    let empty = Map::new();
    let source = data.as_object().unwrap_or(&empty);
    let mut projector = ResponseProjector {
        schema,
        variables,
        errors,
        path: Vec::new(),
    };

    match projector.project_object(root_type, &operation.selection_set, source) {
        Ok(projected) => Value::Object(projected),
        Err(NullBubble) => {
            trace!("non-null violation reached the root");
            Value::Null
        }
    }
}

impl ResponseProjector<'_> {
    fn project_object(
        &mut self,
        type_name: &str,
        selection_set: &SelectionSet,
        source: &Map<String, Value>,
    ) -> Result<Map<String, Value>, NullBubble> {
        let concrete_type = source
            .get(TYPENAME_FIELD_NAME)
            .and_then(Value::as_str)
            .unwrap_or(type_name);
        let mut projected = Map::new();
        self.project_selections(type_name, concrete_type, selection_set, source, &mut projected)?;

        Ok(projected)
    }

    fn project_selections(
        &mut self,
        type_name: &str,
        concrete_type: &str,
        selection_set: &SelectionSet,
        source: &Map<String, Value>,
        out: &mut Map<String, Value>,
    ) -> Result<(), NullBubble> {
        for item in &selection_set.items {
            match item {
                SelectionItem::Field(field) => {
                    if !self.is_included(field.condition.as_ref()) {
                        continue;
                    }

                    let response_key = field.response_key();
                    if field.is_typename() {
                        out.insert(
                            response_key.to_string(),
                            Value::String(concrete_type.to_string()),
                        );
                        continue;
                    }

                    let Some(definition) = self.schema.field(type_name, &field.name) else {
                        warn!(type_name, field = %field.name, "field is not part of the schema");
                        continue;
                    };

                    self.path.push(response_key.into());
                    let value = source.get(response_key).unwrap_or(&Value::Null);
                    let result = self.project_value(
                        concrete_type,
                        definition,
                        &definition.output_type,
                        0,
                        field,
                        value,
                    );
                    self.path.pop();

                    let projected = result?;
                    let merge_into_existing =
                        projected.is_object() && out.get(response_key).is_some_and(Value::is_object);
                    if merge_into_existing {
                        if let Some(existing) = out.get_mut(response_key) {
                            deep_merge(existing, projected);
                        }
                    } else {
                        out.insert(response_key.to_string(), projected);
                    }
                }
                SelectionItem::InlineFragment(fragment) => {
                    if self
                        .schema
                        .type_satisfies(concrete_type, &fragment.type_condition)
                    {
                        self.project_selections(
                            &fragment.type_condition,
                            concrete_type,
                            &fragment.selections,
                            source,
                            out,
                        )?;
                    }
                }
            }
        }

        Ok(())
    }

    fn project_value(
        &mut self,
        parent_type: &str,
        definition: &FieldDefinition,
        type_ref: &TypeRef,
        depth: usize,
        field: &FieldSelection,
        value: &Value,
    ) -> Result<Value, NullBubble> {
        let is_non_null = type_ref.is_non_null();
        if value.is_null() {
            return self.null_at(parent_type, definition, depth, is_non_null);
        }

        match type_ref.nullable() {
            TypeRef::List(item_type) => {
                let Value::Array(items) = value else {
                    return self.shape_mismatch(parent_type, definition, depth, is_non_null);
                };

                let mut projected = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    self.path.push(index.into());
                    let result =
                        self.project_value(parent_type, definition, item_type, depth + 1, field, item);
                    self.path.pop();

                    match result {
                        Ok(item) => projected.push(item),
                        Err(NullBubble) => {
                            return self.null_at(parent_type, definition, depth, is_non_null)
                        }
                    }
                }

                Ok(Value::Array(projected))
            }
            TypeRef::Named(named_type) if self.schema.is_composite(named_type) => {
                let Value::Object(source) = value else {
                    return self.shape_mismatch(parent_type, definition, depth, is_non_null);
                };

                match self.project_object(named_type, &field.selections, source) {
                    Ok(projected) => Ok(Value::Object(projected)),
                    Err(NullBubble) => self.null_at(parent_type, definition, depth, is_non_null),
                }
            }
            TypeRef::Named(_) => {
                if value.is_object() || value.is_array() {
                    return self.shape_mismatch(parent_type, definition, depth, is_non_null);
                }

                Ok(value.clone())
            }
            // `nullable()` strips the only non-null wrapper a position can have.
            TypeRef::NonNull(inner) => {
                self.project_value(parent_type, definition, inner, depth, field, value)
            }
        }
    }

    fn null_at(
        &mut self,
        parent_type: &str,
        definition: &FieldDefinition,
        depth: usize,
        is_non_null: bool,
    ) -> Result<Value, NullBubble> {
        match definition.nullability(depth, is_non_null) {
            NullabilityMode::Nullable => Ok(Value::Null),
            NullabilityMode::NonNull => {
                if !self.has_error_at_or_below() {
                    self.errors.push(
                        GraphQLError::from(format!(
                            "Cannot return null for non-nullable field {}.{}.",
                            parent_type, definition.name
                        ))
                        .with_path(self.path.clone()),
                    );
                }
                Err(NullBubble)
            }
            NullabilityMode::SemanticNonNull => {
                if !self.has_error_at_or_below() {
                    self.errors.push(
                        GraphQLError::from("Cannot return null for semantic non-null field.")
                            .with_path(self.path.clone())
                            .with_code(SEMANTIC_NON_NULL_VIOLATION),
                    );
                }
                Ok(Value::Null)
            }
        }
    }

    fn shape_mismatch(
        &mut self,
        parent_type: &str,
        definition: &FieldDefinition,
        depth: usize,
        is_non_null: bool,
    ) -> Result<Value, NullBubble> {
        warn!(
            field = %definition.name,
            depth,
            "subgraph value does not match the field type"
        );
        self.errors.push(
            GraphQLError::from("Unexpected execution error")
                .with_path(self.path.clone())
                .with_code(INTERNAL_EXECUTION_ERROR),
        );

        self.null_at(parent_type, definition, depth, is_non_null)
    }

    fn has_error_at_or_below(&self) -> bool {
        self.errors.iter().any(|error| error.is_at_or_below(&self.path))
    }

    fn is_included(&self, condition: Option<&Condition>) -> bool {
        condition.map_or(true, |condition| condition.evaluate(self.variables))
    }
}
