use graphql_parser::query::{self as query_ast, OperationDefinition};
use tracing::{instrument, trace};

pub mod context;
pub mod error;
mod pipeline;

use crate::{
    ast::{
        operation::{NormalizedOperation, OperationKind, VariableDefinition},
        selection_set::SelectionSet,
        value::Value,
    },
    schema::FusedSchema,
};
use context::NormalizationContext;
use error::NormalizationError;
use pipeline::{collect_selection_set, select_operation};

/// Turns a parsed client document into a [`NormalizedOperation`]:
/// fragments are inlined, selections merged by response key, literal
/// `@skip`/`@include` resolved and variable ones kept as conditions.
#[instrument(level = "trace", skip_all, fields(operation_name = ?operation_name))]
pub fn normalize_operation(
    schema: &FusedSchema,
    document: &query_ast::Document<'static, String>,
    operation_name: Option<&str>,
) -> Result<NormalizedOperation, NormalizationError> {
    let operation = select_operation(&document.definitions, operation_name)?;

    let (kind, name, variable_definitions, selection_set) = match operation {
        OperationDefinition::SelectionSet(selection_set) => {
            (OperationKind::Query, None, &[][..], selection_set)
        }
        OperationDefinition::Query(q) => (
            OperationKind::Query,
            q.name.clone(),
            q.variable_definitions.as_slice(),
            &q.selection_set,
        ),
        OperationDefinition::Mutation(m) => (
            OperationKind::Mutation,
            m.name.clone(),
            m.variable_definitions.as_slice(),
            &m.selection_set,
        ),
        OperationDefinition::Subscription(s) => (
            OperationKind::Subscription,
            s.name.clone(),
            s.variable_definitions.as_slice(),
            &s.selection_set,
        ),
    };

    let root_type = schema
        .root_type(kind)
        .ok_or_else(|| NormalizationError::SchemaTypeNotFound {
            type_name: match kind {
                OperationKind::Query => "Query",
                OperationKind::Mutation => "Mutation",
                OperationKind::Subscription => "Subscription",
            }
            .to_string(),
        })?;

    let mut ctx = NormalizationContext::new(schema, document);
    let mut normalized = SelectionSet::default();
    collect_selection_set(&mut ctx, root_type, selection_set, None, &mut normalized)?;

    let operation = NormalizedOperation {
        kind,
        name,
        variable_definitions: variable_definitions
            .iter()
            .map(|definition| VariableDefinition {
                name: definition.name.clone(),
                type_name: definition.var_type.to_string(),
                default_value: definition.default_value.as_ref().map(Value::from),
            })
            .collect(),
        selection_set: normalized,
    };

    trace!(operation = %operation, "operation normalized");

    Ok(operation)
}
