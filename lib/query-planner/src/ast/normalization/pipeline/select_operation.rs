use graphql_parser::query::{Definition, OperationDefinition};

use crate::ast::normalization::error::NormalizationError;

fn operation_name<'d>(operation: &'d OperationDefinition<'static, String>) -> Option<&'d str> {
    match operation {
        OperationDefinition::Query(q) => q.name.as_deref(),
        OperationDefinition::Mutation(m) => m.name.as_deref(),
        OperationDefinition::Subscription(s) => s.name.as_deref(),
        OperationDefinition::SelectionSet(_) => None,
    }
}

/// Picks the operation to execute: the one named `requested`, or the only
/// operation of the document when no name is given.
pub(crate) fn select_operation<'d>(
    definitions: &'d [Definition<'static, String>],
    requested: Option<&str>,
) -> Result<&'d OperationDefinition<'static, String>, NormalizationError> {
    let mut candidates = definitions.iter().filter_map(|definition| match definition {
        Definition::Operation(operation) => Some(operation),
        Definition::Fragment(_) => None,
    });

    match requested {
        Some(requested) => candidates
            .find(|operation| operation_name(operation) == Some(requested))
            .ok_or_else(|| NormalizationError::SpecifiedOperationNotFound {
                operation_name: requested.to_string(),
            }),
        None => {
            let first = candidates.next().ok_or(NormalizationError::OperationNotFound)?;
            if candidates.next().is_some() {
                return Err(NormalizationError::MultipleMatchingOperationsFound);
            }
            Ok(first)
        }
    }
}
