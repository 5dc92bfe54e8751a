use graphql_parser::query::Value as ParserValue;

use crate::{ast::arguments::ArgumentsMap, schema::FieldDefinition};

/// Converts field arguments, dropping the ones equal to their declared default.
pub(crate) fn normalize_arguments(
    field: &FieldDefinition,
    arguments: &Vec<(String, ParserValue<'static, String>)>,
) -> ArgumentsMap {
    let mut normalized = ArgumentsMap::from(arguments);
    normalized.retain(|name, value| {
        field
            .arguments
            .get(name)
            .and_then(|definition| definition.default_value.as_ref())
            != Some(value)
    });
    normalized
}
