use std::collections::HashMap;

use graphql_parser::query::{self as query_ast, Definition, FragmentDefinition};

use crate::schema::FusedSchema;

pub struct NormalizationContext<'a> {
    pub schema: &'a FusedSchema,
    pub fragments: HashMap<&'a str, &'a FragmentDefinition<'static, String>>,
    /// Fragment spreads currently being expanded, innermost last.
    pub visiting: Vec<String>,
}

impl<'a> NormalizationContext<'a> {
    pub fn new(schema: &'a FusedSchema, document: &'a query_ast::Document<'static, String>) -> Self {
        let fragments = document
            .definitions
            .iter()
            .filter_map(|definition| match definition {
                Definition::Fragment(fragment) => Some((fragment.name.as_str(), fragment)),
                Definition::Operation(_) => None,
            })
            .collect();

        Self {
            schema,
            fragments,
            visiting: Vec::new(),
        }
    }
}
