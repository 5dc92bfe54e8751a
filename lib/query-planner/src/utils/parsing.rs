use graphql_parser::query::{Document, ParseError};

#[inline]
pub fn safe_parse_operation(operation: &str) -> Result<Document<'static, String>, ParseError> {
    graphql_parser::parse_query::<String>(operation).map(|op| op.into_static())
}

#[cfg(test)]
#[inline]
pub fn parse_operation(operation: &str) -> Document<'static, String> {
    safe_parse_operation(operation).expect("failed to parse operation")
}
