use graphql_parser::schema::{Directive, Value};

use super::error::SchemaError;

/// A fusion directive that can be read off a schema element.
pub trait FusionDirective: Sized {
    const NAME: &'static str;

    fn parse(directive: &Directive<'_, String>, location: &str) -> Result<Self, SchemaError>;

    fn is(directive: &Directive<'_, String>) -> bool {
        directive.name == Self::NAME
    }

    fn extract_all(
        directives: &[Directive<'_, String>],
        location: &str,
    ) -> Result<Vec<Self>, SchemaError> {
        directives
            .iter()
            .filter(|d| Self::is(d))
            .map(|d| Self::parse(d, location))
            .collect()
    }
}

fn string_argument(
    directive: &Directive<'_, String>,
    name: &str,
    directive_name: &'static str,
    location: &str,
) -> Result<String, SchemaError> {
    directive
        .arguments
        .iter()
        .find(|(arg_name, _)| arg_name == name)
        .and_then(|(_, value)| match value {
            Value::String(value) | Value::Enum(value) => Some(value.clone()),
            _ => None,
        })
        .ok_or_else(|| SchemaError::InvalidDirective {
            directive: directive_name,
            location: location.to_string(),
            reason: format!("missing string argument \"{}\"", name),
        })
}

macro_rules! subgraph_directive {
    ($(#[$meta:meta])* $name:ident, $directive:literal $(, $field:ident => $arg:literal)*) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub subgraph: String,
            $(pub $field: String,)*
        }

        impl FusionDirective for $name {
            const NAME: &'static str = $directive;

            fn parse(directive: &Directive<'_, String>, location: &str) -> Result<Self, SchemaError> {
                Ok(Self {
                    subgraph: string_argument(directive, "subgraph", Self::NAME, location)?,
                    $($field: string_argument(directive, $arg, Self::NAME, location)?,)*
                })
            }
        }
    };
}

subgraph_directive!(
    /// `@transport(subgraph:, location:)` on the schema definition.
    TransportDirective, "transport", location => "location"
);
subgraph_directive!(
    /// `@source(subgraph:)` on a field or an object type.
    SourceDirective, "source"
);
subgraph_directive!(
    /// `@key(subgraph:, fields:)` on an object type.
    KeyDirective, "key", fields => "fields"
);
subgraph_directive!(
    /// `@requires(subgraph:, fields:)` on a field.
    RequiresDirective, "requires", fields => "fields"
);
subgraph_directive!(
    /// `@rename(subgraph:, to:)` on a field.
    RenameDirective, "rename", to => "to"
);
subgraph_directive!(
    /// `@is(subgraph:, name:)` on a field argument.
    IsDirective, "is", name => "name"
);
subgraph_directive!(
    /// `@remove(subgraph:)` on a field.
    RemoveDirective, "remove"
);

/// `@semanticNonNull(levels: [Int!] = [0])`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticNonNullDirective {
    pub levels: Vec<usize>,
}

impl FusionDirective for SemanticNonNullDirective {
    const NAME: &'static str = "semanticNonNull";

    fn parse(directive: &Directive<'_, String>, location: &str) -> Result<Self, SchemaError> {
        let Some((_, value)) = directive.arguments.iter().find(|(n, _)| n == "levels") else {
            return Ok(Self { levels: vec![0] });
        };

        let invalid = || SchemaError::InvalidDirective {
            directive: Self::NAME,
            location: location.to_string(),
            reason: "\"levels\" must be a list of non-negative integers".to_string(),
        };

        let items = match value {
            Value::List(items) => items.as_slice(),
            single @ Value::Int(_) => std::slice::from_ref(single),
            _ => return Err(invalid()),
        };

        let levels = items
            .iter()
            .map(|item| match item {
                Value::Int(n) => n
                    .as_i64()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(invalid),
                _ => Err(invalid()),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { levels })
    }
}
