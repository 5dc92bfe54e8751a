use graphql_parser::query::{Directive, Value};

use crate::ast::condition::{Condition, Predicate};

pub(crate) enum Inclusion {
    /// A literal `@skip(if: true)` or `@include(if: false)`.
    Excluded,
    /// Kept, possibly behind variable-driven predicates.
    Included(Option<Condition>),
}

fn extract_condition_argument<'d>(
    directive_name: &str,
    directives: &'d [Directive<'static, String>],
) -> Option<&'d Value<'static, String>> {
    directives
        .iter()
        .filter(|d| d.name == directive_name)
        .find_map(|d| {
            d.arguments
                .iter()
                .find_map(|(name, value)| (name == "if").then_some(value))
        })
}

pub(crate) fn resolve_inclusion(directives: &[Directive<'static, String>]) -> Inclusion {
    let mut condition: Option<Condition> = None;

    for (directive_name, passes_when) in [("include", true), ("skip", false)] {
        match extract_condition_argument(directive_name, directives) {
            Some(Value::Boolean(value)) if *value != passes_when => return Inclusion::Excluded,
            Some(Value::Variable(variable)) => {
                let predicate = Condition::from_predicate(Predicate {
                    variable: variable.clone(),
                    passes_when,
                });
                condition = Condition::and(condition.as_ref(), Some(&predicate));
            }
            _ => {}
        }
    }

    match condition {
        Some(condition) if condition.is_never() => Inclusion::Excluded,
        condition => Inclusion::Included(condition),
    }
}
