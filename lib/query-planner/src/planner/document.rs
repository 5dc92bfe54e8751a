use std::fmt::Write;

use indexmap::IndexSet;

use crate::{
    ast::{
        operation::{NormalizedOperation, OperationKind},
        selection_item::SelectionItem,
        selection_set::{FieldSelection, SelectionSet},
        value::Value,
    },
    planner::{error::PlanCompilationError, plan_nodes::VariableBinding},
    schema::FusedSchema,
};

use super::requirements::RequirementGroup;

pub const REPRESENTATIONS_VARIABLE: &str = "representations";

/// A group printed in the native names of its subgraph.
#[derive(Debug, Clone)]
pub struct SubgraphDocument {
    pub document: String,
    pub variable_bindings: Vec<VariableBinding>,
}

struct Printer<'a> {
    schema: &'a FusedSchema,
    subgraph: &'a str,
    out: String,
    variables: IndexSet<String>,
}

pub fn lower_group(
    schema: &FusedSchema,
    operation: &NormalizedOperation,
    group: &RequirementGroup,
) -> Result<SubgraphDocument, PlanCompilationError> {
    let mut printer = Printer {
        schema,
        subgraph: &group.subgraph,
        out: String::new(),
        variables: IndexSet::new(),
    };
    printer.selection_set(&group.type_name, &group.selection)?;
    let selection = printer.out;

    let mut definitions = Vec::with_capacity(printer.variables.len() + 1);
    let mut variable_bindings = Vec::with_capacity(printer.variables.len() + 1);

    if let Some(entity) = &group.entity {
        definitions.push(format!("${}:[_Any!]!", REPRESENTATIONS_VARIABLE));
        variable_bindings.push(VariableBinding::Representations {
            requires: entity.requirements.clone(),
        });
    }

    for name in printer.variables {
        let definition = operation
            .variable_definition(&name)
            .ok_or_else(|| PlanCompilationError::UndefinedVariable(name.clone()))?;
        definitions.push(definition.to_string());
        variable_bindings.push(VariableBinding::Operation { name });
    }

    let kind = match (&group.entity, operation.kind) {
        (Some(_), _) => OperationKind::Query,
        (None, kind) => kind,
    };

    let mut document = String::new();
    if kind != OperationKind::Query || !definitions.is_empty() {
        document.push_str(kind.as_str());
    }
    if !definitions.is_empty() {
        let _ = write!(document, "({})", definitions.join(","));
    }
    match &group.entity {
        Some(_) => {
            let _ = write!(
                document,
                "{{_entities(representations:${}){{...on {}{}}}}}",
                REPRESENTATIONS_VARIABLE, group.type_name, selection
            );
        }
        None => document.push_str(&selection),
    }

    Ok(SubgraphDocument {
        document,
        variable_bindings,
    })
}

impl Printer<'_> {
    fn selection_set(
        &mut self,
        type_name: &str,
        selection_set: &SelectionSet,
    ) -> Result<(), PlanCompilationError> {
        self.out.push('{');
        for (i, item) in selection_set.items.iter().enumerate() {
            if i > 0 {
                self.out.push(' ');
            }
            match item {
                SelectionItem::Field(field) => self.field(type_name, field)?,
                SelectionItem::InlineFragment(fragment) => {
                    let _ = write!(self.out, "...on {}", fragment.type_condition);
                    self.selection_set(&fragment.type_condition, &fragment.selections)?;
                }
            }
        }
        self.out.push('}');

        Ok(())
    }

    fn field(&mut self, type_name: &str, field: &FieldSelection) -> Result<(), PlanCompilationError> {
        if field.is_typename() {
            match &field.alias {
                Some(alias) => {
                    let _ = write!(self.out, "{}:{}", alias, field.name);
                }
                None => self.out.push_str(&field.name),
            }
            self.condition(field);
            return Ok(());
        }

        let definition = self.schema.field(type_name, &field.name).ok_or_else(|| {
            PlanCompilationError::UnknownField {
                type_name: type_name.to_string(),
                field_name: field.name.clone(),
            }
        })?;

        let native_name = definition.native_name(self.subgraph);
        if field.alias.is_some() || native_name != field.name {
            let _ = write!(self.out, "{}:{}", field.response_key(), native_name);
        } else {
            self.out.push_str(native_name);
        }

        if !field.arguments.is_empty() {
            self.out.push('(');
            for (i, (name, value)) in field.arguments.iter().enumerate() {
                if i > 0 {
                    self.out.push(',');
                }
                let native_argument = definition
                    .arguments
                    .get(name)
                    .map(|argument| argument.native_name(self.subgraph))
                    .unwrap_or(name);
                let _ = write!(self.out, "{}:{}", native_argument, value);
                self.use_variables(value);
            }
            self.out.push(')');
        }

        self.condition(field);

        if !field.selections.is_empty() {
            self.selection_set(definition.output_type.named_type(), &field.selections)?;
        }

        Ok(())
    }

    /// Re-emits conditions a subgraph can evaluate. Other conditions are
    /// left to the response projection.
    fn condition(&mut self, field: &FieldSelection) {
        let Some((include, skip)) = field.condition.as_ref().and_then(|c| c.as_directives())
        else {
            return;
        };

        if let Some(variable) = include {
            let _ = write!(self.out, "@include(if:${})", variable);
            self.variables.insert(variable.to_string());
        }
        if let Some(variable) = skip {
            let _ = write!(self.out, "@skip(if:${})", variable);
            self.variables.insert(variable.to_string());
        }
    }

    fn use_variables(&mut self, value: &Value) {
        for variable in value.variable_usages() {
            self.variables.insert(variable.to_string());
        }
    }
}
