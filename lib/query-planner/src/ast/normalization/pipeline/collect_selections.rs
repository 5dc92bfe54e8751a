use graphql_parser::query::{Selection, SelectionSet as ParserSelectionSet, TypeCondition};

use crate::ast::{
    condition::Condition,
    normalization::{context::NormalizationContext, error::NormalizationError},
    selection_set::{FieldSelection, InlineFragmentSelection, SelectionSet, TYPENAME_FIELD},
};

use super::{
    conditions::{resolve_inclusion, Inclusion},
    normalize_arguments::normalize_arguments,
};

/// Collects `selection_set` into `target`, inlining fragment spreads,
/// flattening fragments that always match and merging by response key.
///
/// `inherited` is the condition of the fragments that were flattened on the
/// way here; it is ANDed onto every collected field.
pub(crate) fn collect_selection_set(
    ctx: &mut NormalizationContext<'_>,
    parent_type: &str,
    selection_set: &ParserSelectionSet<'static, String>,
    inherited: Option<&Condition>,
    target: &mut SelectionSet,
) -> Result<(), NormalizationError> {
    let schema = ctx.schema;

    for selection in &selection_set.items {
        match selection {
            Selection::Field(field) => {
                let Inclusion::Included(own) = resolve_inclusion(&field.directives) else {
                    continue;
                };

                let mut normalized = FieldSelection::new(field.name.clone());
                normalized.alias = field.alias.clone();
                normalized.condition = Condition::and(own.as_ref(), inherited);
                if normalized.condition.as_ref().is_some_and(Condition::is_never) {
                    continue;
                }

                if field.name != TYPENAME_FIELD {
                    let definition = schema.field(parent_type, &field.name).ok_or_else(|| {
                        NormalizationError::FieldNotFoundInType {
                            field_name: field.name.clone(),
                            type_name: parent_type.to_string(),
                        }
                    })?;

                    normalized.arguments = normalize_arguments(definition, &field.arguments);

                    if !field.selection_set.items.is_empty() {
                        let field_type = definition.output_type.named_type().to_string();
                        collect_selection_set(
                            ctx,
                            &field_type,
                            &field.selection_set,
                            None,
                            &mut normalized.selections,
                        )?;
                    }
                }

                target.add_item(normalized)?;
            }
            Selection::FragmentSpread(spread) => {
                let Inclusion::Included(own) = resolve_inclusion(&spread.directives) else {
                    continue;
                };

                let fragment = *ctx
                    .fragments
                    .get(spread.fragment_name.as_str())
                    .ok_or_else(|| NormalizationError::FragmentDefinitionNotFound {
                        fragment_name: spread.fragment_name.clone(),
                    })?;

                if ctx.visiting.contains(&spread.fragment_name) {
                    return Err(NormalizationError::FragmentCycle {
                        fragment_name: spread.fragment_name.clone(),
                    });
                }

                let TypeCondition::On(type_condition) = &fragment.type_condition;
                let condition = Condition::and(own.as_ref(), inherited);

                ctx.visiting.push(spread.fragment_name.clone());
                collect_fragment(
                    ctx,
                    parent_type,
                    type_condition,
                    &fragment.selection_set,
                    condition.as_ref(),
                    target,
                )?;
                ctx.visiting.pop();
            }
            Selection::InlineFragment(fragment) => {
                let Inclusion::Included(own) = resolve_inclusion(&fragment.directives) else {
                    continue;
                };

                let type_condition = match &fragment.type_condition {
                    Some(TypeCondition::On(type_condition)) => type_condition.as_str(),
                    None => parent_type,
                };
                let condition = Condition::and(own.as_ref(), inherited);

                collect_fragment(
                    ctx,
                    parent_type,
                    type_condition,
                    &fragment.selection_set,
                    condition.as_ref(),
                    target,
                )?;
            }
        }
    }

    Ok(())
}

fn collect_fragment(
    ctx: &mut NormalizationContext<'_>,
    parent_type: &str,
    type_condition: &str,
    selection_set: &ParserSelectionSet<'static, String>,
    condition: Option<&Condition>,
    target: &mut SelectionSet,
) -> Result<(), NormalizationError> {
    if condition.is_some_and(Condition::is_never) {
        return Ok(());
    }

    let schema = ctx.schema;
    let parent_is_object = !schema.is_abstract(parent_type);
    if schema.type_definition(type_condition).is_none() {
        return Err(NormalizationError::SchemaTypeNotFound {
            type_name: type_condition.to_string(),
        });
    }

    if type_condition == parent_type
        || (parent_is_object && schema.type_satisfies(parent_type, type_condition))
    {
        return collect_selection_set(ctx, parent_type, selection_set, condition, target);
    }

    if parent_is_object {
        // An object type can never match an unrelated type condition.
        return Ok(());
    }

    let mut fragment = InlineFragmentSelection::new(type_condition);
    collect_selection_set(
        ctx,
        type_condition,
        selection_set,
        condition,
        &mut fragment.selections,
    )?;

    if !fragment.selections.is_empty() {
        target.add_item(fragment)?;
    }

    Ok(())
}
