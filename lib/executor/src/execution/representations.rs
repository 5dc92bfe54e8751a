use std::collections::HashMap;

use query_planner::{
    ast::{selection_item::SelectionItem, selection_set::SelectionSet},
    planner::plan_nodes::FetchNode,
    schema::FusedSchema,
};
use serde_json::{Map, Value};
use tracing::trace;

use crate::utils::traverse::{collect_positions, value_at, Position};

const TYPENAME_FIELD_NAME: &str = "__typename";

/// Representations of one entity fetch, deduplicated by value.
#[derive(Debug, Default)]
pub struct EntityBatch {
    pub representations: Vec<Value>,
    /// Every position the fetch writes to, with the index of its representation.
    pub targets: Vec<(Position, usize)>,
}

impl EntityBatch {
    pub fn is_empty(&self) -> bool {
        self.representations.is_empty()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.targets
            .iter()
            .map(|(position, _)| position.clone())
            .collect()
    }

    /// Positions whose representation was sent at `index`.
    pub fn positions_of(&self, index: usize) -> impl Iterator<Item = &Position> {
        self.targets
            .iter()
            .filter(move |(_, i)| *i == index)
            .map(|(position, _)| position)
    }
}

pub fn collect_representations(
    schema: &FusedSchema,
    fetch: &FetchNode,
    requires: &SelectionSet,
    data: &Value,
) -> EntityBatch {
    let mut batch = EntityBatch::default();
    let mut index_by_representation: HashMap<String, usize> = HashMap::new();

    for response_path in &fetch.response_paths {
        for position in collect_positions(data, response_path) {
            let Some(Value::Object(entity)) = value_at(data, &position) else {
                continue;
            };
            let Some(representation) =
                project_representation(schema, &fetch.subgraph, requires, entity)
            else {
                trace!(path = ?position, "entity has no complete representation, skipping");
                continue;
            };

            let hash_key = representation.to_string();
            let index = match index_by_representation.get(&hash_key) {
                Some(index) => *index,
                None => {
                    let index = batch.representations.len();
                    batch.representations.push(representation);
                    index_by_representation.insert(hash_key, index);
                    index
                }
            };
            batch.targets.push((position, index));
        }
    }

    batch
}

/// Projects an entity through `{...on T{...}}`, renaming fields to the
/// subgraph's native names. `None` when the entity does not match any
/// fragment or lacks a required field.
pub fn project_representation(
    schema: &FusedSchema,
    subgraph: &str,
    requires: &SelectionSet,
    entity: &Map<String, Value>,
) -> Option<Value> {
    let typename = entity.get(TYPENAME_FIELD_NAME).and_then(Value::as_str);
    let mut representation = Map::new();
    let mut matched = false;

    for item in &requires.items {
        if let SelectionItem::InlineFragment(fragment) = item {
            let applies = typename.map_or(true, |typename| {
                schema.type_satisfies(typename, &fragment.type_condition)
            });
            if applies {
                project_fields(
                    schema,
                    subgraph,
                    &fragment.type_condition,
                    &fragment.selections,
                    entity,
                    &mut representation,
                )?;
                matched = true;
            }
        }
    }

    if !matched || representation.is_empty() {
        return None;
    }

    Some(Value::Object(representation))
}

fn project_fields(
    schema: &FusedSchema,
    subgraph: &str,
    type_name: &str,
    selection_set: &SelectionSet,
    source: &Map<String, Value>,
    out: &mut Map<String, Value>,
) -> Option<()> {
    let typename = source
        .get(TYPENAME_FIELD_NAME)
        .and_then(Value::as_str)
        .unwrap_or(type_name);

    for item in &selection_set.items {
        match item {
            SelectionItem::Field(field) => {
                let value = source.get(field.response_key())?;
                if field.is_typename() {
                    out.insert(TYPENAME_FIELD_NAME.to_string(), value.clone());
                    continue;
                }

                let definition = schema.field(type_name, &field.name);
                let native_name = definition
                    .map(|d| d.native_name(subgraph))
                    .unwrap_or(&field.name);
                let projected = match definition {
                    Some(definition) if !field.selections.is_empty() => project_nested(
                        schema,
                        subgraph,
                        definition.output_type.named_type(),
                        &field.selections,
                        value,
                    )?,
                    _ => value.clone(),
                };
                out.insert(native_name.to_string(), projected);
            }
            SelectionItem::InlineFragment(fragment) => {
                if schema.type_satisfies(typename, &fragment.type_condition) {
                    project_fields(
                        schema,
                        subgraph,
                        &fragment.type_condition,
                        &fragment.selections,
                        source,
                        out,
                    )?;
                }
            }
        }
    }

    Some(())
}

fn project_nested(
    schema: &FusedSchema,
    subgraph: &str,
    type_name: &str,
    selection_set: &SelectionSet,
    value: &Value,
) -> Option<Value> {
    match value {
        Value::Object(source) => {
            let mut out = Map::new();
            project_fields(schema, subgraph, type_name, selection_set, source, &mut out)?;
            Some(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| project_nested(schema, subgraph, type_name, selection_set, item))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        other => Some(other.clone()),
    }
}
