use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use tracing::{instrument, trace};

use crate::{
    ast::{
        condition::Condition,
        operation::{NormalizedOperation, OperationKind},
        response_path::ResponsePath,
        selection_item::SelectionItem,
        selection_set::{FieldSelection, InlineFragmentSelection, SelectionSet, SelectionStep},
    },
    planner::{
        error::{PlanCompilationError, PlannerError},
        plan_nodes::LookupClass,
    },
    schema::{FieldDefinition, FusedSchema},
    utils::cancellation::{CancelTick, CancellationToken},
};

use super::{
    DependencyKind, EntityLookup, GroupOrigin, RequirementGraph, RequirementGroup,
};

const CANCELLATION_CHECK_INTERVAL: u32 = 64;

/// Where the traversal currently is: which group receives the selections,
/// where in the response tree, and where inside the group's selection.
#[derive(Debug, Clone)]
struct Scope {
    group: NodeIndex,
    path: ResponsePath,
    cursor: Vec<SelectionStep>,
    /// Conditions of the client selections above the group's root.
    entry_condition: Option<Condition>,
    /// Conditions of the client selections above the current position.
    inherited: Option<Condition>,
}

impl Scope {
    fn at_group_root(&self) -> bool {
        self.cursor
            .iter()
            .all(|step| matches!(step, SelectionStep::Fragment(_)))
    }

    /// Scope at the root of `group`, for the entity at this scope's position.
    fn enter(&self, group: NodeIndex) -> Scope {
        Scope {
            group,
            path: self.path.clone(),
            cursor: vec![],
            entry_condition: self.inherited.clone(),
            inherited: self.inherited.clone(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct EntityGroupKey {
    subgraph: String,
    type_name: String,
    path: ResponsePath,
    parent: NodeIndex,
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct RequiresKey {
    subgraph: String,
    type_name: String,
    field_name: String,
    path: ResponsePath,
}

struct RequirementGraphBuilder<'a> {
    schema: &'a FusedSchema,
    graph: StableDiGraph<RequirementGroup, DependencyKind>,
    entity_groups: HashMap<EntityGroupKey, NodeIndex>,
    requires_groups: HashMap<RequiresKey, NodeIndex>,
    cancel_tick: CancelTick<'a>,
}

fn lookup_class(path: &ResponsePath) -> LookupClass {
    if path.has_list() {
        LookupClass::ResolveByKey
    } else {
        LookupClass::Resolve
    }
}

/// Partitions the operation into subgraph-homogeneous groups and records the
/// data dependencies between them.
#[instrument(level = "trace", skip_all, fields(kind = %operation.kind))]
pub fn build_requirement_graph(
    schema: &FusedSchema,
    operation: &NormalizedOperation,
    cancellation: &CancellationToken,
) -> Result<RequirementGraph, PlannerError> {
    let root_type = schema
        .root_type(operation.kind)
        .ok_or_else(|| PlanCompilationError::UnknownType(operation.kind.to_string()))?;

    let mut builder = RequirementGraphBuilder {
        schema,
        graph: StableDiGraph::new(),
        entity_groups: HashMap::new(),
        requires_groups: HashMap::new(),
        cancel_tick: cancellation.throttle_check(CANCELLATION_CHECK_INTERVAL),
    };

    for field in operation.selection_set.top_level_fields() {
        builder.plan_root_field(operation.kind, root_type, field)?;
    }

    trace!(groups = builder.graph.node_count(), "requirement graph built");

    Ok(RequirementGraph {
        graph: builder.graph,
    })
}

impl<'a> RequirementGraphBuilder<'a> {
    fn field_definition(
        &self,
        type_name: &str,
        field_name: &str,
    ) -> Result<&'a FieldDefinition, PlanCompilationError> {
        self.schema
            .field(type_name, field_name)
            .ok_or_else(|| PlanCompilationError::UnknownField {
                type_name: type_name.to_string(),
                field_name: field_name.to_string(),
            })
    }

    fn root_groups(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|index| self.graph[*index].origin == GroupOrigin::Root)
            .collect()
    }

    fn add_root_group(&mut self, type_name: &str, subgraph: &str) -> NodeIndex {
        trace!(subgraph, "new root group");
        self.graph.add_node(RequirementGroup {
            subgraph: subgraph.to_string(),
            type_name: type_name.to_string(),
            origin: GroupOrigin::Root,
            response_path: ResponsePath::root(),
            selection: SelectionSet::default(),
            entity: None,
        })
    }

    fn plan_root_field(
        &mut self,
        kind: OperationKind,
        root_type: &str,
        field: &FieldSelection,
    ) -> Result<(), PlannerError> {
        if field.is_typename() {
            // Answered by the gateway itself.
            return Ok(());
        }

        let definition = self.field_definition(root_type, &field.name)?;
        let Some(first_source) = definition.sources.keys().next() else {
            return Err(PlanCompilationError::UnsatisfiableField {
                type_name: root_type.to_string(),
                field_name: field.name.clone(),
            }
            .into());
        };

        let serves = |group: &NodeIndex| definition.is_served_by(&self.graph[*group].subgraph);
        let root_groups = self.root_groups();

        let group = match kind {
            OperationKind::Query => match root_groups.iter().find(|g| serves(g)) {
                Some(group) => *group,
                None => self.add_root_group(root_type, first_source),
            },
            OperationKind::Mutation => match root_groups.last() {
                // Mutation fields run serially: only the latest group may be extended.
                Some(group) if serves(group) => *group,
                _ => {
                    let previous: Vec<NodeIndex> = self.graph.node_indices().collect();
                    let group = self.add_root_group(root_type, first_source);
                    for producer in previous {
                        self.graph
                            .add_edge(producer, group, DependencyKind::MutationOrder);
                    }
                    group
                }
            },
            OperationKind::Subscription => match root_groups.first() {
                Some(group) if serves(group) => *group,
                Some(group) => {
                    return Err(PlanCompilationError::SubscriptionSpansSubgraphs(vec![
                        self.graph[*group].subgraph.clone(),
                        first_source.clone(),
                    ])
                    .into())
                }
                None => self.add_root_group(root_type, first_source),
            },
        };

        let scope = Scope {
            group,
            path: ResponsePath::root(),
            cursor: vec![],
            entry_condition: None,
            inherited: None,
        };
        self.visit_field(&scope, root_type, field, None)?;

        Ok(())
    }

    /// Visits every selection of `selection_set` and returns the groups the
    /// selected fields ended up in.
    fn visit_selection_set(
        &mut self,
        scope: &Scope,
        parent_type: &str,
        selection_set: &SelectionSet,
        extra: Option<&Condition>,
    ) -> Result<Vec<NodeIndex>, PlannerError> {
        let mut producers = Vec::new();

        for item in &selection_set.items {
            match item {
                SelectionItem::Field(field) => {
                    producers.extend(self.visit_field(scope, parent_type, field, extra)?)
                }
                SelectionItem::InlineFragment(fragment) => {
                    let mut inner = scope.clone();
                    inner
                        .cursor
                        .push(SelectionStep::Fragment(fragment.type_condition.clone()));
                    producers.extend(self.visit_selection_set(
                        &inner,
                        &fragment.type_condition,
                        &fragment.selections,
                        extra,
                    )?);
                }
            }
        }

        Ok(producers)
    }

    fn visit_field(
        &mut self,
        scope: &Scope,
        parent_type: &str,
        field: &FieldSelection,
        extra: Option<&Condition>,
    ) -> Result<Vec<NodeIndex>, PlannerError> {
        self.cancel_tick.bail_if_cancelled()?;

        let own_condition = Condition::and(field.condition.as_ref(), extra);
        let mut shell = field.shell();
        shell.condition = own_condition.clone();

        if field.is_typename() {
            self.insert_field(scope, shell)?;
            return Ok(vec![scope.group]);
        }

        let schema = self.schema;
        let definition = self.field_definition(parent_type, &field.name)?;
        let current_subgraph = self.graph[scope.group].subgraph.clone();
        let owner = if definition.is_served_by(&current_subgraph) {
            current_subgraph.clone()
        } else {
            self.choose_owner(parent_type, definition)?
        };

        let target = match definition.source(&owner).and_then(|s| s.requires.as_ref()) {
            Some(requires) => self.plan_requires(
                scope,
                parent_type,
                &field.name,
                &owner,
                requires,
                own_condition.as_ref(),
            )?,
            None if owner == current_subgraph => scope.clone(),
            None => self.entity_scope(scope, parent_type, &owner)?,
        };

        self.insert_field(&target, shell)?;

        let mut producers = vec![target.group];
        let field_type = definition.output_type.named_type();
        if schema.is_composite(field_type) {
            let response_key = field.response_key();
            let mut child = target.clone();
            child
                .cursor
                .push(SelectionStep::Field(response_key.to_string()));
            child.path.push_field(response_key);
            for _ in 0..definition.output_type.list_depth() {
                child.path.push_list();
            }
            child.inherited = Condition::and(target.inherited.as_ref(), own_condition.as_ref());

            if schema.is_abstract(field_type) {
                self.insert_field(&child, FieldSelection::typename())?;
            }

            producers.extend(self.visit_selection_set(
                &child,
                field_type,
                &field.selections,
                None,
            )?);
        }

        Ok(producers)
    }

    /// First subgraph serving the field that can also resolve `parent_type` by key.
    fn choose_owner(
        &self,
        parent_type: &str,
        definition: &FieldDefinition,
    ) -> Result<String, PlanCompilationError> {
        let type_definition = self
            .schema
            .type_definition(parent_type)
            .ok_or_else(|| PlanCompilationError::UnknownType(parent_type.to_string()))?;

        if let Some(owner) = definition
            .sources
            .keys()
            .find(|subgraph| type_definition.key(subgraph).is_some())
        {
            return Ok(owner.clone());
        }

        match definition.sources.keys().next() {
            Some(subgraph) => Err(PlanCompilationError::MissingEntityKey {
                type_name: parent_type.to_string(),
                subgraph: subgraph.clone(),
            }),
            None => Err(PlanCompilationError::UnsatisfiableField {
                type_name: parent_type.to_string(),
                field_name: definition.name.clone(),
            }),
        }
    }

    fn insert_field(&mut self, scope: &Scope, mut field: FieldSelection) -> Result<(), PlannerError> {
        if scope.at_group_root() {
            field.condition = Condition::and(field.condition.as_ref(), scope.entry_condition.as_ref());
        }
        self.insert_item(scope, field.into())
    }

    fn insert_item(&mut self, scope: &Scope, item: SelectionItem) -> Result<(), PlannerError> {
        let group = &mut self.graph[scope.group];
        let selection = group.selection.ensure_path_mut(&scope.cursor).ok_or_else(|| {
            PlanCompilationError::Internal(format!(
                "position {:?} is missing in the group of subgraph \"{}\"",
                scope.cursor, group.subgraph
            ))
        })?;
        selection
            .add_item(item)
            .map_err(PlanCompilationError::from)?;

        Ok(())
    }

    /// Makes sure every field of `set` can be fetched from `subgraph`.
    fn check_served(
        &self,
        type_name: &str,
        set: &SelectionSet,
        subgraph: &str,
    ) -> Result<(), PlanCompilationError> {
        for item in &set.items {
            match item {
                SelectionItem::Field(field) if field.is_typename() => {}
                SelectionItem::Field(field) => {
                    let definition = self.field_definition(type_name, &field.name)?;
                    if !definition.is_served_by(subgraph) {
                        return Err(PlanCompilationError::KeyFieldNotServed {
                            type_name: type_name.to_string(),
                            field_name: field.name.clone(),
                            subgraph: subgraph.to_string(),
                        });
                    }
                    self.check_served(
                        definition.output_type.named_type(),
                        &field.selections,
                        subgraph,
                    )?;
                }
                SelectionItem::InlineFragment(fragment) => {
                    self.check_served(&fragment.type_condition, &fragment.selections, subgraph)?
                }
            }
        }

        Ok(())
    }

    /// Adds `__typename` and the key of `type_name` in `subgraph` to the group
    /// in scope, and returns the matching representation requirements.
    fn add_key_fields(
        &mut self,
        scope: &Scope,
        type_name: &str,
        subgraph: &str,
    ) -> Result<SelectionSet, PlannerError> {
        let key = self
            .schema
            .type_definition(type_name)
            .and_then(|t| t.key(subgraph))
            .ok_or_else(|| PlanCompilationError::MissingEntityKey {
                type_name: type_name.to_string(),
                subgraph: subgraph.to_string(),
            })?;

        let parent_subgraph = self.graph[scope.group].subgraph.clone();
        self.check_served(type_name, key, &parent_subgraph)?;

        let mut fields = SelectionSet::default();
        fields
            .add_item(FieldSelection::typename())
            .and_then(|_| fields.merge(key.clone()))
            .map_err(PlanCompilationError::from)?;

        let mut requirements = InlineFragmentSelection::new(type_name);
        requirements.selections = fields.clone();

        if scope.at_group_root() {
            fields.and_condition(scope.entry_condition.as_ref());
        }
        for item in fields.items {
            self.insert_item(scope, item)?;
        }

        Ok(SelectionSet {
            items: vec![requirements.into()],
        })
    }

    fn entity_scope(
        &mut self,
        scope: &Scope,
        type_name: &str,
        subgraph: &str,
    ) -> Result<Scope, PlannerError> {
        let requirements = self.add_key_fields(scope, type_name, subgraph)?;

        let key = EntityGroupKey {
            subgraph: subgraph.to_string(),
            type_name: type_name.to_string(),
            path: scope.path.clone(),
            parent: scope.group,
        };

        let group = match self.entity_groups.get(&key) {
            Some(group) => *group,
            None => {
                trace!(subgraph, type_name, path = %scope.path, "new entity group");
                let group = self.graph.add_node(RequirementGroup {
                    subgraph: subgraph.to_string(),
                    type_name: type_name.to_string(),
                    origin: GroupOrigin::Entity,
                    response_path: scope.path.clone(),
                    selection: SelectionSet::default(),
                    entity: Some(EntityLookup {
                        class: lookup_class(&scope.path),
                        requirements,
                    }),
                });
                self.graph
                    .add_edge(scope.group, group, DependencyKind::EntityBoundary);
                self.entity_groups.insert(key, group);
                group
            }
        };

        Ok(scope.enter(group))
    }

    /// Opens the group resolving a field with `@requires`. The required
    /// fields are planned from the parent scope; every group producing them
    /// becomes a dependency of the new group.
    fn plan_requires(
        &mut self,
        scope: &Scope,
        type_name: &str,
        field_name: &str,
        subgraph: &str,
        requires: &SelectionSet,
        condition: Option<&Condition>,
    ) -> Result<Scope, PlannerError> {
        let key = RequiresKey {
            subgraph: subgraph.to_string(),
            type_name: type_name.to_string(),
            field_name: field_name.to_string(),
            path: scope.path.clone(),
        };

        if let Some(group) = self.requires_groups.get(&key) {
            trace!(type_name, field_name, "requirement already planned");
            return Ok(scope.enter(*group));
        }

        let mut requirements = self.add_key_fields(scope, type_name, subgraph)?;
        if let Some(SelectionItem::InlineFragment(fragment)) = requirements.items.first_mut() {
            fragment
                .selections
                .merge(requires.clone())
                .map_err(PlanCompilationError::from)?;
        }

        trace!(subgraph, type_name, field_name, path = %scope.path, "new requires group");
        let group = self.graph.add_node(RequirementGroup {
            subgraph: subgraph.to_string(),
            type_name: type_name.to_string(),
            origin: GroupOrigin::Requires {
                field: format!("{}.{}", type_name, field_name),
            },
            response_path: scope.path.clone(),
            selection: SelectionSet::default(),
            entity: Some(EntityLookup {
                class: lookup_class(&scope.path),
                requirements,
            }),
        });
        self.graph
            .add_edge(scope.group, group, DependencyKind::EntityBoundary);
        self.requires_groups.insert(key, group);

        let producers = self.visit_selection_set(scope, type_name, requires, condition)?;
        for producer in producers {
            self.graph
                .add_edge(producer, group, DependencyKind::Requires);
        }

        Ok(scope.enter(group))
    }
}
