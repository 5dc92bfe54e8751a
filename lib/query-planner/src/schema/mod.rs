pub mod directives;
pub mod error;
pub mod field_set;
pub mod type_ref;

use std::collections::{BTreeSet, HashMap};

use graphql_parser::schema::{
    self as parser, Definition, Directive, Field as ParserField,
    TypeDefinition as ParserTypeDefinition,
};
use indexmap::IndexMap;
use tracing::debug;

use crate::ast::{
    operation::OperationKind,
    selection_item::SelectionItem,
    selection_set::{SelectionSet, TYPENAME_FIELD},
    value::Value,
};

use self::{
    directives::{
        FusionDirective, IsDirective, KeyDirective, RemoveDirective, RenameDirective,
        RequiresDirective, SemanticNonNullDirective, SourceDirective, TransportDirective,
    },
    error::SchemaError,
    field_set::parse_field_set,
    type_ref::{NullabilityMode, TypeRef},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Object,
    Interface,
    Union,
    Scalar,
    Enum,
    InputObject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphDefinition {
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub name: String,
    pub kind: TypeKind,
    pub fields: IndexMap<String, FieldDefinition>,
    /// Entity key per subgraph.
    pub keys: IndexMap<String, SelectionSet>,
    /// Object types an interface or union may resolve to.
    pub possible_types: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub output_type: TypeRef,
    pub arguments: IndexMap<String, ArgumentDefinition>,
    /// Subgraphs able to resolve the field, in declaration order.
    pub sources: IndexMap<String, FieldSource>,
    pub semantic_non_null_levels: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct FieldSource {
    pub subgraph: String,
    pub native_name: String,
    pub requires: Option<SelectionSet>,
}

#[derive(Debug, Clone)]
pub struct ArgumentDefinition {
    pub name: String,
    pub value_type: TypeRef,
    pub default_value: Option<Value>,
    native_names: HashMap<String, String>,
}

/// The fused schema: the client-facing type system plus, per field, which
/// subgraphs serve it and under which native names.
#[derive(Debug, Clone)]
pub struct FusedSchema {
    query_type: String,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    types: HashMap<String, TypeDefinition>,
    subgraphs: IndexMap<String, SubgraphDefinition>,
}

impl FieldDefinition {
    pub fn is_served_by(&self, subgraph: &str) -> bool {
        self.sources.contains_key(subgraph)
    }

    pub fn source(&self, subgraph: &str) -> Option<&FieldSource> {
        self.sources.get(subgraph)
    }

    pub fn native_name<'a>(&'a self, subgraph: &str) -> &'a str {
        self.sources
            .get(subgraph)
            .map(|s| s.native_name.as_str())
            .unwrap_or(&self.name)
    }

    /// Nullability at the given list depth, 0 being the field value itself.
    pub fn nullability(&self, depth: usize, is_non_null: bool) -> NullabilityMode {
        if is_non_null {
            NullabilityMode::NonNull
        } else if self.semantic_non_null_levels.contains(&depth) {
            NullabilityMode::SemanticNonNull
        } else {
            NullabilityMode::Nullable
        }
    }
}

impl ArgumentDefinition {
    pub fn native_name<'a>(&'a self, subgraph: &str) -> &'a str {
        self.native_names
            .get(subgraph)
            .map(String::as_str)
            .unwrap_or(&self.name)
    }
}

impl TypeDefinition {
    pub fn key(&self, subgraph: &str) -> Option<&SelectionSet> {
        self.keys.get(subgraph)
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Object | TypeKind::Interface | TypeKind::Union
        )
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, TypeKind::Interface | TypeKind::Union)
    }
}

impl FusedSchema {
    pub fn parse(sdl: &str) -> Result<Self, SchemaError> {
        let document = parser::parse_schema::<String>(sdl)
            .map_err(|e| SchemaError::ParseError(e.to_string()))?;

        Self::from_document(&document)
    }

    pub fn from_document(document: &parser::Document<'_, String>) -> Result<Self, SchemaError> {
        let mut root_types: [Option<String>; 3] = [None, None, None];
        let mut subgraphs: IndexMap<String, SubgraphDefinition> = IndexMap::new();
        let mut types: HashMap<String, TypeDefinition> = HashMap::new();
        let mut implementations: Vec<(String, String)> = Vec::new();

        for definition in &document.definitions {
            match definition {
                Definition::SchemaDefinition(schema) => {
                    root_types = [
                        schema.query.clone(),
                        schema.mutation.clone(),
                        schema.subscription.clone(),
                    ];
                    for transport in TransportDirective::extract_all(&schema.directives, "schema")?
                    {
                        subgraphs.insert(
                            transport.subgraph.clone(),
                            SubgraphDefinition {
                                name: transport.subgraph,
                                location: Some(transport.location),
                            },
                        );
                    }
                }
                Definition::TypeDefinition(type_definition) => {
                    let converted = convert_type(type_definition)?;
                    if let ParserTypeDefinition::Object(object) = type_definition {
                        for interface in &object.implements_interfaces {
                            implementations.push((interface.clone(), object.name.clone()));
                        }
                    }
                    types.insert(converted.name.clone(), converted);
                }
                _ => {}
            }
        }

        for (interface, object) in implementations {
            if let Some(interface) = types.get_mut(&interface) {
                interface.possible_types.insert(object);
            }
        }

        let [query, mutation, subscription] = root_types;
        let query_type = resolve_root_type(&types, query, "Query")?
            .ok_or(SchemaError::MissingQueryType)?;
        let mutation_type = resolve_root_type(&types, mutation, "Mutation")?;
        let subscription_type = resolve_root_type(&types, subscription, "Subscription")?;

        register_subgraphs(&types, &mut subgraphs)?;

        let schema = Self {
            query_type,
            mutation_type,
            subscription_type,
            types,
            subgraphs,
        };
        schema.validate_field_sets()?;

        debug!(
            types = schema.types.len(),
            subgraphs = schema.subgraphs.len(),
            "fused schema loaded"
        );

        Ok(schema)
    }

    pub fn root_type(&self, kind: OperationKind) -> Option<&str> {
        match kind {
            OperationKind::Query => Some(&self.query_type),
            OperationKind::Mutation => self.mutation_type.as_deref(),
            OperationKind::Subscription => self.subscription_type.as_deref(),
        }
    }

    pub fn type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDefinition> {
        self.types.get(type_name)?.fields.get(field_name)
    }

    pub fn is_composite(&self, type_name: &str) -> bool {
        self.types
            .get(type_name)
            .is_some_and(TypeDefinition::is_composite)
    }

    pub fn is_abstract(&self, type_name: &str) -> bool {
        self.types
            .get(type_name)
            .is_some_and(TypeDefinition::is_abstract)
    }

    /// Whether an object of type `concrete` matches a fragment on `condition`.
    pub fn type_satisfies(&self, concrete: &str, condition: &str) -> bool {
        concrete == condition
            || self
                .types
                .get(condition)
                .is_some_and(|t| t.possible_types.contains(concrete))
    }

    pub fn subgraphs(&self) -> impl Iterator<Item = &SubgraphDefinition> {
        self.subgraphs.values()
    }

    /// Declared `@transport` locations by subgraph name.
    pub fn subgraph_endpoints(&self) -> HashMap<String, String> {
        self.subgraphs
            .values()
            .filter_map(|s| Some((s.name.clone(), s.location.clone()?)))
            .collect()
    }

    fn validate_field_sets(&self) -> Result<(), SchemaError> {
        for type_definition in self.types.values() {
            for key in type_definition.keys.values() {
                self.validate_field_set(&type_definition.name, key)?;
            }
            for field in type_definition.fields.values() {
                for requires in field.sources.values().filter_map(|s| s.requires.as_ref()) {
                    self.validate_field_set(&type_definition.name, requires)?;
                }
            }
        }

        Ok(())
    }

    fn validate_field_set(&self, type_name: &str, set: &SelectionSet) -> Result<(), SchemaError> {
        for item in &set.items {
            match item {
                SelectionItem::Field(field) if field.name == TYPENAME_FIELD => {}
                SelectionItem::Field(field) => {
                    let definition = self.field(type_name, &field.name).ok_or_else(|| {
                        SchemaError::InvalidFieldSet {
                            type_name: type_name.to_string(),
                            fields: set.to_string(),
                            reason: format!("field \"{}\" does not exist", field.name),
                        }
                    })?;
                    self.validate_field_set(definition.output_type.named_type(), &field.selections)?;
                }
                SelectionItem::InlineFragment(fragment) => {
                    self.validate_field_set(&fragment.type_condition, &fragment.selections)?;
                }
            }
        }

        Ok(())
    }
}

fn resolve_root_type(
    types: &HashMap<String, TypeDefinition>,
    declared: Option<String>,
    default_name: &str,
) -> Result<Option<String>, SchemaError> {
    match declared {
        Some(name) if types.contains_key(&name) => Ok(Some(name)),
        Some(name) => Err(SchemaError::RootTypeNotFound(name)),
        None if types.contains_key(default_name) => Ok(Some(default_name.to_string())),
        None => Ok(None),
    }
}

/// Adds every subgraph referenced by a directive. When `@transport` is used at
/// all, referencing an undeclared subgraph is an error.
fn register_subgraphs(
    types: &HashMap<String, TypeDefinition>,
    subgraphs: &mut IndexMap<String, SubgraphDefinition>,
) -> Result<(), SchemaError> {
    let strict = !subgraphs.is_empty();

    let mut type_names: Vec<&String> = types.keys().collect();
    type_names.sort();

    for type_name in type_names {
        let type_definition = &types[type_name];
        let referenced = type_definition
            .keys
            .keys()
            .map(|s| (s, type_name.clone()))
            .chain(type_definition.fields.values().flat_map(|field| {
                field
                    .sources
                    .keys()
                    .map(move |s| (s, format!("{}.{}", type_name, field.name)))
            }));

        for (subgraph, location) in referenced {
            if subgraphs.contains_key(subgraph) {
                continue;
            }
            if strict {
                return Err(SchemaError::UnknownSubgraph {
                    subgraph: subgraph.clone(),
                    location,
                });
            }
            subgraphs.insert(
                subgraph.clone(),
                SubgraphDefinition {
                    name: subgraph.clone(),
                    location: None,
                },
            );
        }
    }

    Ok(())
}

fn convert_type(definition: &ParserTypeDefinition<'_, String>) -> Result<TypeDefinition, SchemaError> {
    let (name, kind) = match definition {
        ParserTypeDefinition::Object(t) => (&t.name, TypeKind::Object),
        ParserTypeDefinition::Interface(t) => (&t.name, TypeKind::Interface),
        ParserTypeDefinition::Union(t) => (&t.name, TypeKind::Union),
        ParserTypeDefinition::Scalar(t) => (&t.name, TypeKind::Scalar),
        ParserTypeDefinition::Enum(t) => (&t.name, TypeKind::Enum),
        ParserTypeDefinition::InputObject(t) => (&t.name, TypeKind::InputObject),
    };

    let mut converted = TypeDefinition {
        name: name.clone(),
        kind,
        fields: IndexMap::new(),
        keys: IndexMap::new(),
        possible_types: BTreeSet::new(),
    };

    let (directives, fields): (&[Directive<'_, String>], &[ParserField<'_, String>]) =
        match definition {
            ParserTypeDefinition::Object(t) => (t.directives.as_slice(), t.fields.as_slice()),
            ParserTypeDefinition::Interface(t) => (t.directives.as_slice(), t.fields.as_slice()),
            ParserTypeDefinition::Union(t) => {
                converted.possible_types = t.types.iter().cloned().collect();
                return Ok(converted);
            }
            _ => return Ok(converted),
        };

    let type_sources: Vec<String> = SourceDirective::extract_all(directives, name)?
        .into_iter()
        .map(|d| d.subgraph)
        .collect();

    for key in KeyDirective::extract_all(directives, name)? {
        let key_fields = parse_field_set(name, &key.fields)?;
        converted.keys.insert(key.subgraph, key_fields);
    }

    for field in fields {
        let field_definition = convert_field(name, field, &type_sources)?;
        converted
            .fields
            .insert(field_definition.name.clone(), field_definition);
    }

    Ok(converted)
}

fn convert_field(
    type_name: &str,
    field: &ParserField<'_, String>,
    type_sources: &[String],
) -> Result<FieldDefinition, SchemaError> {
    let location = format!("{}.{}", type_name, field.name);

    let mut subgraphs: Vec<String> = SourceDirective::extract_all(&field.directives, &location)?
        .into_iter()
        .map(|d| d.subgraph)
        .collect();
    if subgraphs.is_empty() {
        subgraphs = type_sources.to_vec();
    }

    let removed: Vec<String> = RemoveDirective::extract_all(&field.directives, &location)?
        .into_iter()
        .map(|d| d.subgraph)
        .collect();
    let renames: HashMap<String, String> =
        RenameDirective::extract_all(&field.directives, &location)?
            .into_iter()
            .map(|d| (d.subgraph, d.to))
            .collect();
    let mut requires: HashMap<String, SelectionSet> = HashMap::new();
    for directive in RequiresDirective::extract_all(&field.directives, &location)? {
        requires.insert(
            directive.subgraph,
            parse_field_set(type_name, &directive.fields)?,
        );
    }

    let mut sources = IndexMap::new();
    for subgraph in subgraphs {
        if removed.contains(&subgraph) || sources.contains_key(&subgraph) {
            continue;
        }
        sources.insert(
            subgraph.clone(),
            FieldSource {
                native_name: renames
                    .get(&subgraph)
                    .cloned()
                    .unwrap_or_else(|| field.name.clone()),
                requires: requires.remove(&subgraph),
                subgraph,
            },
        );
    }

    let mut arguments = IndexMap::new();
    for argument in &field.arguments {
        let argument_location = format!("{}({}:)", location, argument.name);
        let native_names = IsDirective::extract_all(&argument.directives, &argument_location)?
            .into_iter()
            .map(|d| (d.subgraph, d.name))
            .collect();
        arguments.insert(
            argument.name.clone(),
            ArgumentDefinition {
                name: argument.name.clone(),
                value_type: (&argument.value_type).into(),
                default_value: argument.default_value.as_ref().map(Value::from),
                native_names,
            },
        );
    }

    let semantic_non_null_levels =
        SemanticNonNullDirective::extract_all(&field.directives, &location)?
            .into_iter()
            .next()
            .map(|d| d.levels)
            .unwrap_or_default();

    Ok(FieldDefinition {
        name: field.name.clone(),
        output_type: (&field.field_type).into(),
        arguments,
        sources,
        semantic_non_null_levels,
    })
}
