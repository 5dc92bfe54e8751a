use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::{arguments::ArgumentsMap, condition::Condition, selection_item::SelectionItem};

pub const TYPENAME_FIELD: &str = "__typename";

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct SelectionSet {
    pub items: Vec<SelectionItem>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FieldSelection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "ArgumentsMap::is_empty")]
    pub arguments: ArgumentsMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "SelectionSet::is_empty")]
    pub selections: SelectionSet,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct InlineFragmentSelection {
    pub type_condition: String,
    pub selections: SelectionSet,
}

/// One step of a relative position inside a selection tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SelectionStep {
    /// Descend into the field with this response key.
    Field(String),
    /// Descend into the inline fragment with this type condition.
    Fragment(String),
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("Fields with response key \"{response_key}\" conflict: \"{existing}\" and \"{incoming}\"")]
pub struct SelectionConflict {
    pub response_key: String,
    pub existing: String,
    pub incoming: String,
}

impl FieldSelection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: ArgumentsMap::default(),
            condition: None,
            selections: SelectionSet::default(),
        }
    }

    pub fn typename() -> Self {
        Self::new(TYPENAME_FIELD)
    }

    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_typename(&self) -> bool {
        self.name == TYPENAME_FIELD
    }

    /// The same field without its sub-selections.
    pub fn shell(&self) -> Self {
        Self {
            name: self.name.clone(),
            alias: self.alias.clone(),
            arguments: self.arguments.clone(),
            condition: self.condition.clone(),
            selections: SelectionSet::default(),
        }
    }

    fn signature(&self) -> String {
        if self.arguments.is_empty() {
            self.name.clone()
        } else {
            format!("{}({})", self.name, self.arguments)
        }
    }

    /// Merges another occurrence of the same response key into this one.
    ///
    /// When the occurrences are guarded by different conditions, each
    /// occurrence's condition is pushed into its own children first, so that
    /// the children of an excluded occurrence stay excluded.
    pub fn merge(&mut self, other: FieldSelection) -> Result<(), SelectionConflict> {
        if self.name != other.name || self.arguments != other.arguments {
            return Err(SelectionConflict {
                response_key: self.response_key().to_string(),
                existing: self.signature(),
                incoming: other.signature(),
            });
        }

        if self.condition == other.condition {
            return self.selections.merge(other.selections);
        }

        let mut incoming = other.selections;
        incoming.and_condition(other.condition.as_ref());
        self.selections.and_condition(self.condition.as_ref());
        self.condition = Condition::or(self.condition.as_ref(), other.condition.as_ref());
        self.selections.merge(incoming)
    }
}

impl InlineFragmentSelection {
    pub fn new(type_condition: impl Into<String>) -> Self {
        Self {
            type_condition: type_condition.into(),
            selections: SelectionSet::default(),
        }
    }
}

impl SelectionSet {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add_item(&mut self, item: impl Into<SelectionItem>) -> Result<(), SelectionConflict> {
        match item.into() {
            SelectionItem::Field(field) => match self.field_mut(field.response_key()) {
                Some(existing) => existing.merge(field),
                None => {
                    self.items.push(SelectionItem::Field(field));
                    Ok(())
                }
            },
            SelectionItem::InlineFragment(fragment) => {
                match self.fragment_mut(&fragment.type_condition) {
                    Some(existing) => existing.selections.merge(fragment.selections),
                    None => {
                        self.items.push(SelectionItem::InlineFragment(fragment));
                        Ok(())
                    }
                }
            }
        }
    }

    pub fn merge(&mut self, other: SelectionSet) -> Result<(), SelectionConflict> {
        for item in other.items {
            self.add_item(item)?;
        }

        Ok(())
    }

    /// ANDs `condition` onto every field reachable without crossing another field.
    pub fn and_condition(&mut self, condition: Option<&Condition>) {
        if condition.is_none() {
            return;
        }

        for item in self.items.iter_mut() {
            match item {
                SelectionItem::Field(field) => {
                    field.condition = Condition::and(field.condition.as_ref(), condition);
                }
                SelectionItem::InlineFragment(fragment) => {
                    fragment.selections.and_condition(condition)
                }
            }
        }
    }

    pub fn field(&self, response_key: &str) -> Option<&FieldSelection> {
        self.items.iter().find_map(|item| match item {
            SelectionItem::Field(field) if field.response_key() == response_key => Some(field),
            _ => None,
        })
    }

    pub fn field_mut(&mut self, response_key: &str) -> Option<&mut FieldSelection> {
        self.items.iter_mut().find_map(|item| match item {
            SelectionItem::Field(field) if field.response_key() == response_key => Some(field),
            _ => None,
        })
    }

    fn fragment_mut(&mut self, type_condition: &str) -> Option<&mut InlineFragmentSelection> {
        self.items.iter_mut().find_map(|item| match item {
            SelectionItem::InlineFragment(fragment) if fragment.type_condition == type_condition => {
                Some(fragment)
            }
            _ => None,
        })
    }

    /// Walks `steps` from this selection set, creating missing inline
    /// fragments on the way. Field steps must already exist.
    pub fn ensure_path_mut(&mut self, steps: &[SelectionStep]) -> Option<&mut SelectionSet> {
        let mut current = self;
        for step in steps {
            current = match step {
                SelectionStep::Field(key) => &mut current.field_mut(key)?.selections,
                SelectionStep::Fragment(type_condition) => {
                    if current.fragment_mut(type_condition).is_none() {
                        current
                            .items
                            .push(InlineFragmentSelection::new(type_condition.clone()).into());
                    }
                    &mut current.fragment_mut(type_condition)?.selections
                }
            };
        }

        Some(current)
    }

    /// Fields at the top of this selection set, looking through inline fragments.
    pub fn top_level_fields(&self) -> Vec<&FieldSelection> {
        let mut fields = Vec::new();
        for item in &self.items {
            match item {
                SelectionItem::Field(field) => fields.push(field),
                SelectionItem::InlineFragment(fragment) => {
                    fields.extend(fragment.selections.top_level_fields())
                }
            }
        }
        fields
    }

    /// Top-level response keys, each with the condition under which it is
    /// included. A key selected more than once is included if any occurrence is.
    pub fn response_keys(&self) -> Vec<(String, Option<Condition>)> {
        let mut keys: Vec<(String, Option<Condition>)> = Vec::new();
        for field in self.top_level_fields() {
            match keys.iter_mut().find(|(key, _)| key == field.response_key()) {
                Some((_, condition)) => {
                    *condition = Condition::or(condition.as_ref(), field.condition.as_ref())
                }
                None => keys.push((field.response_key().to_string(), field.condition.clone())),
            }
        }
        keys
    }

    /// The condition under which anything in this selection set is included.
    pub fn top_level_condition(&self) -> Option<Condition> {
        let fields = self.top_level_fields();
        let (first, rest) = fields.split_first()?;
        let mut condition = first.condition.clone();
        for field in rest {
            condition = Condition::or(condition.as_ref(), field.condition.as_ref());
            if condition.is_none() {
                return None;
            }
        }
        condition
    }
}

impl Display for SelectionSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", item)?;
        }
        f.write_str("}")
    }
}

impl Display for FieldSelection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(alias) = &self.alias {
            write!(f, "{}:", alias)?;
        }
        f.write_str(&self.name)?;
        if !self.arguments.is_empty() {
            write!(f, "({})", self.arguments)?;
        }
        if let Some(condition) = &self.condition {
            match condition.as_directives() {
                Some((include, skip)) => {
                    if let Some(variable) = include {
                        write!(f, "@include(if:${})", variable)?;
                    }
                    if let Some(variable) = skip {
                        write!(f, "@skip(if:${})", variable)?;
                    }
                }
                None => write!(f, "@when(\"{}\")", condition)?,
            }
        }
        if !self.selections.is_empty() {
            write!(f, "{}", self.selections)?;
        }
        Ok(())
    }
}

impl Display for InlineFragmentSelection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "...on {}{}", self.type_condition, self.selections)
    }
}
