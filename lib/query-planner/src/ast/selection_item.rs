use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::selection_set::{FieldSelection, InlineFragmentSelection};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind")]
pub enum SelectionItem {
    Field(FieldSelection),
    InlineFragment(InlineFragmentSelection),
}

impl SelectionItem {
    pub fn as_field(&self) -> Option<&FieldSelection> {
        match self {
            SelectionItem::Field(field) => Some(field),
            SelectionItem::InlineFragment(_) => None,
        }
    }
}

impl From<FieldSelection> for SelectionItem {
    fn from(value: FieldSelection) -> Self {
        SelectionItem::Field(value)
    }
}

impl From<InlineFragmentSelection> for SelectionItem {
    fn from(value: InlineFragmentSelection) -> Self {
        SelectionItem::InlineFragment(value)
    }
}

impl Display for SelectionItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SelectionItem::Field(field) => write!(f, "{}", field),
            SelectionItem::InlineFragment(fragment) => write!(f, "{}", fragment),
        }
    }
}
