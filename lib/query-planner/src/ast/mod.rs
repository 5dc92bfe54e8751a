pub mod arguments;
pub mod condition;
pub mod normalization;
pub mod operation;
pub mod response_path;
pub mod selection_item;
pub mod selection_set;
pub mod value;
