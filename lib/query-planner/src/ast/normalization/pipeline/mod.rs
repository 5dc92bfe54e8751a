mod collect_selections;
mod conditions;
mod normalize_arguments;
mod select_operation;

pub(crate) use collect_selections::collect_selection_set;
pub(crate) use select_operation::select_operation;
