pub mod cancellation;
pub mod parsing;
pub mod pretty_display;
