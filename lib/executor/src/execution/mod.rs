pub mod options;
pub mod plan;
pub mod representations;
pub mod subscription;
