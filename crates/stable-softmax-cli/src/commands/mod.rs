pub mod ops;
pub mod plan;
pub mod run;
pub mod validate;
