pub mod expr;
pub mod policy;
pub mod rejected;
pub mod report;
