pub mod field_set;
pub mod record;
