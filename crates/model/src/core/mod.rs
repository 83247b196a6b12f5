pub mod data_type;
pub mod input;
pub mod shape;
pub mod utils;
pub mod value;
