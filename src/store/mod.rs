pub mod schema;
pub mod slots;
