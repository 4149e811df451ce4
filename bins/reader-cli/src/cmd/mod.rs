pub mod read;
pub mod validate;
