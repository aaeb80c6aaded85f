pub mod pagination;
pub mod text;
