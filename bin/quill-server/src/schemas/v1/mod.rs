pub mod emotion;
pub mod images;
pub mod text;
pub mod tools;
