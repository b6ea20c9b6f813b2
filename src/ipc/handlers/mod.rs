pub mod assets;
pub mod auth;
pub mod builder;
pub mod companies;
pub mod core;
pub mod courses;
pub mod enrollments;
pub mod learning;
pub mod reports;
