pub mod project;
pub mod system;
