pub mod actions;
pub mod compiler;
pub mod driver;
pub mod dsl;
pub mod error;
pub mod extract;
pub mod runtime;
