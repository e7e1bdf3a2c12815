pub mod env;
pub mod tasks;

pub use env::Env;
