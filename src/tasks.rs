// List the different tasks here
pub mod configs;
pub mod experiments;
