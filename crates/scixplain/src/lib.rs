pub mod communicator;
pub mod datasources;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod token_counter;
pub mod tool_router;
