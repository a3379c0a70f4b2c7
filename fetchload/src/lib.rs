pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    describe_failure, expand_path, load_options_from_matches, parse_header, parse_param,
};

// Re-export the pipeline entry points from fetchload-core
pub use fetchload_core::pipeline::{LoadOptions, execute_load, run};
