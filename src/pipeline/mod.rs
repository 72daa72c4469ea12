pub mod pipeline;
pub mod prompt;
pub mod state;
