mod ai_service;
mod app_state;
mod code_extractor;
mod docs;
mod editor_context;
mod host_stream;
mod project_parser;
pub mod prompts;
mod quick_edit;
mod refactor;
mod review;
mod test_writer;
#[cfg(test)]
mod testing;

pub use ai_service::*;
pub use app_state::*;
pub use code_extractor::*;
pub use docs::*;
pub use editor_context::*;
pub use project_parser::*;
pub use quick_edit::*;
pub use refactor::*;
pub use review::*;
pub use test_writer::*;
