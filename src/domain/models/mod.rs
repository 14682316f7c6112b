mod backend;
mod catalog;
mod completion;
mod error;
mod fragment;
mod host;
mod message;
mod secrets;

pub use backend::*;
pub use catalog::*;
pub use completion::*;
pub use error::*;
pub use fragment::*;
pub use host::*;
pub use message::*;
pub use secrets::*;
