pub mod backends;
pub mod host;
pub mod secrets;
