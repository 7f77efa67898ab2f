//! Data Transfer Objects for the relay API.

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;
