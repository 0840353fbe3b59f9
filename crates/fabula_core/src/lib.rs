//! Core conversation types for Fabula.
//!
//! This crate provides the request and response shapes exchanged with a
//! text-generation backend. It knows nothing about stories or sessions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod message;
mod request;
mod role;

pub use message::Message;
pub use request::{GenerateRequest, GenerateRequestBuilder, GenerateResponse};
pub use role::Role;
