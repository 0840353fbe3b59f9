//! Session repositories for Fabula.
//!
//! Two [`SessionRepository`](fabula_interface::SessionRepository)
//! implementations ship here:
//!
//! - [`InMemorySessionRepository`] keeps everything in a map; useful for
//!   tests and throwaway sessions.
//! - [`FileSessionRepository`] writes JSON documents, one directory per
//!   session, so sessions survive restarts.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod file;
mod memory;

pub use file::FileSessionRepository;
pub use memory::InMemorySessionRepository;
