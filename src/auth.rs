//! Identifiers, redacted secrets, and the bearer token model.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{access::*, secret::*};
