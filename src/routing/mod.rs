//! Routing module
//!
//! Provides method + path-pattern routing:
//! - Literal segments (`/ping`)
//! - Named parameters (`/record/:name`)
//! - Per-method or any-method routes

mod pattern;
mod router;

pub use pattern::Params;
pub use router::Router;
