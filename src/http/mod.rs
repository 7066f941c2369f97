//! HTTP layer module
//!
//! Request decoding, the response writer state machine and response builders.

pub mod body;
pub mod mime;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use request::Request;
pub use response::{
    build_404_response, build_500_response, ResponseBody, ResponseState, ResponseWriter,
};
