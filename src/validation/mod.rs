pub mod request;

pub use request::{GenerationRequest, RequestValidator};
