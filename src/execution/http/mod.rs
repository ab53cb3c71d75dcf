//! HTTP layer: transport abstraction, the reqwest transport and default headers.

pub mod headers;
pub mod reqwest_transport;
pub mod transport;

pub use reqwest_transport::ReqwestTransport;
pub use transport::{ByteStream, RawResponse, StreamingResponse, Transport};
