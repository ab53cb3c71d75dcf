//! Facades
//!
//! Four ways of surfacing the same call, all delegating to
//! [`ExecutionCore`](crate::execution::ExecutionCore):
//!
//! | Facade | Method | Completion |
//! |---|---|---|
//! | callback | [`ApiClient::perform`](crate::ApiClient::perform) | one closure, called once |
//! | async | [`ApiClient::perform_async`](crate::ApiClient::perform_async) | awaited `Result` |
//! | reactive | [`ApiClient::observe`](crate::ApiClient::observe), [`ApiClient::observe_stream`](crate::ApiClient::observe_stream) | [`ResultStream`] items |
//! | streaming callbacks | [`ApiClient::perform_streaming`](crate::ApiClient::perform_streaming) | per-frame closure + terminal closure |

mod asynchronous;
mod callback;
mod reactive;
mod streaming;

pub use reactive::ResultStream;
