//! tandem-services: the RPC methods Tandem serves and the client sessions
//! that call them.

pub mod channel;
pub mod client;
pub mod dispatch;
pub mod hello;
pub mod service;
pub mod streaming;

pub use client::{ClientSession, TransferReport};
pub use dispatch::ServiceDispatcher;
pub use hello::{say_hello, HelloService};
pub use service::StreamService;
pub use streaming::{ServerReport, StreamingService};
