//! tandem-core: chunk codec, wire format, stream transport, static keys,
//! and the completion coordinator. All other Tandem crates depend on this one.

pub mod chunk;
pub mod completion;
pub mod config;
pub mod crypto;
pub mod error;
pub mod transport;
pub mod wire;

pub use chunk::{Assembly, ChunkReader};
pub use completion::{Completion, CompletionError};
pub use crypto::{CryptoError, Keypair};
pub use error::{SessionError, TransportError};
pub use transport::{FrameSink, FrameSinkPtr, FrameSource, FrameSourcePtr, FrameStream};
