//! # evmcodec-engine
//!
//! Decodes typed values out of EVM storage, memory, calldata, the stack and
//! compiled constants.
//!
//! A decode is a [`Decoding`] session: it asks for the words it is missing
//! one [`DecoderRequest`](evmcodec_core::DecoderRequest) at a time, and the
//! caller answers from whatever backend it has. [`Decoding::decode_with`]
//! and [`Decoding::decode_async`] run that loop against a
//! [`DataSource`](evmcodec_core::DataSource) or
//! [`AsyncDataSource`](evmcodec_core::AsyncDataSource).
//!
//! ```ignore
//! let types = UserDefinedTypes::new();
//! let source = FixtureSource::from_file("fixtures/storage/token.json")?;
//! let balance = Decoding::new(
//!     Type::uint(256),
//!     DataPointer::storage_slot(Slot::new(U256::from(2))),
//!     DecodeContext::new(&types),
//! )
//! .decode_with(&source)?;
//! ```

pub mod allocate;
pub mod context;
mod decode;
mod read;
pub mod session;
pub mod source;
pub mod state;

pub use context::{ContractContext, DecodeContext};
pub use session::{Decoding, Progress};
pub use source::FixtureSource;
pub use state::EvmState;
