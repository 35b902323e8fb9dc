//! Injectable decode observers.
//!
//! The engine reports what it does through a [`DecodeObserver`] passed in
//! the decode context, never through global state.

use tracing::{debug, warn};

use crate::error::DecodingError;
use crate::request::DecoderRequest;
use crate::value::Decoded;

/// Receives decode events. Every hook defaults to doing nothing.
pub trait DecodeObserver {
    /// A session suspended waiting for `request`.
    fn on_request(&self, _request: &DecoderRequest) {}

    /// An error leaf in a completed result.
    fn on_error(&self, _error: &DecodingError) {}

    /// A decode finished. The default reports each error leaf.
    fn on_complete(&self, result: &Decoded) {
        for error in result.errors() {
            self.on_error(error);
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DecodeObserver for NoopObserver {}

/// Forwards decode events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DecodeObserver for TracingObserver {
    fn on_request(&self, request: &DecoderRequest) {
        debug!(kind = request.kind(), %request, "decoder suspended");
    }

    fn on_error(&self, error: &DecodingError) {
        warn!(kind = error.kind(), %error, "decode error leaf");
    }

    fn on_complete(&self, result: &Decoded) {
        let errors = result.errors();
        debug!(errors = errors.len(), failed = result.is_error(), "decode complete");
        for error in errors {
            self.on_error(error);
        }
    }
}
