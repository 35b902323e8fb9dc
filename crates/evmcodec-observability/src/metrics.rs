//! Decode metrics.
//!
//! Instruments follow OpenTelemetry conventions and are created from a
//! caller-supplied [`Meter`], so the exporter is the caller's choice.

use evmcodec_core::{DecodeObserver, Decoded, DecoderRequest, DecodingError};
use opentelemetry::{
    metrics::{Counter, Meter},
    KeyValue,
};

/// Counts what decode sessions do. Pass it as the context's observer.
#[derive(Clone)]
pub struct CodecMetrics {
    pub requests: Counter<u64>,
    pub error_leaves: Counter<u64>,
    pub decodes: Counter<u64>,
}

impl CodecMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests: meter
                .u64_counter("evmcodec.requests")
                .with_description("Read requests issued by suspended decodes")
                .init(),
            error_leaves: meter
                .u64_counter("evmcodec.error_leaves")
                .with_description("Error leaves in completed decode results")
                .init(),
            decodes: meter
                .u64_counter("evmcodec.decodes")
                .with_description("Completed decodes")
                .init(),
        }
    }

    pub fn record_request(&self, kind: &'static str) {
        self.requests.add(1, &[KeyValue::new("kind", kind)]);
    }

    pub fn record_error(&self, kind: &'static str) {
        self.error_leaves.add(1, &[KeyValue::new("kind", kind)]);
    }

    pub fn record_decode(&self, failed: bool) {
        self.decodes.add(1, &[KeyValue::new("failed", failed)]);
    }
}

impl std::fmt::Debug for CodecMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecMetrics").finish_non_exhaustive()
    }
}

impl DecodeObserver for CodecMetrics {
    fn on_request(&self, request: &DecoderRequest) {
        self.record_request(request.kind());
    }

    fn on_error(&self, error: &DecodingError) {
        self.record_error(error.kind());
    }

    fn on_complete(&self, result: &Decoded) {
        self.record_decode(result.is_error());
        for error in result.errors() {
            self.on_error(error);
        }
    }
}
