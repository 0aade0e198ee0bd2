// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! JSON payload encoders, one per signal.
//!
//! Each encoder walks the resource → scope → item tree of its signal and produces a single
//! body for the whole batch. The shape of each body:
//!
//! ```text
//! traces:  {"traces": {"spans": <count>, "sample_names": [<up to 10 names>]}}
//! metrics: {"metrics": [{"timestamp": <ns>, "properties": {..}, "values": {<name>: <number>}}]}
//! logs:    {"logs": [{"timestamp": <ns>, "severity": "..", "body": .., "attrs": {..}, "resource": {..}}]}
//! ```

pub mod logs;
pub mod metrics;
pub mod traces;
pub mod value;

use crate::errors::EncodingError;
use crate::pdata::{Signal, TelemetryTree};
use bytes::Bytes;
use serde_json::Value;
use std::io::Write;
use zstd::stream::write::Encoder;

pub use logs::LogsEncoder;
pub use metrics::MetricsEncoder;
pub use traces::TracesEncoder;

/// Turns one signal batch into a JSON value tree.
pub trait PayloadEncoder: Send + Sync {
    type Item;

    fn signal(&self) -> Signal;

    fn to_value(&self, tree: &TelemetryTree<Self::Item>) -> Result<Value, EncodingError>;

    /// Serializes the batch into one body.
    fn encode(&self, tree: &TelemetryTree<Self::Item>) -> Result<EncodedPayload, EncodingError> {
        let value = self.to_value(tree)?;
        let body = serde_json::to_vec(&value)?;
        Ok(EncodedPayload {
            signal: self.signal(),
            body: Bytes::from(body),
            item_count: tree.item_count(),
            compressed: false,
        })
    }
}

/// A ready-to-send body for one batch.
#[derive(Clone, Debug)]
pub struct EncodedPayload {
    pub signal: Signal,
    pub body: Bytes,
    pub item_count: usize,
    /// Set when `body` holds zstd-compressed JSON.
    pub compressed: bool,
}

impl EncodedPayload {
    /// Compresses the body with zstd at `level`.
    pub fn compress(self, level: i32) -> Result<Self, EncodingError> {
        let mut encoder = Encoder::new(Vec::new(), level)?;
        encoder.write_all(&self.body)?;
        let compressed = encoder.finish()?;
        Ok(Self {
            body: Bytes::from(compressed),
            compressed: true,
            ..self
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdata::{InstrumentationScope, Resource, ResourceGroup, ScopeGroup, Span};

    #[test]
    fn test_encode_produces_one_body_per_batch() {
        let traces = TelemetryTree::new(vec![ResourceGroup {
            resource: Resource::default(),
            scope_groups: vec![ScopeGroup {
                scope: InstrumentationScope::default(),
                items: vec![Span::named("a"), Span::named("b")],
            }],
        }]);

        let payload = TracesEncoder.encode(&traces).expect("encode");
        assert_eq!(payload.signal, Signal::Traces);
        assert_eq!(payload.item_count, 2);
        assert!(!payload.compressed);

        let parsed: Value = serde_json::from_slice(&payload.body).expect("valid json");
        assert_eq!(parsed["traces"]["spans"], 2);
    }

    #[test]
    fn test_compress_round_trips() {
        let payload = TracesEncoder
            .encode(&TelemetryTree::default())
            .expect("encode");
        let original = payload.body.clone();

        let compressed = payload.compress(3).expect("compress");
        assert!(compressed.compressed);
        assert_ne!(compressed.body, original);

        let decompressed = zstd::stream::decode_all(&compressed.body[..]).expect("decompress");
        assert_eq!(decompressed, original.to_vec());
    }
}
