// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::encoder::PayloadEncoder;
use crate::errors::EncodingError;
use crate::pdata::{Signal, Span, Traces};
use serde_json::{json, Value};

/// Maximum number of span names sampled into a traces payload.
pub const MAX_SAMPLE_NAMES: usize = 10;

/// Summarises a traces batch: total span count plus the first few span names.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracesEncoder;

impl PayloadEncoder for TracesEncoder {
    type Item = Span;

    fn signal(&self) -> Signal {
        Signal::Traces
    }

    fn to_value(&self, traces: &Traces) -> Result<Value, EncodingError> {
        // `take` stops the walk once the cap is reached
        let sample_names: Vec<&str> = traces
            .items()
            .take(MAX_SAMPLE_NAMES)
            .map(|span| span.name.as_str())
            .collect();

        Ok(json!({
            "traces": {
                "spans": traces.item_count(),
                "sample_names": sample_names,
            }
        }))
    }
}
