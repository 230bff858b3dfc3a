#![allow(missing_docs)]

//! Observability: Prometheus metrics.

pub mod metrics;
