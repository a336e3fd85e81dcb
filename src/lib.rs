//! usagestat - usage statistics poller and reporter
//!
//! Periodically polls the usage counters exposed by the components of an
//! application-server container, accumulates them into named counters and
//! forwards the totals to a remote statistics collector.

pub mod cli;
pub mod config;
pub mod counters;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod poller;
pub mod reporter;
pub mod source;
pub mod telemetry;
