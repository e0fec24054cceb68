//! Observability: structured logging and dispatch metrics

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};
pub use metrics::{BackgroundMetrics, DispatchMetrics, MetricsSnapshot};

pub use logging::{agent_span, dispatch_span, health_span};
