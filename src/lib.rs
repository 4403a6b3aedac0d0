//! Slope Orchestrator - sequential client for a remote actuarial modeling service
//!
//! This library provides:
//! - A uniform envelope for every remote call and a swappable HTTP transport
//! - Offset-cursor listing of table structures and data tables
//! - Two-phase file upload and the tables created from uploaded files
//! - Projection setup, execution and fixed-interval completion polling
//! - Report retrieval, directly or through a polled generation job
//! - The end-to-end valuation workflow tying these together

pub mod api;
pub mod config;
pub mod poll;
pub mod transport;
pub mod workflow;

// Re-export commonly used types
pub use api::{ApiClient, ReportError, ReportFormat, ReportRequest};
pub use config::{ConfigError, RunConfig};
pub use poll::{poll_until, Check, PollConfig, PollError};
pub use transport::{ApiRequest, BinaryEnvelope, Envelope, HttpTransport, Processed, Transport, TransportError};
pub use workflow::{Credentials, Step, Workflow, WorkflowError, WorkflowReport};
