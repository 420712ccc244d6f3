//! Application services for bridge discovery, negotiation and lifecycle.

mod bridge;
mod candidates;
mod cleaner;
mod engine;
mod error;
mod management;
mod report;
mod validation;

pub use bridge::BridgeService;
pub use candidates::{ConsumerProfile, assemble_model, filter_interfaces};
pub use cleaner::BridgeCleaner;
pub use engine::{
    DiscoveredCandidate, DiscoveryRequest, DiscoveryResponse, NegotiationEngine,
    NegotiationResponse,
};
pub use error::{BrokerError, BrokerErrorKind, BrokerOperation, BrokerResult};
pub use management::BridgeManagementService;
pub use report::BridgeReportService;
pub use validation::{
    DiscoveryPayload, NegotiationPayload, NegotiationPlan, QueryPayload, ReportPayload,
    validate_bridge_ids, validate_candidates, validate_consumer, validate_discovery,
    validate_negotiation, validate_query, validate_report,
};
