//! Unit tests for the bridge module.
//!
//! Tests are organised by concept: the lifecycle state machine, the header
//! aggregate, query filtering, candidate filtering, payload validation and
//! the negotiation engine driven through in-memory adapters.

mod query_tests;
