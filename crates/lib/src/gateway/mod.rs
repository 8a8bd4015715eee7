//! Gateway: HTTP listener for the LINE webhook.
//!
//! `GET /` answers a static liveness string. `POST /callback` (configurable) verifies the
//! signature, acknowledges, and hands each event to its own dispatch task.

mod server;

pub use server::{router, run_gateway, GatewayState, HEALTH_TEXT};
