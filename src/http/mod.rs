//! HTTP API for controlling the recorder
//!
//! - GET  /health          - Health check
//! - GET  /status          - Status indicator, timer and control state
//! - POST /record/start    - Start a recording
//! - POST /record/stop     - Stop the current recording
//! - GET  /settings        - Selected settings and session state
//! - PUT  /settings        - Change settings (idle only)
//! - GET  /preview         - Last finished recording
//! - GET  /theme           - Stored UI theme
//! - POST /theme/toggle    - Flip and persist the UI theme

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
