use std::sync::Arc;
use std::time::Instant;

use toolrelay_mcp::ToolRegistry;

use crate::session::TransportRegistry;

/// Shared application state with injected dependencies.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<TransportRegistry>,
    pub tools: Arc<ToolRegistry>,
    pub started_at: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            sessions: Arc::new(TransportRegistry::new()),
            tools: Arc::new(tools),
            started_at: Instant::now(),
        }
    }
}
