//! Transport answering from a fixed route table.

use std::collections::BTreeMap;
use wp_core::WaypointResult;
use wp_router::OutboundRequest;
use wp_router::RequestId;
use wp_router::Transport;
use wp_visit::VisitResponse;

/// Holds dispatched requests until the scenario delivers them.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: BTreeMap<String, VisitResponse>,
    pending: Vec<OutboundRequest>,
    dispatched: usize,
}

impl ScriptedTransport {
    /// `routes` maps `METHOD /path` to the response served for it.
    pub fn new(routes: BTreeMap<String, VisitResponse>) -> Self {
        Self {
            routes,
            ..Self::default()
        }
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Drains pending requests in dispatch order, paired with their scripted answers.
    pub fn take_answers(&mut self) -> Vec<(RequestId, VisitResponse)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|request| {
                let key = format!("{} {}", request.method.as_str(), request.url.path());
                let response = self
                    .routes
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| VisitResponse::status(404));
                (request.id, response)
            })
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn dispatch(&mut self, request: OutboundRequest) -> WaypointResult<()> {
        tracing::info!(request = %request.id, method = %request.method, url = %request.url, "request sent");
        self.dispatched += 1;
        self.pending.push(request);
        Ok(())
    }

    fn abort(&mut self, id: RequestId) {
        tracing::info!(request = %id, "request aborted");
        self.pending.retain(|request| request.id != id);
    }
}
