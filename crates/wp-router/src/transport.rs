//! Outbound navigation requests and the transport seam the host implements.

use std::collections::VecDeque;
use std::fmt;
use url::Url;
use wp_core::WaypointResult;
use wp_visit::Header;
use wp_visit::PendingVisit;
use wp_visit::TOP_FRAME;
use wp_visit::VisitBody;
use wp_visit::VisitMethod;
use wp_visit::headers::find_header;
use wp_visit::headers::upsert_header;
use wp_visit::target::without_fragment;

pub const WAYPOINT_HEADER: &str = "X-Waypoint";
pub const VERSION_HEADER: &str = "X-Waypoint-Version";
pub const PARTIAL_COMPONENT_HEADER: &str = "X-Waypoint-Partial-Component";
pub const PARTIAL_DATA_HEADER: &str = "X-Waypoint-Partial-Data";
pub const PARTIAL_EXCEPT_HEADER: &str = "X-Waypoint-Partial-Except";
pub const ERROR_BAG_HEADER: &str = "X-Waypoint-Error-Bag";
pub const RESET_HEADER: &str = "X-Waypoint-Reset";
pub const FRAME_HEADER: &str = "X-Waypoint-Frame";
pub const PURPOSE_HEADER: &str = "Purpose";

/// Router-assigned identity of one network operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request#{}", self.0)
    }
}

/// Request the host puts on the wire. The host answers with `Router::complete`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub id: RequestId,
    pub method: VisitMethod,
    pub url: Url,
    pub headers: Vec<Header>,
    pub body: VisitBody,
}

impl OutboundRequest {
    /// `component` is the current component of the visit's frame, sent with partial reloads.
    pub fn for_visit(
        id: RequestId,
        visit: &PendingVisit,
        component: Option<&str>,
        asset_version: Option<&str>,
    ) -> WaypointResult<Self> {
        let mut headers = vec![
            Header::new(WAYPOINT_HEADER, "true")?,
            Header::new("X-Requested-With", "XMLHttpRequest")?,
            Header::new("Accept", "text/html, application/xhtml+xml")?,
        ];

        if let Some(version) = asset_version {
            headers.push(Header::new(VERSION_HEADER, version)?);
        }

        if visit.is_partial() {
            if let Some(component) = component {
                headers.push(Header::new(PARTIAL_COMPONENT_HEADER, component)?);
            }
            if !visit.only.is_empty() {
                headers.push(Header::new(PARTIAL_DATA_HEADER, &visit.only.join(","))?);
            }
            if !visit.except.is_empty() {
                headers.push(Header::new(PARTIAL_EXCEPT_HEADER, &visit.except.join(","))?);
            }
        }

        if !visit.error_bag.is_empty() {
            headers.push(Header::new(ERROR_BAG_HEADER, &visit.error_bag)?);
        }

        if !visit.reset.is_empty() {
            headers.push(Header::new(RESET_HEADER, &visit.reset.join(","))?);
        }

        if visit.frame != TOP_FRAME {
            headers.push(Header::new(FRAME_HEADER, &visit.frame)?);
        }

        if visit.prefetch {
            headers.push(Header::new(PURPOSE_HEADER, "prefetch")?);
        }

        for (name, value) in &visit.headers {
            upsert_header(&mut headers, Header::new(name, value)?);
        }

        Ok(Self {
            id,
            method: visit.method,
            url: without_fragment(&visit.url),
            headers,
            body: visit.body.clone(),
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

pub trait Transport {
    /// Starts the request; the response arrives later through the router.
    fn dispatch(&mut self, request: OutboundRequest) -> WaypointResult<()>;
    /// Stops waiting for `id`. A late answer for it is ignored by the router.
    fn abort(&mut self, id: RequestId);
}

/// Transport that only records what the router asked of it.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    dispatched: Vec<OutboundRequest>,
    aborted: Vec<RequestId>,
    failures: VecDeque<wp_core::WaypointError>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `dispatch` fail with `error`.
    pub fn fail_next(&mut self, error: wp_core::WaypointError) {
        self.failures.push_back(error);
    }

    pub fn dispatched(&self) -> &[OutboundRequest] {
        &self.dispatched
    }

    pub fn last(&self) -> Option<&OutboundRequest> {
        self.dispatched.last()
    }

    pub fn aborted(&self) -> &[RequestId] {
        &self.aborted
    }
}

impl Transport for RecordingTransport {
    fn dispatch(&mut self, request: OutboundRequest) -> WaypointResult<()> {
        if let Some(error) = self.failures.pop_front() {
            return Err(error);
        }
        tracing::trace!(request = %request.id, url = %request.url, "request recorded");
        self.dispatched.push(request);
        Ok(())
    }

    fn abort(&mut self, id: RequestId) {
        self.aborted.push(id);
    }
}
