use super::topic::Topic;

/// Parsed acknowledgement for one outstanding request.
#[derive(Debug, Clone)]
pub struct AckResponse {
    /// Echo of the request's id.
    pub request_id: u64,

    /// Whether the service accepted the request.
    pub success: bool,

    /// For subscribe requests: the topics the service actually
    /// registered (may be a subset of what was requested).
    pub subscribed: Option<Vec<Topic>>,

    /// Optional server-side failure description.
    pub message: Option<String>,
}
