//! Outbound requests to the console
//!
//! The engine never writes to the transport itself. When it needs a value or
//! a channel name it hands a request to a [`ConsoleRequester`]; encoding and
//! sending the protocol message is the requester's job. Requests are
//! fire-and-forget: replies come back through the inbound byte stream.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::address;
use crate::protocol::ChannelAddr;
use crate::state::ParameterPath;

/// Request the engine wants sent to the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundRequest {
    /// Ask for the current value of a parameter
    GetValue(ParameterPath),
    /// Ask for a channel's name
    GetChannelName(ChannelAddr),
}

/// Collaborator that turns requests into console traffic
pub trait ConsoleRequester: Send + Sync {
    fn request(&self, request: OutboundRequest);

    fn request_value(&self, path: &ParameterPath) {
        self.request(OutboundRequest::GetValue(*path));
    }

    fn request_channel_name(&self, channel: &ChannelAddr) {
        self.request(OutboundRequest::GetChannelName(*channel));
    }
}

/// Queue requests for a sender task that owns the transport
impl ConsoleRequester for mpsc::UnboundedSender<OutboundRequest> {
    fn request(&self, request: OutboundRequest) {
        if self.send(request).is_err() {
            warn!("Request queue closed, dropping {:?}", request);
        }
    }
}

/// Requester that only logs, for passive monitoring and tests
#[derive(Debug, Default)]
pub struct LoggingRequester {
    request_count: AtomicU64,
}

impl LoggingRequester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests seen so far
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}

impl ConsoleRequester for LoggingRequester {
    fn request(&self, request: OutboundRequest) {
        let count = self.request_count.fetch_add(1, Ordering::Relaxed) + 1;

        let channel = match request {
            OutboundRequest::GetValue(path) => path.channel,
            OutboundRequest::GetChannelName(channel) => channel,
        };
        let wire = address::locate(channel)
            .map(|(offset, number)| format!("offset {} number {:#04X}", offset, number))
            .unwrap_or_else(|| "no wire address".to_string());

        info!("📤 Request #{}: {:?} ({})", count, request, wire);
        debug!(request = ?request, count, "LoggingRequester request");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ChannelType, Parameter};

    #[test]
    fn test_queue_requester_forwards_requests() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = ChannelAddr::new(ChannelType::Dca, 3);
        let path = ParameterPath::new(channel, Parameter::Mute);

        tx.request_value(&path);
        tx.request_channel_name(&channel);

        assert_eq!(rx.try_recv().unwrap(), OutboundRequest::GetValue(path));
        assert_eq!(
            rx.try_recv().unwrap(),
            OutboundRequest::GetChannelName(channel)
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_queue_requester_survives_closed_queue() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.request_channel_name(&ChannelAddr::new(ChannelType::Input, 0));
    }

    #[test]
    fn test_logging_requester_counts() {
        let requester = LoggingRequester::new();
        let channel = ChannelAddr::new(ChannelType::Main, 0);
        requester.request_channel_name(&channel);
        requester.request_value(&ParameterPath::new(channel, Parameter::Fader));
        assert_eq!(requester.request_count(), 2);
    }
}
