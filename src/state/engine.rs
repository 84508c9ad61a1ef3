//! SubscriptionEngine - reference-counted subscriptions and value cache
//!
//! Owns the byte reassembly state of one console connection, the table of
//! subscribed parameter paths, the last known value of each, and the
//! consumer bindings. Inbound bytes only reach the cache for paths somebody
//! is bound to; a value is published only when it actually changes.
//!
//! Single-threaded: every operation runs to completion and the engine is
//! driven through `&mut self`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::types::{ConsumerId, EngineEvent, ParamValue, ParameterPath, VariableDefinition};
use super::variables::{build_definitions, name_variable_id, variable_id};
use crate::format::format_value;
use crate::framing::FrameExtractor;
use crate::interpret::interpret;
use crate::protocol::{ChannelAddr, Parameter};
use crate::requests::ConsoleRequester;

type ListenerFn = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Engine settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Zero-based MIDI channel the console's address layout starts at
    pub base_channel: u8,
}

/// Subscription and cache engine for one console connection
pub struct SubscriptionEngine {
    options: EngineOptions,
    extractor: FrameExtractor,
    requester: Arc<dyn ConsoleRequester>,
    /// Usage count per path; present iff count > 0
    subscriptions: HashMap<ParameterPath, usize>,
    /// Last known value per subscribed path
    cache: HashMap<ParameterPath, ParamValue>,
    /// Reverse map: which path each consumer is bound to
    bindings: HashMap<ConsumerId, ParameterPath>,
    /// Channels whose name has been requested
    name_requests: HashSet<ChannelAddr>,
    /// Names received for requested channels
    names: HashMap<ChannelAddr, String>,
    variables: Vec<VariableDefinition>,
    listeners: Vec<ListenerFn>,
}

impl SubscriptionEngine {
    pub fn new(options: EngineOptions, requester: Arc<dyn ConsoleRequester>) -> Self {
        Self {
            options,
            extractor: FrameExtractor::new(),
            requester,
            subscriptions: HashMap::new(),
            cache: HashMap::new(),
            bindings: HashMap::new(),
            name_requests: HashSet::new(),
            names: HashMap::new(),
            variables: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Register a listener for engine events
    ///
    /// Returns the listener index.
    pub fn subscribe<F>(&mut self, listener: F) -> usize
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self.listeners.len() - 1
    }

    /// Bind a consumer to a path
    ///
    /// Rebinding to the same path is a no-op; binding to another path
    /// releases the previous one first. The first binding of a path requests
    /// the channel name (once per channel) but never a value.
    pub fn bind(&mut self, consumer: &str, path: ParameterPath) {
        if let Some(bound) = self.bindings.get(consumer) {
            if *bound == path {
                trace!("Consumer {} already bound to {}", consumer, path);
                return;
            }
            self.unbind(consumer, None);
        }

        self.bindings.insert(consumer.to_string(), path);

        if let Some(usage) = self.subscriptions.get_mut(&path) {
            *usage += 1;
            debug!("Subscription {} usage -> {}", path, usage);
            return;
        }

        if self.name_requests.insert(path.channel) {
            debug!("Requesting name of {}", path.channel);
            self.requester.request_channel_name(&path.channel);
        }

        self.subscriptions.insert(path, 1);
        debug!("Subscribed {} (consumer {})", path, consumer);
        self.refresh_variables();
    }

    /// Release a consumer's binding
    ///
    /// Without `path` the consumer's current binding is used. The last
    /// release of a path drops its subscription and cached value.
    pub fn unbind(&mut self, consumer: &str, path: Option<ParameterPath>) {
        let Some(bound) = self.bindings.get(consumer).copied() else {
            trace!("Consumer {} has no binding", consumer);
            return;
        };

        if let Some(path) = path {
            if path != bound {
                debug!(
                    "Consumer {} is bound to {}, not {}; ignoring unbind",
                    consumer, bound, path
                );
                return;
            }
        }

        self.bindings.remove(consumer);
        self.release(bound);
    }

    fn release(&mut self, path: ParameterPath) {
        match self.usage(&path) {
            0 => warn!("Released {} without a subscription", path),
            1 => {
                self.subscriptions.remove(&path);
                self.cache.remove(&path);
                debug!("Unsubscribed {}", path);
                self.refresh_variables();
            }
            usage => {
                self.subscriptions.insert(path, usage - 1);
                debug!("Subscription {} usage -> {}", path, usage - 1);
            }
        }
    }

    /// Last known raw value of a path
    pub fn read(&self, path: &ParameterPath) -> Option<ParamValue> {
        self.cache.get(path).cloned()
    }

    /// Last known value of a path, formatted for display
    pub fn display(&self, path: &ParameterPath) -> Option<String> {
        self.cache
            .get(path)
            .map(|value| format_value(path.parameter, value))
    }

    /// Feed bytes received from the console
    ///
    /// Returns the number of cached values that changed.
    pub fn ingest(&mut self, bytes: &[u8]) -> usize {
        let frames = self.extractor.feed(bytes);

        let mut changed = 0;
        for frame in frames {
            let event = interpret(&frame, self.options.base_channel);
            let (Some(path), Some(value)) = (event.path(), event.value) else {
                trace!("Unmappable {:?} event from {:?}", event.kind, frame);
                continue;
            };
            if self.apply(path, value) {
                changed += 1;
            }
        }
        changed
    }

    /// Push a value known from an outbound command, without waiting for the
    /// console echo. Ignored unless the path is subscribed.
    pub fn external_update(&mut self, path: ParameterPath, value: ParamValue) -> bool {
        if !self.subscriptions.contains_key(&path) {
            trace!("External update for unsubscribed {}, ignoring", path);
            return false;
        }
        self.apply(path, value)
    }

    fn apply(&mut self, path: ParameterPath, value: ParamValue) -> bool {
        if path.parameter == Parameter::Name {
            if let ParamValue::Text(name) = &value {
                self.update_channel_name(path.channel, name);
            }
        }

        if !self.subscriptions.contains_key(&path) {
            trace!("No subscription for {}, dropping", path);
            return false;
        }

        if self.cache.get(&path) == Some(&value) {
            return false;
        }

        let display_text = format_value(path.parameter, &value);
        debug!("{} -> {} ({})", path, value, display_text);
        self.cache.insert(path, value.clone());

        let mut consumers: Vec<ConsumerId> = self
            .bindings
            .iter()
            .filter(|(_, bound)| **bound == path)
            .map(|(consumer, _)| consumer.clone())
            .collect();
        consumers.sort();

        self.emit(&EngineEvent::ValueChanged {
            path,
            value,
            display: display_text,
            consumers,
        });
        true
    }

    fn update_channel_name(&mut self, channel: ChannelAddr, name: &str) {
        if !self.name_requests.contains(&channel) {
            return;
        }
        if self.names.get(&channel).map(String::as_str) == Some(name) {
            return;
        }

        self.names.insert(channel, name.to_string());
        if self.is_referenced(&channel) {
            debug!("Name of {} -> {:?}", channel, name);
            self.emit(&EngineEvent::ChannelNameChanged {
                channel,
                name: name.to_string(),
            });
        }
    }

    fn is_referenced(&self, channel: &ChannelAddr) -> bool {
        self.subscriptions.keys().any(|p| p.channel == *channel)
    }

    /// Name of a channel, while the channel has a live subscription
    pub fn channel_name(&self, channel: &ChannelAddr) -> Option<&str> {
        if !self.is_referenced(channel) {
            return None;
        }
        self.names.get(channel).map(String::as_str)
    }

    /// Ask the console for the current value of a subscribed path
    pub fn request_value(&self, path: &ParameterPath) {
        if self.subscriptions.contains_key(path) {
            self.requester.request_value(path);
        } else {
            debug!("Not requesting {}: no subscription", path);
        }
    }

    /// Re-request every subscribed value and referenced channel name,
    /// e.g. after reconnecting
    pub fn refresh(&self) {
        let mut paths: Vec<_> = self.subscriptions.keys().copied().collect();
        paths.sort();

        let mut channels: Vec<_> = paths.iter().map(|p| p.channel).collect();
        channels.dedup();

        for channel in &channels {
            if self.name_requests.contains(channel) {
                self.requester.request_channel_name(channel);
            }
        }
        for path in &paths {
            self.requester.request_value(path);
        }
    }

    /// Drop all subscriptions, cached values, names and reassembly state
    pub fn clear(&mut self) {
        debug!(
            "Clearing {} subscriptions, {} cached values",
            self.subscriptions.len(),
            self.cache.len()
        );
        self.subscriptions.clear();
        self.cache.clear();
        self.bindings.clear();
        self.name_requests.clear();
        self.names.clear();
        self.extractor.reset();
        self.refresh_variables();
    }

    fn refresh_variables(&mut self) {
        let variables = build_definitions(self.subscriptions.keys(), &self.name_requests);
        if variables != self.variables {
            self.variables = variables.clone();
            self.emit(&EngineEvent::VariablesChanged { variables });
        }
    }

    /// Active variable descriptors
    pub fn variables(&self) -> &[VariableDefinition] {
        &self.variables
    }

    /// Current display value of every active variable that has one
    pub fn variable_values(&self) -> BTreeMap<String, String> {
        let mut values: BTreeMap<String, String> = self
            .cache
            .iter()
            .map(|(path, value)| (variable_id(path), format_value(path.parameter, value)))
            .collect();

        for (channel, name) in &self.names {
            if self.is_referenced(channel) {
                values.insert(name_variable_id(channel), name.clone());
            }
        }
        values
    }

    /// Number of consumers bound to a path
    pub fn usage(&self, path: &ParameterPath) -> usize {
        self.subscriptions.get(path).copied().unwrap_or(0)
    }

    /// Path a consumer is bound to
    pub fn bound_path(&self, consumer: &str) -> Option<ParameterPath> {
        self.bindings.get(consumer).copied()
    }

    /// All subscribed paths, sorted
    pub fn subscribed_paths(&self) -> Vec<ParameterPath> {
        let mut paths: Vec<_> = self.subscriptions.keys().copied().collect();
        paths.sort();
        paths
    }

    /// [`bind`](Self::bind) with a path string; invalid paths are logged and ignored
    pub fn bind_key(&mut self, consumer: &str, key: &str) {
        if let Some(path) = parse_key(key) {
            self.bind(consumer, path);
        }
    }

    /// [`read`](Self::read) with a path string
    pub fn read_key(&self, key: &str) -> Option<ParamValue> {
        parse_key(key).and_then(|path| self.read(&path))
    }

    /// [`external_update`](Self::external_update) with a path string
    pub fn external_update_key(&mut self, key: &str, value: ParamValue) -> bool {
        match parse_key(key) {
            Some(path) => self.external_update(path, value),
            None => false,
        }
    }

    fn emit(&self, event: &EngineEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}

fn parse_key(key: &str) -> Option<ParameterPath> {
    match key.parse() {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Ignoring invalid parameter path {:?}: {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ChannelType, SYSEX_HEADER};
    use crate::requests::OutboundRequest;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct Harness {
        engine: SubscriptionEngine,
        requests: mpsc::UnboundedReceiver<OutboundRequest>,
        events: Arc<Mutex<Vec<EngineEvent>>>,
    }

    impl Harness {
        fn new() -> Self {
            let (tx, requests) = mpsc::unbounded_channel();
            let mut engine = SubscriptionEngine::new(EngineOptions::default(), Arc::new(tx));
            let events = Arc::new(Mutex::new(Vec::new()));
            let sink = events.clone();
            engine.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
            Self {
                engine,
                requests,
                events,
            }
        }

        fn drain_requests(&mut self) -> Vec<OutboundRequest> {
            let mut out = Vec::new();
            while let Ok(r) = self.requests.try_recv() {
                out.push(r);
            }
            out
        }

        fn value_events(&self) -> Vec<EngineEvent> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e, EngineEvent::ValueChanged { .. }))
                .cloned()
                .collect()
        }
    }

    fn path(key: &str) -> ParameterPath {
        key.parse().unwrap()
    }

    const FADER_100: [u8; 7] = [0xB0, 0x63, 0x00, 0x62, 0x17, 0x06, 0x64];

    fn name_reply(midi_channel: u8, number: u8, name: &str) -> Vec<u8> {
        let mut bytes = SYSEX_HEADER.to_vec();
        bytes.extend_from_slice(&[midi_channel, 0x02, number]);
        bytes.extend_from_slice(name.as_bytes());
        bytes.push(0xF7);
        bytes
    }

    #[test]
    fn test_mute_update_is_deduplicated() {
        let mut h = Harness::new();
        h.engine.bind("btn-1", path("input:0:mute"));

        assert_eq!(h.engine.ingest(&[0x90, 0x00, 0x7F]), 1);
        assert_eq!(
            h.engine.read(&path("input:0:mute")),
            Some(ParamValue::Bool(true))
        );
        assert_eq!(h.value_events().len(), 1);

        assert_eq!(h.engine.ingest(&[0x90, 0x00, 0x7F]), 0);
        assert_eq!(h.value_events().len(), 1);
    }

    #[test]
    fn test_fader_update_is_formatted() {
        let mut h = Harness::new();
        h.engine.bind("fader-1", path("input:0:fader"));
        h.engine.ingest(&FADER_100);

        assert_eq!(
            h.engine.read(&path("input:0:fader")),
            Some(ParamValue::Number(100))
        );
        assert_eq!(
            h.engine.display(&path("input:0:fader")).as_deref(),
            Some("-3.6")
        );

        let events = h.value_events();
        let EngineEvent::ValueChanged {
            display, consumers, ..
        } = &events[0]
        else {
            panic!("expected value event");
        };
        assert_eq!(display, "-3.6");
        assert_eq!(consumers, &vec!["fader-1".to_string()]);
        assert_eq!(
            h.engine.variable_values().get("input_1_fader").map(String::as_str),
            Some("-3.6")
        );
    }

    #[test]
    fn test_unsubscribed_events_leave_no_trace() {
        let mut h = Harness::new();
        assert_eq!(h.engine.ingest(&FADER_100), 0);
        assert_eq!(h.engine.read(&path("input:0:fader")), None);
        assert!(h.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_bind_unbind_evicts_cache() {
        let mut h = Harness::new();
        let p = path("input:0:fader");
        h.engine.bind("a", p);
        h.engine.ingest(&FADER_100);
        assert_eq!(h.engine.usage(&p), 1);

        h.engine.unbind("a", None);
        assert_eq!(h.engine.usage(&p), 0);
        assert_eq!(h.engine.read(&p), None);
        assert_eq!(h.engine.bound_path("a"), None);

        assert_eq!(h.engine.ingest(&[0xB0, 0x63, 0x00, 0x62, 0x17, 0x06, 0x10]), 0);
        assert_eq!(h.engine.read(&p), None);
    }

    #[test]
    fn test_shared_path_survives_partial_unbind() {
        let mut h = Harness::new();
        let p = path("input:0:fader");
        h.engine.bind("a", p);
        h.engine.bind("b", p);
        assert_eq!(h.engine.usage(&p), 2);
        h.engine.ingest(&FADER_100);

        h.engine.unbind("a", Some(p));
        assert_eq!(h.engine.usage(&p), 1);
        assert_eq!(h.engine.read(&p), Some(ParamValue::Number(100)));
        assert_eq!(h.engine.bound_path("b"), Some(p));

        h.engine.unbind("b", None);
        assert_eq!(h.engine.read(&p), None);
    }

    #[test]
    fn test_notification_lists_every_bound_consumer() {
        let mut h = Harness::new();
        let p = path("input:0:mute");
        h.engine.bind("b", p);
        h.engine.bind("a", p);
        h.engine.ingest(&[0x90, 0x00, 0x7F]);

        let events = h.value_events();
        assert_eq!(events.len(), 1);
        let EngineEvent::ValueChanged { consumers, .. } = &events[0] else {
            panic!("expected value event");
        };
        assert_eq!(consumers, &vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_rebind_is_idempotent_and_moves_between_paths() {
        let mut h = Harness::new();
        let mute = path("input:0:mute");
        let fader = path("input:0:fader");

        h.engine.bind("a", mute);
        h.engine.bind("a", mute);
        assert_eq!(h.engine.usage(&mute), 1);

        h.engine.bind("a", fader);
        assert_eq!(h.engine.usage(&mute), 0);
        assert_eq!(h.engine.usage(&fader), 1);
        assert_eq!(h.engine.bound_path("a"), Some(fader));
    }

    #[test]
    fn test_unbind_with_foreign_path_is_ignored() {
        let mut h = Harness::new();
        let mute = path("input:0:mute");
        h.engine.bind("a", mute);
        h.engine.unbind("a", Some(path("input:1:mute")));
        assert_eq!(h.engine.usage(&mute), 1);
        h.engine.unbind("nobody", None);
    }

    #[test]
    fn test_channel_name_requested_once_per_channel() {
        let mut h = Harness::new();
        h.engine.bind("a", path("input:4:mute"));
        h.engine.bind("b", path("input:4:fader"));
        h.engine.bind("c", path("input:5:fader"));

        assert_eq!(
            h.drain_requests(),
            vec![
                OutboundRequest::GetChannelName(ChannelAddr::new(ChannelType::Input, 4)),
                OutboundRequest::GetChannelName(ChannelAddr::new(ChannelType::Input, 5)),
            ]
        );

        h.engine.unbind("a", None);
        h.engine.unbind("b", None);
        h.engine.bind("a", path("input:4:mute"));
        assert!(h.drain_requests().is_empty());
    }

    #[test]
    fn test_channel_name_visible_only_while_referenced() {
        let mut h = Harness::new();
        let channel = ChannelAddr::new(ChannelType::Input, 4);
        h.engine.bind("a", path("input:4:mute"));
        h.engine.ingest(&name_reply(0x00, 0x04, "Kick"));

        assert_eq!(h.engine.channel_name(&channel), Some("Kick"));
        assert_eq!(
            h.engine.variable_values().get("input_5_name").map(String::as_str),
            Some("Kick")
        );
        assert!(h
            .engine
            .variables()
            .iter()
            .any(|v| v.variable_id == "input_5_name"));

        h.engine.unbind("a", None);
        assert_eq!(h.engine.channel_name(&channel), None);
        assert!(h.engine.variables().is_empty());
        assert!(h.engine.variable_values().is_empty());

        let before = h.events.lock().unwrap().len();
        h.engine.ingest(&name_reply(0x00, 0x04, "Snare"));
        assert_eq!(h.events.lock().unwrap().len(), before);
    }

    #[test]
    fn test_name_for_unrequested_channel_is_ignored() {
        let mut h = Harness::new();
        h.engine.bind("a", path("input:0:mute"));
        h.engine.ingest(&name_reply(0x00, 0x07, "Bass"));
        assert_eq!(
            h.engine.channel_name(&ChannelAddr::new(ChannelType::Input, 7)),
            None
        );
    }

    #[test]
    fn test_variables_recomputed_on_subscription_changes() {
        let mut h = Harness::new();
        h.engine.bind("a", path("dca:0:mute"));
        let ids: Vec<_> = h
            .engine
            .variables()
            .iter()
            .map(|v| v.variable_id.clone())
            .collect();
        assert_eq!(ids, vec!["dca_1_mute", "dca_1_name"]);

        let changes = h
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, EngineEvent::VariablesChanged { .. }))
            .count();
        assert_eq!(changes, 1);
    }

    #[test]
    fn test_external_update_requires_subscription() {
        let mut h = Harness::new();
        let p = path("main:0:mute");
        assert!(!h.engine.external_update(p, ParamValue::Bool(true)));
        assert_eq!(h.engine.read(&p), None);

        h.engine.bind("a", p);
        assert!(h.engine.external_update(p, ParamValue::Bool(true)));
        assert!(!h.engine.external_update(p, ParamValue::Bool(true)));
        assert_eq!(h.engine.read(&p), Some(ParamValue::Bool(true)));
        assert_eq!(h.value_events().len(), 1);
    }

    #[test]
    fn test_request_value_only_for_subscribed_paths() {
        let mut h = Harness::new();
        let p = path("input:0:fader");
        h.engine.request_value(&p);
        assert!(h.drain_requests().is_empty());

        h.engine.bind("a", p);
        h.drain_requests();
        h.engine.request_value(&p);
        assert_eq!(h.drain_requests(), vec![OutboundRequest::GetValue(p)]);
    }

    #[test]
    fn test_refresh_requests_names_and_values() {
        let mut h = Harness::new();
        h.engine.bind("a", path("input:0:fader"));
        h.engine.bind("b", path("input:0:mute"));
        h.drain_requests();

        h.engine.refresh();
        let channel = ChannelAddr::new(ChannelType::Input, 0);
        assert_eq!(
            h.drain_requests(),
            vec![
                OutboundRequest::GetChannelName(channel),
                OutboundRequest::GetValue(path("input:0:mute")),
                OutboundRequest::GetValue(path("input:0:fader")),
            ]
        );
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut h = Harness::new();
        let p = path("input:0:fader");
        h.engine.bind("a", p);
        h.engine.ingest(&FADER_100);
        // half an NRPN sequence left in the reassembly buffer
        h.engine.ingest(&[0xB0, 0x63, 0x00]);

        h.engine.clear();
        assert_eq!(h.engine.read(&p), None);
        assert_eq!(h.engine.usage(&p), 0);
        assert!(h.engine.variables().is_empty());

        h.engine.bind("a", p);
        assert_eq!(
            h.drain_requests().last(),
            Some(&OutboundRequest::GetChannelName(p.channel))
        );
        assert_eq!(h.engine.ingest(&[0x62, 0x17, 0x06, 0x64]), 0);
        assert_eq!(h.engine.read(&p), None);
    }

    #[test]
    fn test_split_chunks_deliver_same_update() {
        let mut h = Harness::new();
        let p = path("input:0:fader");
        h.engine.bind("a", p);
        for byte in FADER_100 {
            h.engine.ingest(&[byte]);
        }
        assert_eq!(h.engine.read(&p), Some(ParamValue::Number(100)));
    }

    #[test]
    fn test_invalid_keys_are_no_ops() {
        let mut h = Harness::new();
        h.engine.bind_key("a", "input:zero:mute");
        h.engine.bind_key("b", "input:0");
        assert!(h.engine.subscribed_paths().is_empty());
        assert_eq!(h.engine.read_key("nonsense"), None);
        assert!(!h.engine.external_update_key("x:y:z", ParamValue::Bool(true)));

        h.engine.bind_key("c", "input:0:mute");
        assert_eq!(h.engine.subscribed_paths(), vec![path("input:0:mute")]);
    }
}
