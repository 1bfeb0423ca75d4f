use std::collections::HashMap;

use crate::graph::backend::{AudioBackend, FilterShape, NodeId, Param, Waveform};
use crate::samples::loader::SampleBuffer;

/*
Scripted Backend
================

A backend that executes nothing and records everything: node construction,
routing, source lifetime, and every scheduled curve event. The clock is
advanced explicitly, so tests can play a note, jump the clock past an
envelope, and observe the exact state a real signal backend would have
reached.

Curve evaluation follows the contract in `backend`:

  - set_value_at     steps to the value at its time
  - ramp_to_value_at interpolates linearly from the previous event
  - set_target_at    approaches the target exponentially from the value at
                     its start time, until the next event takes over
  - cancel           drops events at or after the cancel time

Ended callbacks fire during `advance_to`/`advance`, once per source, when the
clock passes the source's scheduled stop or a buffer's natural end
(start + duration / rate). Nothing fires between explicit clock advances,
which keeps test interleavings deterministic.
*/

/// One recorded scheduling call on a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum CurveEvent {
    SetValue { value: f32, at: f64 },
    RampTo { value: f32, at: f64 },
    TargetAt { target: f32, at: f64, time_constant: f64 },
}

impl CurveEvent {
    fn at(&self) -> f64 {
        match self {
            CurveEvent::SetValue { at, .. }
            | CurveEvent::RampTo { at, .. }
            | CurveEvent::TargetAt { at, .. } => *at,
        }
    }
}

/// What a recorded node is.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Destination,
    Oscillator { waveform: Waveform },
    Filter { shape: FilterShape, resonance: f32 },
    Gain,
    Delay,
    BufferSource { duration: f64, rate: f64 },
}

/// Where an outgoing connection lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortTarget {
    Node(NodeId),
    Param(NodeId, Param),
}

struct MockNode {
    kind: NodeKind,
    created_at: f64,
    initial: HashMap<Param, f32>,
    events: HashMap<Param, Vec<CurveEvent>>,
    started_at: Option<f64>,
    stopped_at: Option<f64>,
    ended: bool,
    on_ended: Option<Box<dyn FnOnce()>>,
}

impl MockNode {
    fn new(kind: NodeKind, created_at: f64) -> Self {
        Self {
            kind,
            created_at,
            initial: HashMap::new(),
            events: HashMap::new(),
            started_at: None,
            stopped_at: None,
            ended: false,
            on_ended: None,
        }
    }

    /// Earliest time this source will stop producing output, if known.
    fn end_time(&self) -> Option<f64> {
        let started = self.started_at?;
        let natural = match self.kind {
            NodeKind::BufferSource { duration, rate } => {
                Some(started + duration / rate.max(f64::EPSILON))
            }
            _ => None,
        };
        match (self.stopped_at, natural) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        }
    }
}

/// Recording [`AudioBackend`] with an explicitly driven clock.
pub struct MockBackend {
    now: f64,
    nodes: Vec<MockNode>,
    edges: Vec<(NodeId, PortTarget)>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        let mut backend = Self {
            now: 0.0,
            nodes: Vec::new(),
            edges: Vec::new(),
        };
        backend.add_node(NodeKind::Destination);
        backend
    }

    fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(MockNode::new(kind, self.now));
        id
    }

    fn node(&self, id: NodeId) -> &MockNode {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut MockNode {
        &mut self.nodes[id.0 as usize]
    }

    fn push_event(&mut self, id: NodeId, param: Param, event: CurveEvent) {
        self.node_mut(id).events.entry(param).or_default().push(event);
    }

    /// Advance the clock to `t` (never backwards) and fire ended callbacks
    /// for every source the clock has passed.
    pub fn advance_to(&mut self, t: f64) {
        self.now = self.now.max(t);

        let mut fired = Vec::new();
        for node in &mut self.nodes {
            if node.ended {
                continue;
            }
            if matches!(node.end_time(), Some(end) if end <= self.now) {
                node.ended = true;
                if let Some(callback) = node.on_ended.take() {
                    fired.push(callback);
                }
            }
        }
        for callback in fired {
            callback();
        }
    }

    /// Advance the clock by `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        self.advance_to(self.now + dt);
    }

    /// Evaluate a parameter's scheduled curve at an arbitrary time.
    pub fn value_at(&self, id: NodeId, param: Param, t: f64) -> f32 {
        let node = self.node(id);
        let mut value = node.initial.get(&param).copied().unwrap_or(0.0);
        let mut anchor_at = node.created_at;

        let mut events: Vec<CurveEvent> =
            node.events.get(&param).cloned().unwrap_or_default();
        events.sort_by(|a, b| a.at().total_cmp(&b.at()));

        for (i, event) in events.iter().enumerate() {
            if event.at() > t {
                // An upcoming ramp pulls the value toward its target from
                // the previous anchor; anything else leaves it held.
                if let CurveEvent::RampTo { value: target, at } = event {
                    let span = at - anchor_at;
                    if span <= 0.0 {
                        value = *target;
                    } else {
                        let frac = ((t - anchor_at) / span).clamp(0.0, 1.0) as f32;
                        value += (target - value) * frac;
                    }
                }
                return value;
            }

            match *event {
                CurveEvent::SetValue { value: v, at } | CurveEvent::RampTo { value: v, at } => {
                    value = v;
                    anchor_at = at;
                }
                CurveEvent::TargetAt {
                    target,
                    at,
                    time_constant,
                } => {
                    // Runs until the next event (or `t`) takes over.
                    let horizon = events
                        .get(i + 1)
                        .map(|next| next.at().min(t))
                        .unwrap_or(t);
                    let dt = (horizon - at).max(0.0);
                    if time_constant <= 0.0 {
                        value = target;
                    } else {
                        value = target + (value - target) * (-dt / time_constant).exp() as f32;
                    }
                    anchor_at = horizon;
                }
            }
        }
        value
    }

    // Inspection helpers for tests and offline debugging.

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        (0..self.nodes.len() as u64).map(NodeId).collect()
    }

    pub fn node_kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.edges.contains(&(from, PortTarget::Node(to)))
    }

    pub fn is_param_connected(&self, from: NodeId, to: NodeId, param: Param) -> bool {
        self.edges.contains(&(from, PortTarget::Param(to, param)))
    }

    pub fn outgoing(&self, from: NodeId) -> Vec<PortTarget> {
        self.edges
            .iter()
            .filter(|(src, _)| *src == from)
            .map(|(_, target)| *target)
            .collect()
    }

    /// Nodes feeding `to`'s input (parameter connections excluded).
    pub fn incoming(&self, to: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(_, target)| *target == PortTarget::Node(to))
            .map(|(src, _)| *src)
            .collect()
    }

    pub fn events(&self, id: NodeId, param: Param) -> Vec<CurveEvent> {
        self.node(id).events.get(&param).cloned().unwrap_or_default()
    }

    /// Every scheduled event in the backend, in a deterministic order.
    /// Snapshot this before and after an operation to prove the operation
    /// scheduled nothing.
    pub fn all_events(&self) -> Vec<(NodeId, Param, CurveEvent)> {
        let mut all = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let mut params: Vec<&Param> = node.events.keys().collect();
            params.sort();
            for param in params {
                for event in &node.events[param] {
                    all.push((NodeId(index as u64), *param, event.clone()));
                }
            }
        }
        all
    }

    pub fn start_time(&self, id: NodeId) -> Option<f64> {
        self.node(id).started_at
    }

    pub fn stop_time(&self, id: NodeId) -> Option<f64> {
        self.node(id).stopped_at
    }

    pub fn is_ended(&self, id: NodeId) -> bool {
        self.node(id).ended
    }

    pub fn buffer_sources(&self) -> Vec<NodeId> {
        self.node_ids()
            .into_iter()
            .filter(|id| matches!(self.node_kind(*id), NodeKind::BufferSource { .. }))
            .collect()
    }
}

impl AudioBackend for MockBackend {
    fn now(&self) -> f64 {
        self.now
    }

    fn destination(&self) -> NodeId {
        NodeId(0)
    }

    fn create_oscillator(&mut self, waveform: Waveform, frequency: f32) -> NodeId {
        let id = self.add_node(NodeKind::Oscillator { waveform });
        self.node_mut(id).initial.insert(Param::Frequency, frequency);
        id
    }

    fn create_filter(&mut self, shape: FilterShape, cutoff: f32, resonance: f32) -> NodeId {
        let id = self.add_node(NodeKind::Filter { shape, resonance });
        self.node_mut(id).initial.insert(Param::Cutoff, cutoff);
        id
    }

    fn create_gain(&mut self, gain: f32) -> NodeId {
        let id = self.add_node(NodeKind::Gain);
        self.node_mut(id).initial.insert(Param::Gain, gain);
        id
    }

    fn create_delay(&mut self, delay: f64) -> NodeId {
        let id = self.add_node(NodeKind::Delay);
        self.node_mut(id).initial.insert(Param::DelayTime, delay as f32);
        id
    }

    fn create_buffer_source(&mut self, buffer: SampleBuffer, playback_rate: f64) -> NodeId {
        let id = self.add_node(NodeKind::BufferSource {
            duration: buffer.duration(),
            rate: playback_rate,
        });
        self.node_mut(id)
            .initial
            .insert(Param::PlaybackRate, playback_rate as f32);
        id
    }

    fn connect(&mut self, from: NodeId, to: NodeId) {
        let edge = (from, PortTarget::Node(to));
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    fn connect_param(&mut self, from: NodeId, to: NodeId, param: Param) {
        let edge = (from, PortTarget::Param(to, param));
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    fn disconnect(&mut self, node: NodeId) {
        self.edges.retain(|(src, _)| *src != node);
    }

    fn start(&mut self, node: NodeId, when: f64) {
        let node = self.node_mut(node);
        if node.started_at.is_none() {
            node.started_at = Some(when);
        }
    }

    fn stop(&mut self, node: NodeId, when: f64) {
        let node = self.node_mut(node);
        if node.ended {
            return;
        }
        node.stopped_at = Some(node.stopped_at.map_or(when, |t| t.min(when)));
    }

    fn set_on_ended(&mut self, node: NodeId, callback: Box<dyn FnOnce()>) {
        self.node_mut(node).on_ended = Some(callback);
    }

    fn param_value(&self, node: NodeId, param: Param) -> f32 {
        self.value_at(node, param, self.now)
    }

    fn set_value_at(&mut self, node: NodeId, param: Param, value: f32, at: f64) {
        self.push_event(node, param, CurveEvent::SetValue { value, at });
    }

    fn ramp_to_value_at(&mut self, node: NodeId, param: Param, value: f32, at: f64) {
        self.push_event(node, param, CurveEvent::RampTo { value, at });
    }

    fn set_target_at(&mut self, node: NodeId, param: Param, target: f32, at: f64, time_constant: f64) {
        self.push_event(
            node,
            param,
            CurveEvent::TargetAt {
                target,
                at,
                time_constant,
            },
        );
    }

    fn cancel_scheduled_values(&mut self, node: NodeId, param: Param, after: f64) {
        if let Some(events) = self.node_mut(node).events.get_mut(&param) {
            events.retain(|event| event.at() < after);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn clock_only_moves_forward() {
        let mut backend = MockBackend::new();
        backend.advance_to(1.0);
        backend.advance_to(0.5);
        assert_eq!(backend.now(), 1.0);
    }

    #[test]
    fn initial_value_holds_until_events() {
        let mut backend = MockBackend::new();
        let gain = backend.create_gain(0.25);
        assert_eq!(backend.param_value(gain, Param::Gain), 0.25);
    }

    #[test]
    fn linear_ramp_interpolates_from_anchor() {
        let mut backend = MockBackend::new();
        let gain = backend.create_gain(0.0);
        backend.set_value_at(gain, Param::Gain, 0.0, 0.0);
        backend.ramp_to_value_at(gain, Param::Gain, 1.0, 1.0);

        assert_eq!(backend.value_at(gain, Param::Gain, 0.5), 0.5);
        assert_eq!(backend.value_at(gain, Param::Gain, 1.0), 1.0);
        assert_eq!(backend.value_at(gain, Param::Gain, 2.0), 1.0);
    }

    #[test]
    fn set_target_approaches_exponentially() {
        let mut backend = MockBackend::new();
        let gain = backend.create_gain(1.0);
        backend.set_value_at(gain, Param::Gain, 1.0, 0.0);
        backend.set_target_at(gain, Param::Gain, 0.0, 0.0, 0.5);

        let after_one_tau = backend.value_at(gain, Param::Gain, 0.5);
        assert!((after_one_tau - (-1.0f32).exp()).abs() < 1e-4);

        let much_later = backend.value_at(gain, Param::Gain, 10.0);
        assert!(much_later.abs() < 1e-4);
    }

    #[test]
    fn cancel_drops_future_events_only() {
        let mut backend = MockBackend::new();
        let gain = backend.create_gain(0.0);
        backend.set_value_at(gain, Param::Gain, 0.5, 0.0);
        backend.ramp_to_value_at(gain, Param::Gain, 1.0, 2.0);

        backend.advance_to(1.0);
        backend.cancel_scheduled_values(gain, Param::Gain, 1.0);

        assert_eq!(backend.events(gain, Param::Gain).len(), 1);
        assert_eq!(backend.param_value(gain, Param::Gain), 0.5);
    }

    #[test]
    fn ended_fires_once_after_scheduled_stop() {
        let mut backend = MockBackend::new();
        let osc = backend.create_oscillator(Waveform::Sine, 440.0);
        backend.start(osc, 0.0);
        backend.stop(osc, 1.0);

        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        backend.set_on_ended(osc, Box::new(move || seen.set(seen.get() + 1)));

        backend.advance_to(0.5);
        assert_eq!(count.get(), 0);

        backend.advance_to(1.0);
        assert_eq!(count.get(), 1);
        assert!(backend.is_ended(osc));

        backend.advance_to(2.0);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn buffer_source_ends_naturally_scaled_by_rate() {
        let mut backend = MockBackend::new();
        let buffer = SampleBuffer::new(vec![0.0; 44_100], 44_100);
        let source = backend.create_buffer_source(buffer, 2.0);
        backend.start(source, 0.0);

        let fired = Rc::new(Cell::new(false));
        let seen = fired.clone();
        backend.set_on_ended(source, Box::new(move || seen.set(true)));

        // 1s of audio at double rate ends at 0.5s.
        backend.advance_to(0.4);
        assert!(!fired.get());
        backend.advance_to(0.5);
        assert!(fired.get());
    }

    #[test]
    fn stop_after_end_is_swallowed() {
        let mut backend = MockBackend::new();
        let buffer = SampleBuffer::new(vec![0.0; 100], 100);
        let source = backend.create_buffer_source(buffer, 1.0);
        backend.start(source, 0.0);
        backend.advance_to(5.0);
        assert!(backend.is_ended(source));

        backend.stop(source, 5.0);
        assert_eq!(backend.stop_time(source), None);
    }

    #[test]
    fn connect_is_idempotent() {
        let mut backend = MockBackend::new();
        let a = backend.create_gain(1.0);
        let b = backend.create_gain(1.0);
        backend.connect(a, b);
        backend.connect(a, b);
        assert_eq!(backend.outgoing(a).len(), 1);
    }

    #[test]
    fn disconnect_removes_outgoing_edges_only() {
        let mut backend = MockBackend::new();
        let a = backend.create_gain(1.0);
        let b = backend.create_gain(1.0);
        let sink = backend.destination();
        backend.connect(a, b);
        backend.connect(b, sink);

        backend.disconnect(b);
        assert!(backend.is_connected(a, b));
        assert!(!backend.is_connected(b, sink));
    }
}
