//! Recording Audio Graph
//!
//! [`CommandGraph`] implements both ports by keeping a lightweight model of
//! every node it has handed out and appending a serializable
//! [`GraphCommand`] for each operation. A host (the browser bindings, a
//! native renderer) drains the commands and applies them to real audio
//! nodes; tests inspect them directly.

use crate::error::ModulationError;
use crate::port::{
    AudioGraphPort, AudioParam, Connection, FilterType, NodeKind, NodeRef, ParamRef, PlaybackPort,
    SourceRef,
};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::HashMap;

/// One operation issued against the audio graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum GraphCommand {
    Create {
        node: NodeRef,
        kind: NodeKind,
    },
    Connect {
        from: NodeRef,
        to: Connection,
    },
    /// Linear ramp reaching `target` at `end_time` (audio clock seconds)
    Ramp {
        param: ParamRef,
        target: f64,
        end_time: f64,
    },
    Set {
        param: ParamRef,
        value: f64,
        time: f64,
    },
    FilterType {
        node: NodeRef,
        filter_type: FilterType,
    },
    Start {
        node: NodeRef,
        time: f64,
    },
    Stop {
        node: NodeRef,
        time: f64,
    },
    /// Node disconnected and dropped; its reference will not be used again
    Release {
        node: NodeRef,
    },
    LoadSource {
        source: SourceRef,
    },
    PlaybackRate {
        rate: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OscillatorPhase {
    Created,
    Started,
    Stopped,
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    params: HashMap<AudioParam, f64>,
    phase: OscillatorPhase,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            params: HashMap::new(),
            phase: OscillatorPhase::Created,
        }
    }
}

/// Default value of a parameter before anything touches it, as Web Audio defines them
fn default_param(kind: NodeKind, param: AudioParam) -> f64 {
    match (kind, param) {
        (NodeKind::Oscillator, AudioParam::Frequency) => 440.0,
        (_, AudioParam::Frequency) => 350.0,
        (_, AudioParam::Q) => 1.0,
        (_, AudioParam::Gain) => 1.0,
        (_, AudioParam::Pan) => 0.0,
    }
}

/// Audio graph model that records every command it receives
#[derive(Debug)]
pub struct CommandGraph {
    nodes: SlotMap<NodeRef, Node>,
    commands: Vec<GraphCommand>,
    time: f64,
    playback_rate: f64,
    source: Option<SourceRef>,
}

impl Default for CommandGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandGraph {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            commands: Vec::new(),
            time: 0.0,
            playback_rate: 1.0,
            source: None,
        }
    }

    /// Set the audio clock (seconds). Time never runs backwards.
    pub fn set_time(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds > self.time {
            self.time = seconds;
        }
    }

    /// Move the audio clock forward
    pub fn advance_time(&mut self, seconds: f64) {
        self.set_time(self.time + seconds);
    }

    /// Commands issued since the last drain
    pub fn commands(&self) -> &[GraphCommand] {
        &self.commands
    }

    /// Take all pending commands
    pub fn drain_commands(&mut self) -> Vec<GraphCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn kind(&self, node: NodeRef) -> Option<NodeKind> {
        self.nodes.get(node).map(|n| n.kind)
    }

    /// Latest requested value of a parameter (ramp target or immediate value)
    pub fn param_value(&self, param: ParamRef) -> Option<f64> {
        self.nodes.get(param.node).map(|n| {
            n.params
                .get(&param.param)
                .copied()
                .unwrap_or_else(|| default_param(n.kind, param.param))
        })
    }

    /// Number of ramp commands pending
    pub fn ramp_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, GraphCommand::Ramp { .. }))
            .count()
    }

    /// Ramp targets issued for one parameter, oldest first
    pub fn ramp_targets(&self, param: ParamRef) -> Vec<f64> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                GraphCommand::Ramp {
                    param: p, target, ..
                } if *p == param => Some(*target),
                _ => None,
            })
            .collect()
    }

    pub fn is_oscillator_running(&self, node: NodeRef) -> bool {
        self.nodes
            .get(node)
            .is_some_and(|n| n.kind == NodeKind::Oscillator && n.phase == OscillatorPhase::Started)
    }

    pub fn running_oscillators(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| n.kind == NodeKind::Oscillator && n.phase == OscillatorPhase::Started)
            .count()
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn source(&self) -> Option<&SourceRef> {
        self.source.as_ref()
    }

    fn create(&mut self, kind: NodeKind) -> NodeRef {
        let node = self.nodes.insert(Node::new(kind));
        self.commands.push(GraphCommand::Create { node, kind });
        node
    }

    fn oscillator_mut(&mut self, node: NodeRef) -> Result<&mut Node, ModulationError> {
        match self.nodes.get_mut(node) {
            Some(n) if n.kind == NodeKind::Oscillator => Ok(n),
            _ => Err(ModulationError::UnknownNode),
        }
    }

    fn store_param(&mut self, param: ParamRef, value: f64) -> Result<(), ModulationError> {
        if !value.is_finite() {
            return Err(ModulationError::config("non-finite parameter value"));
        }
        let node = self
            .nodes
            .get_mut(param.node)
            .ok_or(ModulationError::UnknownNode)?;
        node.params.insert(param.param, value);
        Ok(())
    }
}

impl AudioGraphPort for CommandGraph {
    fn now(&self) -> f64 {
        self.time
    }

    fn ramp_param(
        &mut self,
        param: ParamRef,
        target: f64,
        duration: f64,
    ) -> Result<(), ModulationError> {
        self.store_param(param, target)?;
        self.commands.push(GraphCommand::Ramp {
            param,
            target,
            end_time: self.time + duration.max(0.0),
        });
        Ok(())
    }

    fn set_param_immediate(
        &mut self,
        param: ParamRef,
        value: f64,
    ) -> Result<(), ModulationError> {
        self.store_param(param, value)?;
        self.commands.push(GraphCommand::Set {
            param,
            value,
            time: self.time,
        });
        Ok(())
    }

    fn create_oscillator_pair(&mut self) -> Result<(NodeRef, NodeRef), ModulationError> {
        let left = self.create(NodeKind::Oscillator);
        let right = self.create(NodeKind::Oscillator);
        Ok((left, right))
    }

    fn start_oscillator(&mut self, oscillator: NodeRef) -> Result<(), ModulationError> {
        let time = self.time;
        let node = self.oscillator_mut(oscillator)?;
        match node.phase {
            OscillatorPhase::Created => node.phase = OscillatorPhase::Started,
            OscillatorPhase::Started => return Err(ModulationError::DoubleStart),
            OscillatorPhase::Stopped => return Err(ModulationError::OscillatorStopped),
        }
        self.commands.push(GraphCommand::Start {
            node: oscillator,
            time,
        });
        Ok(())
    }

    fn stop_oscillator(&mut self, oscillator: NodeRef) -> Result<(), ModulationError> {
        let time = self.time;
        let node = self.oscillator_mut(oscillator)?;
        if node.phase == OscillatorPhase::Stopped {
            return Err(ModulationError::DoubleStop);
        }
        node.phase = OscillatorPhase::Stopped;
        self.commands.push(GraphCommand::Stop {
            node: oscillator,
            time,
        });
        Ok(())
    }

    fn create_gain(&mut self) -> Result<NodeRef, ModulationError> {
        Ok(self.create(NodeKind::Gain))
    }

    fn create_panner(&mut self) -> Result<NodeRef, ModulationError> {
        Ok(self.create(NodeKind::Panner))
    }

    fn create_filter(&mut self) -> Result<NodeRef, ModulationError> {
        Ok(self.create(NodeKind::Filter))
    }

    fn create_media_source(&mut self) -> Result<NodeRef, ModulationError> {
        Ok(self.create(NodeKind::MediaSource))
    }

    fn connect(&mut self, from: NodeRef, to: Connection) -> Result<(), ModulationError> {
        if !self.nodes.contains_key(from) {
            return Err(ModulationError::UnknownNode);
        }
        if let Connection::Node(target) = to {
            if !self.nodes.contains_key(target) {
                return Err(ModulationError::UnknownNode);
            }
        }
        self.commands.push(GraphCommand::Connect { from, to });
        Ok(())
    }

    fn set_filter_type(
        &mut self,
        filter: NodeRef,
        kind: FilterType,
    ) -> Result<(), ModulationError> {
        match self.nodes.get(filter) {
            Some(n) if n.kind == NodeKind::Filter => {}
            _ => return Err(ModulationError::UnknownNode),
        }
        self.commands.push(GraphCommand::FilterType {
            node: filter,
            filter_type: kind,
        });
        Ok(())
    }

    fn release_node(&mut self, node: NodeRef) -> Result<(), ModulationError> {
        self.nodes.remove(node).ok_or(ModulationError::UnknownNode)?;
        self.commands.push(GraphCommand::Release { node });
        Ok(())
    }
}

impl PlaybackPort for CommandGraph {
    fn load_source(&mut self, source: &SourceRef) {
        self.source = Some(source.clone());
        self.commands.push(GraphCommand::LoadSource {
            source: source.clone(),
        });
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.playback_rate = rate;
        self.commands.push(GraphCommand::PlaybackRate { rate });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_connect() {
        let mut graph = CommandGraph::new();
        let gain = graph.create_gain().unwrap();
        let panner = graph.create_panner().unwrap();

        graph.connect(gain, Connection::Node(panner)).unwrap();
        graph.connect(panner, Connection::Destination).unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.kind(gain), Some(NodeKind::Gain));
        assert_eq!(graph.commands().len(), 4);
    }

    #[test]
    fn test_ramp_records_end_time() {
        let mut graph = CommandGraph::new();
        let gain = graph.create_gain().unwrap();
        graph.set_time(2.0);

        let param = ParamRef::new(gain, AudioParam::Gain);
        graph.ramp_param(param, 0.5, 0.15).unwrap();

        assert_eq!(graph.param_value(param), Some(0.5));
        match graph.commands().last() {
            Some(GraphCommand::Ramp { end_time, .. }) => assert!((end_time - 2.15).abs() < 1e-12),
            other => panic!("expected ramp, got {:?}", other),
        }
    }

    #[test]
    fn test_default_param_values() {
        let mut graph = CommandGraph::new();
        let (left, _) = graph.create_oscillator_pair().unwrap();
        let panner = graph.create_panner().unwrap();
        assert_eq!(
            graph.param_value(ParamRef::new(left, AudioParam::Frequency)),
            Some(440.0)
        );
        assert_eq!(
            graph.param_value(ParamRef::new(panner, AudioParam::Pan)),
            Some(0.0)
        );
    }

    #[test]
    fn test_release_drops_node() {
        let mut graph = CommandGraph::new();
        let (left, right) = graph.create_oscillator_pair().unwrap();
        graph.start_oscillator(left).unwrap();
        graph.stop_oscillator(left).unwrap();

        graph.release_node(left).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.kind(left), None);
        assert_eq!(
            graph.commands().last(),
            Some(&GraphCommand::Release { node: left })
        );

        // Released references are stale
        assert_eq!(graph.release_node(left), Err(ModulationError::UnknownNode));
        assert_eq!(graph.start_oscillator(left), Err(ModulationError::UnknownNode));
        assert_eq!(graph.kind(right), Some(NodeKind::Oscillator));
    }

    #[test]
    fn test_rejects_non_finite_values() {
        let mut graph = CommandGraph::new();
        let gain = graph.create_gain().unwrap();
        let result = graph.ramp_param(ParamRef::new(gain, AudioParam::Gain), f64::NAN, 0.1);
        assert!(matches!(result, Err(ModulationError::ConfigInvalid { .. })));
        assert_eq!(graph.ramp_count(), 0);
    }

    #[test]
    fn test_oscillator_is_single_use() {
        let mut graph = CommandGraph::new();
        let (left, right) = graph.create_oscillator_pair().unwrap();

        graph.start_oscillator(left).unwrap();
        assert_eq!(graph.start_oscillator(left), Err(ModulationError::DoubleStart));
        assert!(graph.is_oscillator_running(left));

        graph.stop_oscillator(left).unwrap();
        assert_eq!(graph.stop_oscillator(left), Err(ModulationError::DoubleStop));
        assert_eq!(
            graph.start_oscillator(left),
            Err(ModulationError::OscillatorStopped)
        );
        assert_eq!(graph.running_oscillators(), 0);

        // Right was never started; stopping it is still terminal
        graph.stop_oscillator(right).unwrap();
        assert_eq!(
            graph.start_oscillator(right),
            Err(ModulationError::OscillatorStopped)
        );
    }

    #[test]
    fn test_filter_type_requires_filter_node() {
        let mut graph = CommandGraph::new();
        let gain = graph.create_gain().unwrap();
        let filter = graph.create_filter().unwrap();
        assert_eq!(
            graph.set_filter_type(gain, FilterType::Bandpass),
            Err(ModulationError::UnknownNode)
        );
        graph.set_filter_type(filter, FilterType::Bandpass).unwrap();
    }

    #[test]
    fn test_time_is_monotonic() {
        let mut graph = CommandGraph::new();
        graph.set_time(5.0);
        graph.set_time(3.0);
        assert_eq!(graph.now(), 5.0);
        graph.advance_time(0.5);
        assert_eq!(graph.now(), 5.5);
    }

    #[test]
    fn test_playback_port() {
        let mut graph = CommandGraph::new();
        graph.load_source(&SourceRef::new("music/track.mp3"));
        graph.set_playback_rate(1.25);
        assert_eq!(graph.source().map(|s| s.as_str()), Some("music/track.mp3"));
        assert_eq!(graph.playback_rate(), 1.25);

        let drained = graph.drain_commands();
        assert_eq!(drained.len(), 2);
        assert!(graph.commands().is_empty());
    }

    #[test]
    fn test_command_json_shape() {
        let command = GraphCommand::PlaybackRate { rate: 1.0 };
        let json = serde_json::to_string(&command).unwrap();
        assert_eq!(json, r#"{"type":"playback_rate","rate":1.0}"#);
    }
}
