use crate::types::{ActivationPlan, Channel, ChannelState};

/// Fixed set of battery channels with their runtime state.
///
/// The hardware map is fixed at construction; only the measurement
/// snapshots and the activation flags change afterwards.
#[derive(Debug, Clone)]
pub struct ChannelSet {
    channels: Vec<Channel>,
    states: Vec<ChannelState>,
    active: Vec<bool>,
}

impl ChannelSet {
    pub fn new(channels: Vec<Channel>) -> Self {
        let count = channels.len();
        Self {
            channels,
            states: vec![ChannelState::default(); count],
            active: vec![false; count],
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn state(&self, index: usize) -> Option<&ChannelState> {
        self.states.get(index)
    }

    pub fn state_mut(&mut self, index: usize) -> Option<&mut ChannelState> {
        self.states.get_mut(index)
    }

    /// Hardware lines and mutable state of one channel at once
    pub fn split_mut(&mut self, index: usize) -> Option<(&Channel, &mut ChannelState)> {
        Some((self.channels.get(index)?, self.states.get_mut(index)?))
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.active.get(index).copied().unwrap_or(false)
    }

    /// 0-based indices of active channels, in ascending order
    pub fn active_indices(&self) -> Vec<usize> {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(i, &on)| on.then_some(i))
            .collect()
    }

    /// Replace every activation flag with the plan's.
    pub fn apply(&mut self, plan: &ActivationPlan) {
        for (i, flag) in self.active.iter_mut().enumerate() {
            *flag = plan.is_active(i);
        }
    }

    /// Zero capacity and smoothing state at the start of a run
    pub fn reset_accumulators(&mut self, index: usize) {
        if let Some(state) = self.states.get_mut(index) {
            state.capacity = 0.0;
            state.last_current = 0.0;
        }
    }
}
