//! In-process switch channels
//!
//! `RecordingChannel` keeps every command in send order. `SimulatedSwitch`
//! applies commands to a flow table and meter table with OpenFlow add/delete
//! semantics, which is what replay runs and tests check switch-side state
//! against.

use super::{Dpid, FlowMatch, FlowMod, FlowModCommand, MeterMod, SwitchChannel, SwitchCommand};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};

/// Channel that records commands instead of sending them
#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: Vec<(Dpid, SwitchCommand)>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command sent so far, oldest first
    pub fn sent(&self) -> &[(Dpid, SwitchCommand)] {
        &self.sent
    }

    /// Commands sent to one switch
    pub fn sent_to(&self, dpid: Dpid) -> Vec<&SwitchCommand> {
        self.sent
            .iter()
            .filter(|(d, _)| *d == dpid)
            .map(|(_, cmd)| cmd)
            .collect()
    }

    pub fn flow_mods(&self) -> Vec<&FlowMod> {
        self.sent
            .iter()
            .filter_map(|(_, cmd)| match cmd {
                SwitchCommand::FlowMod(flow) => Some(flow),
                _ => None,
            })
            .collect()
    }

    pub fn meter_mods(&self) -> Vec<&MeterMod> {
        self.sent
            .iter()
            .filter_map(|(_, cmd)| match cmd {
                SwitchCommand::MeterMod(meter) => Some(meter),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl SwitchChannel for RecordingChannel {
    fn send(&mut self, dpid: Dpid, command: SwitchCommand) -> Result<()> {
        self.sent.push((dpid, command));
        Ok(())
    }
}

/// Switch-side state of one datapath
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulatedSwitch {
    flows: HashMap<(FlowMatch, u16), FlowMod>,
    meters: BTreeMap<u32, MeterMod>,
    packet_outs: usize,
}

impl SimulatedSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one command the way an OpenFlow 1.3 switch would.
    ///
    /// A flow add referencing a meter the switch does not have is rejected
    /// (OFPMMFC_UNKNOWN_METER) and leaves the table untouched.
    pub fn apply(&mut self, dpid: Dpid, command: &SwitchCommand) -> Result<()> {
        match command {
            SwitchCommand::FlowMod(flow) => match flow.command {
                FlowModCommand::Add => {
                    if let Some(meter_id) = flow.meter_id() {
                        if !self.meters.contains_key(&meter_id) {
                            return Err(Error::SwitchCommand {
                                dpid,
                                reason: format!("unknown meter {}", meter_id),
                            });
                        }
                    }
                    self.flows
                        .insert((flow.flow_match, flow.priority), flow.clone());
                }
                FlowModCommand::Delete => {
                    self.flows
                        .retain(|(installed, _), _| !flow.flow_match.covers(installed));
                }
            },
            SwitchCommand::MeterMod(meter) => {
                self.meters.insert(meter.meter_id, meter.clone());
            }
            SwitchCommand::PacketOut(_) => self.packet_outs += 1,
        }
        Ok(())
    }

    pub fn flow(&self, flow_match: &FlowMatch, priority: u16) -> Option<&FlowMod> {
        self.flows.get(&(*flow_match, priority))
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    pub fn meter(&self, meter_id: u32) -> Option<&MeterMod> {
        self.meters.get(&meter_id)
    }

    pub fn meter_count(&self) -> usize {
        self.meters.len()
    }

    pub fn packet_outs(&self) -> usize {
        self.packet_outs
    }
}

/// Several simulated switches behind one channel
#[derive(Debug, Default)]
pub struct SimulatedFabric {
    switches: BTreeMap<Dpid, SimulatedSwitch>,
}

impl SimulatedFabric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn switch(&self, dpid: Dpid) -> Option<&SimulatedSwitch> {
        self.switches.get(&dpid)
    }

    pub fn switches(&self) -> impl Iterator<Item = (&Dpid, &SimulatedSwitch)> {
        self.switches.iter()
    }
}

impl SwitchChannel for SimulatedFabric {
    fn send(&mut self, dpid: Dpid, command: SwitchCommand) -> Result<()> {
        self.switches
            .entry(dpid)
            .or_default()
            .apply(dpid, &command)
    }
}
