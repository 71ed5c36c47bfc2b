//! Flow and meter programmer
//!
//! Turns decisions into flow-mods, meter-mods and packet-outs. Sends are
//! fire-and-forget: a failed send is logged and counted, never retried.

use super::{
    Action, Dpid, FlowMatch, FlowMod, FlowModCommand, Instruction, MeterBand, MeterMod,
    PacketOut, SwitchChannel, SwitchCommand,
};
use crate::protocol::MacAddr;
use crate::telemetry::MetricsRegistry;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Programs flows and meters on switches through a [`SwitchChannel`]
#[derive(Debug)]
pub struct FlowProgrammer<C> {
    channel: C,
    metrics: Arc<MetricsRegistry>,
}

impl<C: SwitchChannel> FlowProgrammer<C> {
    pub fn new(channel: C, metrics: Arc<MetricsRegistry>) -> Self {
        Self { channel, metrics }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Add a plain forwarding flow.
    ///
    /// Refuses flows that flood: flooding is only ever done by packet-out.
    /// `Ok(false)` means the channel did not take the flow-mod.
    pub fn install_flow(
        &mut self,
        dpid: Dpid,
        flow_match: FlowMatch,
        priority: u16,
        actions: Vec<Action>,
        idle_timeout: u16,
    ) -> Result<bool> {
        let flow = FlowMod {
            command: FlowModCommand::Add,
            flow_match,
            priority,
            idle_timeout,
            instructions: vec![Instruction::ApplyActions(actions)],
        };
        self.add_flow(dpid, flow)
    }

    /// Add (or overwrite) a meter with a single drop band.
    ///
    /// Returns whether the channel accepted the meter-mod.
    pub fn install_meter(
        &mut self,
        dpid: Dpid,
        meter_id: u32,
        rate_kbps: u32,
        burst: u32,
    ) -> bool {
        let meter = MeterMod {
            meter_id,
            bands: vec![MeterBand::Drop {
                rate: rate_kbps,
                burst_size: burst,
            }],
        };
        debug!(
            "[dpid={}] meter {} add: {} kbps burst {}",
            dpid, meter_id, rate_kbps, burst
        );
        let sent = self.dispatch(dpid, SwitchCommand::MeterMod(meter));
        if sent {
            self.metrics.with_switch(dpid, |s| s.meter_adds.inc());
        }
        sent
    }

    /// Add a flow that applies `actions` and attaches `meter_id`.
    ///
    /// The meter must already have been sent to the switch.
    pub fn install_flow_with_meter(
        &mut self,
        dpid: Dpid,
        flow_match: FlowMatch,
        priority: u16,
        actions: Vec<Action>,
        meter_id: u32,
        idle_timeout: u16,
    ) -> Result<bool> {
        let flow = FlowMod {
            command: FlowModCommand::Add,
            flow_match,
            priority,
            idle_timeout,
            instructions: vec![
                Instruction::ApplyActions(actions),
                Instruction::Meter(meter_id),
            ],
        };
        self.add_flow(dpid, flow)
    }

    /// Delete every flow whose destination is one of `macs`.
    ///
    /// Issues one non-strict delete per MAC and returns how many were sent.
    pub fn delete_all_flows<I>(&mut self, dpid: Dpid, macs: I) -> usize
    where
        I: IntoIterator<Item = MacAddr>,
    {
        let mut issued = 0;
        for mac in macs {
            let flow = FlowMod {
                command: FlowModCommand::Delete,
                flow_match: FlowMatch {
                    eth_dst: Some(mac),
                    ..Default::default()
                },
                priority: 1,
                idle_timeout: 0,
                instructions: Vec::new(),
            };
            trace!("[dpid={}] delete flows to {}", dpid, mac);
            if self.dispatch(dpid, SwitchCommand::FlowMod(flow)) {
                self.metrics.with_switch(dpid, |s| s.flow_deletes.inc());
            }
            issued += 1;
        }
        issued
    }

    pub fn packet_out(&mut self, dpid: Dpid, packet_out: PacketOut) {
        if self.dispatch(dpid, SwitchCommand::PacketOut(packet_out)) {
            self.metrics.with_switch(dpid, |s| s.packet_outs.inc());
        }
    }

    fn add_flow(&mut self, dpid: Dpid, flow: FlowMod) -> Result<bool> {
        if flow.floods() {
            warn!("[dpid={}] refusing flood flow {:?}", dpid, flow.flow_match);
            return Err(Error::FloodFlowRule { dpid });
        }
        debug!(
            "[dpid={}] flow add {:?} priority {}",
            dpid, flow.flow_match, flow.priority
        );
        let sent = self.dispatch(dpid, SwitchCommand::FlowMod(flow));
        if sent {
            self.metrics.with_switch(dpid, |s| s.flow_adds.inc());
        }
        Ok(sent)
    }

    /// Send and absorb failures. Returns whether the channel accepted it.
    fn dispatch(&mut self, dpid: Dpid, command: SwitchCommand) -> bool {
        match self.channel.send(dpid, command) {
            Ok(()) => true,
            Err(e) => {
                warn!("[dpid={}] {}", dpid, e);
                self.metrics.with_switch(dpid, |s| s.send_errors.inc());
                false
            }
        }
    }
}
