//! Controller event dispatch
//!
//! [`Controller::handle_event`] is the single entry point for every event.
//! Errors end here: a bad frame or a failed send is logged and counted and
//! the next event is processed normally.

use super::decision::{decide, AuthOutcome, Decision, Policy};
use super::events::{ControllerEvent, PacketIn};
use super::state::{ForwardingStore, InMemoryStore};
use crate::auth::MembershipProvider;
use crate::openflow::{Dpid, FlowProgrammer, OutputPort, PacketOut, SwitchChannel};
use crate::protocol::classify;
use crate::telemetry::MetricsRegistry;
use crate::topology::{BridgeTable, PortState, TopologyProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

pub struct Controller<C, S = InMemoryStore> {
    store: S,
    programmer: FlowProgrammer<C>,
    membership: Box<dyn MembershipProvider + Send>,
    policy: Policy,
    metrics: Arc<MetricsRegistry>,
}

impl<C: SwitchChannel> Controller<C, InMemoryStore> {
    pub fn new(
        channel: C,
        membership: Box<dyn MembershipProvider + Send>,
        policy: Policy,
        session_ttl: Option<Duration>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self::with_store(
            InMemoryStore::with_session_ttl(session_ttl),
            channel,
            membership,
            policy,
            metrics,
        )
    }
}

impl<C: SwitchChannel, S: ForwardingStore> Controller<C, S> {
    pub fn with_store(
        store: S,
        channel: C,
        membership: Box<dyn MembershipProvider + Send>,
        policy: Policy,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let programmer = FlowProgrammer::new(channel, metrics.clone());
        Self {
            store,
            programmer,
            membership,
            policy,
            metrics,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn channel(&self) -> &C {
        self.programmer.channel()
    }

    pub fn channel_mut(&mut self) -> &mut C {
        self.programmer.channel_mut()
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Push the startup bridge priorities to the spanning-tree provider.
    ///
    /// Returns how many entries were accepted.
    pub fn configure_bridges<T>(&self, topology: &mut T, bridges: &BridgeTable) -> usize
    where
        T: TopologyProvider + ?Sized,
    {
        let mut applied = 0;
        for (dpid, priority) in bridges.iter() {
            match topology.set_bridge_config(dpid, priority) {
                Ok(()) => applied += 1,
                Err(e) => warn!("[dpid={}] bridge config rejected: {}", dpid, e),
            }
        }
        applied
    }

    pub fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::PacketIn(packet_in) => self.on_packet_in(packet_in),
            ControllerEvent::TopologyChange { dpid } => self.on_topology_change(dpid),
            ControllerEvent::PortStateChange { dpid, port, state } => {
                self.on_port_state_change(dpid, port, state)
            }
        }
    }

    fn on_packet_in(&mut self, packet_in: PacketIn) {
        let dpid = packet_in.dpid;
        self.metrics.with_switch(dpid, |s| s.packet_ins.inc());

        let packet = match classify(&packet_in.data, packet_in.in_port) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("[dpid={}] dropping packet-in: {}", dpid, e);
                self.metrics.malformed_frames.inc();
                return;
            }
        };

        let expired = self.store.expire_sessions();
        if expired > 0 {
            debug!("{} authorized peers expired", expired);
            self.metrics
                .set_authorized_peers(self.store.authorized_peer_count());
        }

        let decision = decide(
            &mut self.store,
            self.membership.as_ref(),
            &self.policy,
            dpid,
            &packet,
        );
        trace!("[dpid={}] {:?}", dpid, decision);

        self.record_auth(&decision);
        self.program(dpid, &decision);
        self.send_packet_out(dpid, &packet_in, &decision);
    }

    fn record_auth(&self, decision: &Decision) {
        let Some(auth) = &decision.auth else {
            return;
        };
        self.metrics.auth_lookups.inc();
        match auth {
            AuthOutcome::Authorized { session, peers } => {
                info!("session {} authorized {} peer(s)", session, peers);
            }
            AuthOutcome::NotAuthorized { .. } => self.metrics.auth_failures.inc(),
        }
        self.metrics
            .set_authorized_peers(self.store.authorized_peer_count());
    }

    /// Meter before the flow that references it, then the plain flow.
    fn program(&mut self, dpid: Dpid, decision: &Decision) {
        if let Some(qos) = &decision.qos {
            if !self
                .programmer
                .install_meter(dpid, qos.meter_id, qos.rate_kbps, qos.burst)
            {
                // the switch would reject a flow naming an unknown meter
                warn!(
                    "[dpid={}] meter {} not sent, skipping metered flow",
                    dpid, qos.meter_id
                );
            } else {
                let installed = self.programmer.install_flow_with_meter(
                    dpid,
                    qos.flow.flow_match,
                    qos.flow.priority,
                    qos.flow.actions(),
                    qos.meter_id,
                    qos.flow.idle_timeout,
                );
                match installed {
                    Ok(true) => self.metrics.qos_installs.inc(),
                    Ok(false) => {}
                    Err(e) => warn!("{}", e),
                }
            }
        } else if decision.qos_skipped {
            self.metrics.qos_skipped.inc();
        }

        if let Some(flow) = &decision.flow {
            if let Err(e) = self.programmer.install_flow(
                dpid,
                flow.flow_match,
                flow.priority,
                flow.actions(),
                flow.idle_timeout,
            ) {
                warn!("{}", e);
            }
        }
    }

    fn send_packet_out(&mut self, dpid: Dpid, packet_in: &PacketIn, decision: &Decision) {
        match decision.output {
            OutputPort::Flood => self.metrics.floods.inc(),
            OutputPort::Port(_) => self.metrics.unicasts.inc(),
        }

        let buffer_id = packet_in.buffered();
        let packet_out = PacketOut {
            buffer_id,
            in_port: packet_in.in_port,
            actions: decision.actions(),
            data: buffer_id.is_none().then(|| packet_in.data.clone()),
        };
        self.programmer.packet_out(dpid, packet_out);
    }

    fn on_topology_change(&mut self, dpid: Dpid) {
        self.metrics.topology_changes.inc();
        if !self.store.has_learned_state(dpid) {
            debug!("[dpid={}] topology change, nothing learned", dpid);
            return;
        }

        let macs = self.store.learned_macs(dpid);
        let deleted = self.programmer.delete_all_flows(dpid, macs);
        self.store.flush_switch(dpid);
        info!(
            "[dpid={}] topology change: flushed {} destination(s)",
            dpid, deleted
        );
    }

    fn on_port_state_change(&mut self, dpid: Dpid, port: u32, state: PortState) {
        self.metrics.port_state_changes.inc();
        debug!("[dpid={}][port={}] {}", dpid, port, state);
    }
}
