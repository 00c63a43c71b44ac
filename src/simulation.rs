//! The simulation kernel: owns every node, the virtual clock, the shared
//! RNG stream, and the event loop that drives the selected protocol variant
//! to completion.
//!
//! Grounded in the teacher's `Simulation` driver struct (the owner of
//! `Vec<Node>` plus the channel map), restructured around a pulled
//! `Scheduler<Event>` instead of the teacher's pushed embassy tasks (Design
//! Note 3) and a flat `NodeId`-indexed arena instead of the teacher's
//! `Rc<RefCell<Node>>` graph (Design Note 1).

use crate::config::{NodeSpec, SimulationConfig};
use crate::error::SimError;
use crate::node::Node;
use crate::protocol::{build_protocol, dsdv, query};
use crate::rng::SimRng;
use crate::time::{Scheduler, VirtualInstant};
use crate::transceiver::Event;

pub struct Simulation {
    pub(crate) nodes: Vec<Node>,
    pub(crate) scheduler: Scheduler<Event>,
    pub(crate) rng: SimRng,
    pub(crate) config: SimulationConfig,
    pub(crate) error: Option<SimError>,
}

impl Simulation {
    /// Build a simulation from a driver-supplied configuration and node
    /// layout, and arm the initial event set for the selected protocol
    /// variant. `node_specs` must list every node with `id` equal to its
    /// position in the slice (id 0 is the gateway).
    pub fn new(config: SimulationConfig, node_specs: &[NodeSpec], seed: u64) -> Self {
        let mut nodes: Vec<Node> = Vec::with_capacity(node_specs.len());
        for (i, spec) in node_specs.iter().enumerate() {
            assert_eq!(spec.id as usize, i, "node_specs must be ordered by id starting at 0");
            nodes.push(Node::new(spec.id, spec.position()));
        }

        let mut sim = Simulation {
            nodes,
            scheduler: Scheduler::new(),
            rng: SimRng::new(seed),
            config,
            error: None,
        };

        sim.arm_initial_events();
        sim
    }

    fn arm_initial_events(&mut self) {
        let n = self.nodes.len() as u32;
        let is_query = self.config.experiment.is_query();
        let avg_gen = self.config.protocol.avg_gen_time_ms;
        let qth = self.config.protocol.qth_ms;

        for id in 0..n {
            self.scheduler.schedule_at(0, Event::ProactiveTick(id));

            if is_query {
                self.scheduler.schedule_at(0, Event::BeaconFire(id));
                if id != 0 {
                    self.scheduler.schedule_after(qth, Event::WaitQuery(id));
                }
            } else if id == 0 {
                self.scheduler.schedule_at(0, Event::BeaconFire(id));
            }

            if id != 0 {
                let jitter = self.rng.uniform_int(0, avg_gen.max(1));
                self.scheduler.schedule_after(jitter, Event::GeneratorFire(id));
            }
        }
    }

    pub(crate) fn fatal(&mut self, err: SimError) {
        if self.error.is_none() {
            log::error!("fatal invariant violation at t={}: {err}", self.scheduler.now());
            self.error = Some(err);
        }
    }

    pub fn now(&self) -> VirtualInstant {
        self.scheduler.now()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Per-node `{id, pdr, ar, cr, mr, energy, hops, x, y}` summary (spec
    /// §6), for a driver to inspect or persist via `report::write_csv`.
    pub fn report(&self) -> Vec<crate::report::NodeReport> {
        crate::report::compute_all(&self.nodes)
    }

    /// Run the event loop until no event remains at or before `end_time`
    /// (inclusive), or until a fatal invariant violation is recorded.
    pub fn run_until(&mut self, end_time: VirtualInstant) -> Result<(), SimError> {
        log::info!(
            "running {} nodes under {:?} until t={end_time}ms",
            self.nodes.len(),
            self.config.experiment
        );
        let (proactive, reactive) = build_protocol(self.config.experiment);

        loop {
            if self.error.is_some() {
                break;
            }
            if !matches!(self.scheduler.peek_time(), Some(t) if t <= end_time) {
                break;
            }
            let (_, event) = self.scheduler.pop().expect("peek_time confirmed an event is due");

            match event {
                Event::ProactiveTick(node) => proactive.on_tick(self, node),
                Event::TxComplete(tx_node, packet, post) => {
                    self.handle_tx_complete(tx_node, packet, post, reactive.as_ref())
                }
                Event::BeaconFire(node) => {
                    if self.config.experiment.is_query() {
                        query::handle_beacon_fire(self, node);
                    } else {
                        dsdv::handle_beacon_fire(self, node);
                    }
                }
                Event::GeneratorFire(node) => {
                    if self.config.experiment.is_query() {
                        query::handle_generator_fire(self, node);
                    } else {
                        dsdv::handle_generator_fire(self, node);
                    }
                }
                Event::WaitResponse(parent, child) => query::handle_wait_response(self, parent, child),
                Event::WaitQuery(node) => query::handle_wait_query(self, node),
                Event::WaitConfirm(node, candidate) => query::handle_wait_confirm(self, node, candidate),
            }
        }

        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
