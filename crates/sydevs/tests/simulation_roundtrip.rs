//! End-to-end roundtrip: a composite wiring one message-emitting atomic
//! node into one message-counting atomic node, run to completion.

use sydevs::{Atomic, AtomicNode, Composite, Endpoint, Link, NodeContext, NodeInterface, PortGoal, PortMode, Printer, Result, SimConfig, SimState, Simulation, SystemNode};
use sydevs_types::{levels, Duration, Scale, TimePoint};

struct Ticker {
    iface: NodeInterface,
    out: usize,
    period: Duration,
    ticks_sent: usize,
}

impl Ticker {
    fn new(period: Duration) -> Self {
        let mut iface = NodeInterface::new("root.ticker");
        let out = iface.add_port::<i64>("tick", PortMode::Message, PortGoal::Output, false);
        Self { iface, out, period, ticks_sent: 0 }
    }
}

impl AtomicNode for Ticker {
    fn node_full_name(&self) -> &str {
        "root.ticker"
    }
    fn interface(&self) -> &NodeInterface {
        &self.iface
    }
    fn interface_mut(&mut self) -> &mut NodeInterface {
        &mut self.iface
    }
    fn time_precision(&self) -> Scale {
        levels::UNIT
    }
    fn handle_initialization(&mut self, _ctx: &mut NodeContext) -> Result<Duration> {
        Ok(self.period)
    }
    fn handle_unplanned(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<Duration> {
        Ok(Duration::inf())
    }
    fn handle_planned(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<Duration> {
        self.iface.send_message(self.out, self.ticks_sent as i64)?;
        self.ticks_sent += 1;
        Ok(self.period)
    }
    fn handle_finalization(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<()> {
        Ok(())
    }
}

struct Counter {
    iface: NodeInterface,
    input: usize,
    total: usize,
    out: usize,
}

impl Counter {
    fn new() -> Self {
        let mut iface = NodeInterface::new("root.counter");
        let input = iface.add_port::<i64>("tick", PortMode::Message, PortGoal::Input, false);
        let out = iface.add_port::<i64>("total", PortMode::Flow, PortGoal::Output, false);
        Self { iface, input, total: 0, out }
    }
}

impl AtomicNode for Counter {
    fn node_full_name(&self) -> &str {
        "root.counter"
    }
    fn interface(&self) -> &NodeInterface {
        &self.iface
    }
    fn interface_mut(&mut self) -> &mut NodeInterface {
        &mut self.iface
    }
    fn time_precision(&self) -> Scale {
        levels::UNIT
    }
    fn handle_initialization(&mut self, _ctx: &mut NodeContext) -> Result<Duration> {
        Ok(Duration::inf())
    }
    fn handle_unplanned(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<Duration> {
        if self.iface.received(self.input) {
            self.total += 1;
        }
        Ok(Duration::inf())
    }
    fn handle_planned(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<Duration> {
        Ok(Duration::inf())
    }
    fn handle_finalization(&mut self, _ctx: &mut NodeContext, _elapsed_dt: Duration) -> Result<()> {
        self.iface.assign_flow_output(self.out, self.total as i64)
    }
}

fn build_root(period: Duration) -> Box<dyn SystemNode> {
    let mut composite = Composite::new("root");
    let ticker = composite.add_component("ticker", Box::new(Atomic::new(Ticker::new(period))));
    let counter = composite.add_component("counter", Box::new(Atomic::new(Counter::new())));
    composite
        .add_link(Link { source: Endpoint::Component(ticker, 0), dest: Endpoint::Component(counter, 0) })
        .unwrap();
    Box::new(composite)
}

#[test]
fn ticker_into_counter_runs_for_five_minutes_and_reaches_the_end_time() {
    let period = Duration::new_fixed(30, levels::UNIT);
    let five_minutes = Duration::new_fixed(300, levels::UNIT);
    let end_t = TimePoint::new() + five_minutes;
    let config = SimConfig::default().with_seed(42).with_end_t(end_t.clone());

    let mut sim = Simulation::from_config(config, Printer::new(std::io::sink()), build_root(period)).unwrap();

    assert_eq!(sim.state(), SimState::NotStarted);
    sim.process_remaining_events().unwrap();
    assert_eq!(sim.state(), SimState::Finished);
    assert_eq!(sim.time().t(), &end_t);
    // initialization + at least one tick + finalization.
    assert!(sim.event_count() >= 3);
}

#[test]
fn discrete_event_time_strictly_increases_across_the_whole_run() {
    let period = Duration::new_fixed(1, levels::UNIT);
    let config = SimConfig::default().with_seed(1).with_end_t(TimePoint::new() + Duration::new_fixed(50, levels::UNIT));
    let mut sim = Simulation::from_config(config, Printer::new(std::io::sink()), build_root(period)).unwrap();

    let mut last = None;
    while !sim.is_finished() {
        sim.process_next_event().unwrap();
        let now = sim.time().clone();
        if let Some(prev) = &last {
            assert!(&now > prev, "discrete event time must strictly increase");
        }
        last = Some(now);
    }
}

#[test]
fn process_events_until_a_midpoint_leaves_the_run_unfinished() {
    let period = Duration::new_fixed(10, levels::UNIT);
    let config = SimConfig::default().with_seed(3).with_end_t(TimePoint::new() + Duration::new_fixed(100, levels::UNIT));
    let mut sim = Simulation::from_config(config, Printer::new(std::io::sink()), build_root(period)).unwrap();

    let midpoint = TimePoint::new() + Duration::new_fixed(40, levels::UNIT);
    sim.process_events_until(midpoint.clone()).unwrap();

    assert!(!sim.is_finished());
    assert!(sim.time().t() <= &midpoint);
}
