//! Shared resources available to every node while it is firing: the
//! current discrete-event time, a deterministic random number source,
//! and the output stream nodes may print observables to.

use std::io::Write;

use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng};

use crate::discrete_event_time::DiscreteEventTime;

/// A source of randomness handed to nodes during event handlers.
///
/// Nodes only ever receive `&mut` access to the context's single `Rng`,
/// so there is exactly one writer at a time — the framework's
/// cooperative, non-reentrant scheduling guarantees this without extra
/// synchronization.
pub trait Rng: Send {
    fn gen_f64(&mut self) -> f64;
    fn gen_range_u64(&mut self, lo: u64, hi: u64) -> u64;
}

/// The production random source: a seeded, reproducible PRNG.
pub struct StdRngSource(StdRng);

impl StdRngSource {
    pub fn from_seed(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Rng for StdRngSource {
    fn gen_f64(&mut self) -> f64 {
        self.0.gen::<f64>()
    }

    fn gen_range_u64(&mut self, lo: u64, hi: u64) -> u64 {
        self.0.gen_range(lo..hi)
    }
}

/// Accepts the lines a node prints during an event, tagged with the
/// discrete-event time and the printing node's full name, per the
/// external line format (`t_index|c|payload`).
pub struct Printer {
    sink: Box<dyn Write + Send>,
}

impl Printer {
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self { sink: Box::new(sink) }
    }

    pub fn sink(out: impl Write + Send + 'static) -> Self {
        Self::new(out)
    }

    pub fn print_line(&mut self, time: &DiscreteEventTime, node_full_name: &str, payload: &str) {
        let _ = writeln!(self.sink, "{}|{}{}", time, node_full_name, payload);
    }

    pub fn print_time(&mut self, time: &DiscreteEventTime) {
        let _ = writeln!(self.sink, "{}|$time:{}", time, time.t());
    }
}

/// Resources shared by every node in one simulation run: the time,
/// the RNG, and the output stream. Owned by the `Simulation` and
/// handed to nodes by shared mutable reference while they fire.
pub struct NodeContext {
    time: DiscreteEventTime,
    rng: Box<dyn Rng>,
    printer: Printer,
}

impl NodeContext {
    pub fn new(rng: Box<dyn Rng>, printer: Printer) -> Self {
        Self {
            time: DiscreteEventTime::new(sydevs_types::TimePoint::new()),
            rng,
            printer,
        }
    }

    pub fn time(&self) -> &DiscreteEventTime {
        &self.time
    }

    pub fn set_time(&mut self, t: sydevs_types::TimePoint) {
        self.time.set_time(t);
    }

    pub fn tick(&mut self) -> i64 {
        self.time.tick()
    }

    pub fn rng(&mut self) -> &mut dyn Rng {
        self.rng.as_mut()
    }

    pub fn printer(&mut self) -> &mut Printer {
        &mut self.printer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_rng_source_is_deterministic_given_a_seed() {
        let mut a = StdRngSource::from_seed(7);
        let mut b = StdRngSource::from_seed(7);
        assert_eq!(a.gen_range_u64(0, 1000), b.gen_range_u64(0, 1000));
    }

    #[derive(Clone, Default)]
    struct SharedBuf(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn printer_writes_tagged_lines() {
        let buf = SharedBuf::default();
        let mut printer = Printer::new(buf.clone());
        let t = DiscreteEventTime::new(sydevs_types::TimePoint::new());
        printer.print_line(&t, "root.model", "$initialization");
        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("root.model$initialization"));
    }
}
