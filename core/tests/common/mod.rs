use serde_json::{json, Value};
use strobe_core::*;

pub struct TestHarness {
    pub sim: Simulation,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_resolution(1.0, 10)
    }

    pub fn with_resolution(resolution_ms: f64, slice_steps: i64) -> Self {
        Self {
            sim: Simulation::with_resolution(resolution_ms, slice_steps).unwrap(),
        }
    }

    pub fn add(&mut self, id: NodeId, component: Box<dyn Component>) {
        self.sim.add_component(id, component);
    }

    pub fn add_multimeter(&mut self, config: Value) -> NodeId {
        self.sim.create("Multimeter", &config).unwrap()
    }

    /// Generator with a unit ramp `ramp` and a constant `one`.
    pub fn add_generator(&mut self) -> NodeId {
        self.sim
            .create(
                "Generator",
                &json!({
                    "signals": {
                        "ramp": { "kind": "ramp", "slope": 1.0, "offset": 0.0 },
                        "one": { "kind": "constant", "value": 1.0 },
                    }
                }),
            )
            .unwrap()
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId) {
        self.sim.connect(from, to).unwrap();
    }

    pub fn run_for(&mut self, duration_ms: f64) {
        self.sim.simulate(duration_ms).unwrap();
    }

    pub fn multimeter(&self, id: NodeId) -> &Multimeter {
        self.sim.node::<Multimeter>(id).unwrap()
    }

    pub fn column(&self, id: NodeId, name: &str) -> Vec<f64> {
        self.multimeter(id)
            .data()
            .unwrap()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .unwrap_or_default()
    }

    pub fn times(&self, id: NodeId) -> Vec<i64> {
        self.multimeter(id)
            .device()
            .events()
            .times
            .iter()
            .map(|t| t.steps())
            .collect()
    }
}
