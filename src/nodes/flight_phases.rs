use super::library::runs_where;
use crate::graph::node::{Dependencies, Dependency, Node, NodeError, NodeOutput};
use crate::settings::{CLIMB_CRUISE_DESCENT_MIN_ALTITUDE, RATE_OF_CLIMB_FOR_CLIMB_PHASE};
use crate::store::types::{Frame, NodeKind, Section, Slice};

fn sections(name: &str, runs: Vec<(usize, usize)>) -> Vec<Section> {
    runs.into_iter()
        .map(|(start, stop)| Section::new(name, Slice::new(start as f64, stop as f64)))
        .collect()
}

/// Airborne above the climb/cruise/descent floor.
pub struct ClimbCruiseDescent;

impl Node for ClimbCruiseDescent {
    fn name(&self) -> &str { "Climb Cruise Descent" }
    fn kind(&self) -> NodeKind { NodeKind::Section }

    fn dependencies(&self) -> &[Dependency] {
        const DEPS: &[Dependency] = &[Dependency::required("Altitude STD")];
        DEPS
    }

    fn derive(&self, _frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
        let alt_std = deps.parameter("Altitude STD")?;
        let runs = runs_where(&alt_std.array, |a| a > CLIMB_CRUISE_DESCENT_MIN_ALTITUDE);
        Ok(NodeOutput::Sections(sections(self.name(), runs)))
    }
}

pub struct Climbing;

impl Node for Climbing {
    fn name(&self) -> &str { "Climbing" }
    fn kind(&self) -> NodeKind { NodeKind::Section }

    fn dependencies(&self) -> &[Dependency] {
        const DEPS: &[Dependency] = &[Dependency::required("Rate Of Climb")];
        DEPS
    }

    fn derive(&self, _frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
        let roc = deps.parameter("Rate Of Climb")?;
        let runs = runs_where(&roc.array, |r| r > RATE_OF_CLIMB_FOR_CLIMB_PHASE);
        Ok(NodeOutput::Sections(sections(self.name(), runs)))
    }
}

pub struct Descending;

impl Node for Descending {
    fn name(&self) -> &str { "Descending" }
    fn kind(&self) -> NodeKind { NodeKind::Section }

    fn dependencies(&self) -> &[Dependency] {
        const DEPS: &[Dependency] = &[Dependency::required("Rate Of Climb")];
        DEPS
    }

    fn derive(&self, _frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
        let roc = deps.parameter("Rate Of Climb")?;
        let runs = runs_where(&roc.array, |r| r < -RATE_OF_CLIMB_FOR_CLIMB_PHASE);
        Ok(NodeOutput::Sections(sections(self.name(), runs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NodeValue;
    use crate::store::types::{MaskedArray, Parameter};
    use std::sync::Arc;

    fn deps(name: &str, data: Vec<f64>) -> Dependencies {
        let mut deps = Dependencies::new();
        let param = Parameter::new(name, MaskedArray::new(data), 1.0, 0.0);
        deps.push(name, Some(NodeValue::Parameter(Arc::new(param))));
        deps
    }

    fn slices(output: NodeOutput) -> Vec<Slice> {
        match output {
            NodeOutput::Sections(s) => s.into_iter().map(|s| s.slice).collect(),
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_climb_cruise_descent_runs() {
        let out = ClimbCruiseDescent
            .derive(Frame::ONE_HZ, &deps("Altitude STD", vec![0.0, 12000.0, 35000.0, 9000.0, 15000.0]))
            .unwrap();
        assert_eq!(slices(out), vec![Slice::new(1.0, 3.0), Slice::new(4.0, 5.0)]);
    }

    #[test]
    fn test_climbing_and_descending_split_on_rate() {
        let roc = vec![0.0, 1500.0, 2000.0, 100.0, -100.0, -1200.0, -900.0, 0.0];
        assert_eq!(slices(Climbing.derive(Frame::ONE_HZ, &deps("Rate Of Climb", roc.clone())).unwrap()), vec![Slice::new(1.0, 3.0)]);
        assert_eq!(slices(Descending.derive(Frame::ONE_HZ, &deps("Rate Of Climb", roc)).unwrap()), vec![Slice::new(5.0, 7.0)]);
    }
}
