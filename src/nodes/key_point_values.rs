use crate::graph::node::{Dependencies, Dependency, Node, NodeError, NodeOutput};
use crate::store::types::{Frame, KeyPointValue, NodeKind, Parameter, Section};

/// Peak of `param` within each section, tagged with the section's slice.
fn max_per_section(name: &str, param: &Parameter, sections: &[Section]) -> Vec<KeyPointValue> {
    let len = param.array.len();
    sections
        .iter()
        .filter_map(|section| {
            let (start, stop) = section.slice.to_range(len);
            let index = param.array.argmax_in(start, stop)?;
            let value = param.array.get(index)?;
            Some(KeyPointValue::new(index as f64, value, name).within(section.slice))
        })
        .collect()
}

pub struct AltitudeMax;

impl Node for AltitudeMax {
    fn name(&self) -> &str { "Altitude Max" }
    fn kind(&self) -> NodeKind { NodeKind::KeyPointValue }

    fn dependencies(&self) -> &[Dependency] {
        const DEPS: &[Dependency] = &[Dependency::required("Altitude STD"), Dependency::required("Climb Cruise Descent")];
        DEPS
    }

    fn derive(&self, _frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
        let alt_std = deps.parameter("Altitude STD")?;
        let ccds = deps.sections("Climb Cruise Descent")?;
        Ok(NodeOutput::KeyPointValues(max_per_section(self.name(), alt_std, ccds)))
    }
}

pub struct RateOfClimbMax;

impl Node for RateOfClimbMax {
    fn name(&self) -> &str { "Rate Of Climb Max" }
    fn kind(&self) -> NodeKind { NodeKind::KeyPointValue }

    fn dependencies(&self) -> &[Dependency] {
        const DEPS: &[Dependency] = &[Dependency::required("Rate Of Climb"), Dependency::required("Climbing")];
        DEPS
    }

    fn derive(&self, _frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
        let roc = deps.parameter("Rate Of Climb")?;
        let climbs = deps.sections("Climbing")?;
        Ok(NodeOutput::KeyPointValues(max_per_section(self.name(), roc, climbs)))
    }
}
