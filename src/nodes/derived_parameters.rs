use super::library::rate_of_change;
use crate::graph::node::{Dependencies, Dependency, Node, NodeError, NodeOutput};
use crate::store::types::{Frame, MaskedArray, NodeKind};

/// Vertical speed in ft/min from pressure altitude.
pub struct RateOfClimb;

impl Node for RateOfClimb {
    fn name(&self) -> &str { "Rate Of Climb" }
    fn kind(&self) -> NodeKind { NodeKind::DerivedParameter }

    fn dependencies(&self) -> &[Dependency] {
        const DEPS: &[Dependency] = &[Dependency::required("Altitude STD")];
        DEPS
    }

    fn derive(&self, frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
        let alt_std = deps.parameter("Altitude STD")?;
        let per_second = rate_of_change(&alt_std.array, frame.frequency);
        let array = MaskedArray::from_options(per_second.iter().map(|v| v.map(|r| r * 60.0)));
        Ok(NodeOutput::Parameter { array: Some(array), frame })
    }
}

/// Altitude above the lowest valid pressure altitude of the flight.
pub struct AltitudeAal;

impl Node for AltitudeAal {
    fn name(&self) -> &str { "Altitude AAL" }
    fn kind(&self) -> NodeKind { NodeKind::DerivedParameter }

    fn dependencies(&self) -> &[Dependency] {
        const DEPS: &[Dependency] = &[Dependency::required("Altitude STD")];
        DEPS
    }

    fn derive(&self, frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
        let alt_std = deps.parameter("Altitude STD")?;
        // Nothing valid to reference against: let the engine mask the output.
        let Some(floor) = alt_std.array.min_valid() else {
            return Ok(NodeOutput::Parameter { array: None, frame });
        };
        let array = MaskedArray::from_options(alt_std.array.iter().map(|v| v.map(|a| a - floor)));
        Ok(NodeOutput::Parameter { array: Some(array), frame })
    }
}
