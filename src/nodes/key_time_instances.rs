use super::library::{find_toc_tod, index_at_value, Ramp};
use crate::graph::node::{Dependencies, Dependency, Node, NodeError, NodeOutput};
use crate::settings::{CLIMB_THRESHOLD, GO_AROUND_CLIMB, GO_AROUND_MAX_ALTITUDE, SLOPE_FOR_TOC_TOD};
use crate::store::types::{Frame, KeyTimeInstance, NodeKind};
use std::collections::{BTreeMap, BTreeSet};

const TOC_TOD_DEPS: &[Dependency] = &[Dependency::required("Altitude STD"), Dependency::required("Climb Cruise Descent")];

/// Ramp search on one side of each climb/cruise/descent peak. Results on the
/// section boundary are discarded: the data started or ended in cruise.
fn toc_tod(name: &str, ramp: Ramp, frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
    let alt_std = deps.parameter("Altitude STD")?;
    let slope = SLOPE_FOR_TOC_TOD / frame.frequency;
    let len = alt_std.array.len();

    let mut ktis = Vec::new();
    for ccd in deps.sections("Climb Cruise Descent")? {
        let (start, stop) = ccd.slice.to_range(len);
        let Some(index) = find_toc_tod(&alt_std.array, start, stop, ramp, slope) else { continue };
        let boundary = match ramp {
            Ramp::Climb => start,
            Ramp::Descent => stop.saturating_sub(1),
        };
        if index != boundary {
            ktis.push(KeyTimeInstance::new(index as f64, name));
        }
    }
    Ok(NodeOutput::KeyTimeInstances(ktis))
}

pub struct TopOfClimb;

impl Node for TopOfClimb {
    fn name(&self) -> &str { "Top Of Climb" }
    fn kind(&self) -> NodeKind { NodeKind::KeyTimeInstance }
    fn dependencies(&self) -> &[Dependency] { TOC_TOD_DEPS }

    fn derive(&self, frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
        toc_tod(self.name(), Ramp::Climb, frame, deps)
    }
}

pub struct TopOfDescent;

impl Node for TopOfDescent {
    fn name(&self) -> &str { "Top Of Descent" }
    fn kind(&self) -> NodeKind { NodeKind::KeyTimeInstance }
    fn dependencies(&self) -> &[Dependency] { TOC_TOD_DEPS }

    fn derive(&self, frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
        toc_tod(self.name(), Ramp::Descent, frame, deps)
    }
}

/// Where each climb passes [`CLIMB_THRESHOLD`] above the airfield.
pub struct ClimbStart;

impl Node for ClimbStart {
    fn name(&self) -> &str { "Climb Start" }
    fn kind(&self) -> NodeKind { NodeKind::KeyTimeInstance }

    fn dependencies(&self) -> &[Dependency] {
        const DEPS: &[Dependency] = &[Dependency::required("Altitude AAL"), Dependency::required("Climbing")];
        DEPS
    }

    fn derive(&self, _frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
        let alt_aal = deps.parameter("Altitude AAL")?;
        let ktis = deps
            .sections("Climbing")?
            .iter()
            .filter_map(|climb| {
                let (start, stop) = climb.slice.to_range(alt_aal.array.len());
                index_at_value(&alt_aal.array, start, stop, CLIMB_THRESHOLD)
            })
            .map(|index| KeyTimeInstance::new(index, self.name()))
            .collect();
        Ok(NodeOutput::KeyTimeInstances(ktis))
    }
}

/// One instance per change of flap setting, named after the new setting.
pub struct FlapStateChanges;

impl FlapStateChanges {
    pub const NAME_FORMAT: &'static str = "Flap {setting}";
}

impl Node for FlapStateChanges {
    fn name(&self) -> &str { "Flap State Changes" }
    fn kind(&self) -> NodeKind { NodeKind::KeyTimeInstance }

    fn dependencies(&self) -> &[Dependency] {
        const DEPS: &[Dependency] = &[Dependency::required("Flap")];
        DEPS
    }

    fn derive(&self, _frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
        let flap = deps.parameter("Flap")?;
        let mut ktis = Vec::new();
        let mut previous: Option<f64> = None;
        for (index, value) in flap.array.iter().enumerate() {
            let Some(setting) = value else { continue };
            if previous.is_some_and(|p| p != setting) {
                let fields = BTreeMap::from([("setting".to_string(), setting)]);
                ktis.push(KeyTimeInstance::formatted(index as f64, Self::NAME_FORMAT, fields));
            }
            previous = Some(setting);
        }
        Ok(NodeOutput::KeyTimeInstances(ktis))
    }
}

/// A descent below [`GO_AROUND_MAX_ALTITUDE`] followed by a climb of at
/// least [`GO_AROUND_CLIMB`], marked at the lowest point.
///
/// Radio altitude is preferred for the lowest point when fitted.
pub struct GoAround;

impl Node for GoAround {
    fn name(&self) -> &str { "Go Around" }
    fn kind(&self) -> NodeKind { NodeKind::KeyTimeInstance }

    fn dependencies(&self) -> &[Dependency] {
        const DEPS: &[Dependency] = &[
            Dependency::required("Altitude AAL"),
            Dependency::optional("Altitude Radio"),
            Dependency::required("Descending"),
        ];
        DEPS
    }

    fn can_operate(&self, available: &BTreeSet<&str>) -> bool {
        available.contains("Altitude AAL") && available.contains("Descending")
    }

    fn derive(&self, _frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
        let alt_aal = deps.parameter("Altitude AAL")?;
        let height = deps.optional_parameter("Altitude Radio")?.unwrap_or(alt_aal);
        let descents = deps.sections("Descending")?;
        let len = alt_aal.array.len();

        let mut ktis = Vec::new();
        for (n, descent) in descents.iter().enumerate() {
            let (start, _) = descent.slice.to_range(len);
            // The climb away, if any, happens before the next descent.
            let window_stop = descents.get(n + 1).map_or(len, |next| next.slice.to_range(len).0);

            let Some(pit) = height.array.argmin_in(start, window_stop) else { continue };
            let Some(pit_alt) = alt_aal.array.get(pit) else { continue };
            if pit_alt >= GO_AROUND_MAX_ALTITUDE {
                continue;
            }
            let climbed = alt_aal
                .array
                .argmax_in(pit, window_stop)
                .and_then(|i| alt_aal.array.get(i))
                .map_or(0.0, |peak| peak - pit_alt);
            if climbed >= GO_AROUND_CLIMB {
                ktis.push(KeyTimeInstance::new(pit as f64, self.name()));
            }
        }
        Ok(NodeOutput::KeyTimeInstances(ktis))
    }
}
