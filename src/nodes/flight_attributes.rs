use crate::graph::node::{Dependencies, Dependency, Node, NodeError, NodeOutput};
use crate::store::types::{Attribute, Frame, NodeKind};
use crate::analysis::postprocess::offset_datetime;
use chrono::{DateTime, SecondsFormat, Utc};

/// Absolute time of the first climb start.
pub struct TakeoffDatetime;

impl Node for TakeoffDatetime {
    fn name(&self) -> &str { "Takeoff Datetime" }
    fn kind(&self) -> NodeKind { NodeKind::FlightAttribute }

    fn dependencies(&self) -> &[Dependency] {
        const DEPS: &[Dependency] = &[Dependency::required("Climb Start"), Dependency::required("Start Datetime")];
        DEPS
    }

    fn derive(&self, frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
        let Some(first) = deps.key_time_instances("Climb Start")?.first() else {
            return Ok(NodeOutput::FlightAttribute(None));
        };
        let start = deps.attribute("Start Datetime")?;
        let start: DateTime<Utc> = start
            .value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| NodeError::Domain(format!("Start Datetime is not an RFC 3339 timestamp: {}", start.value)))?;

        let seconds = first.index / frame.frequency + frame.offset;
        let takeoff = offset_datetime(start, seconds)
            .ok_or_else(|| NodeError::Domain(format!("Climb Start at {seconds} s is beyond the representable datetime range")))?;
        Ok(NodeOutput::FlightAttribute(Some(Attribute::new(
            self.name(),
            takeoff.to_rfc3339_opts(SecondsFormat::Millis, true),
        ))))
    }
}
