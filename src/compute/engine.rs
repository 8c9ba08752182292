//! A synchronous, single-threaded derivation engine.
//!
//! Walks a processing order, resolves each node's inputs, runs the node in the
//! frame of its first available input and validates the result according to
//! its kind before accumulating it.
use super::align::{align_value, realign_all, sample_count, select_frame};
use super::error::ProcessError;
use super::ledger::Ledger;
use crate::graph::node::{Dependencies, Indexed, Node, NodeOutput, NodeValue};
use crate::store::registry::NodeManager;
use crate::store::source::FlightDataStore;
use crate::store::types::{Frame, MaskedArray, Parameter, Section};
use std::collections::HashSet;
use std::sync::Arc;

/// Largest excess, in samples, trimmed from a derived array without error.
pub const LENGTH_TOLERANCE: usize = 4;

pub struct Engine<'a, S: FlightDataStore + ?Sized> {
    manager: &'a NodeManager,
    store: &'a mut S,
    /// Nodes in the order that ran, or were skipped, without producing a value.
    unproduced: HashSet<String>,
}

impl<'a, S: FlightDataStore + ?Sized> Engine<'a, S> {
    pub fn new(manager: &'a NodeManager, store: &'a mut S) -> Self {
        Self { manager, store, unproduced: HashSet::new() }
    }

    /// Processes `order` front to back. Stops at the first fatal error,
    /// leaving everything accumulated so far in `ledger`.
    pub fn run(&mut self, order: &[String], ledger: &mut Ledger) -> Result<(), ProcessError> {
        for name in order {
            self.process_node(name, ledger)?;
        }
        Ok(())
    }

    fn process_node(&mut self, name: &str, ledger: &mut Ledger) -> Result<(), ProcessError> {
        if self.manager.is_raw_channel(name) || self.manager.get_attribute(name).is_some() {
            return Ok(());
        }
        let node = self
            .manager
            .derived_node(name)
            .cloned()
            .ok_or_else(|| ProcessError::NodeNotFound { node: name.to_string() })?;

        let deps = self.resolve(node.as_ref(), ledger)?;
        if deps.all_absent() {
            if !node.dependencies().iter().any(|d| self.unproduced.contains(&*d.name)) {
                return Err(ProcessError::NoDependenciesResolved(name.to_string()));
            }
            tracing::warn!(node = %name, "Available dependencies produced no values; node skipped");
            self.unproduced.insert(name.to_string());
            return Ok(());
        }
        if !node.can_operate(&deps.available_names()) {
            tracing::warn!(node = %name, "Resolved dependencies rejected by can_operate; node skipped");
            self.unproduced.insert(name.to_string());
            return Ok(());
        }

        let frame = select_frame(&deps);
        let deps = deps.map_values(|v| align_value(v, frame));

        tracing::info!(node = %name, frequency = frame.frequency, offset = frame.offset, "Processing parameter");
        let output = node
            .derive(frame, &deps)
            .map_err(|source| ProcessError::Derive { node: name.to_string(), source })?;

        self.dispatch(node.as_ref(), output, frame, ledger)
    }

    /// Resolves declared dependencies in order: computed results first, then
    /// attributes, then channels in the store.
    fn resolve(&mut self, node: &dyn Node, ledger: &Ledger) -> Result<Dependencies, ProcessError> {
        let mut deps = Dependencies::new();
        for dep in node.dependencies() {
            let name = dep.name.as_ref();
            let value = if let Some(value) = ledger.get(name) {
                Some(value.clone())
            } else if let Some(attr) = self.manager.get_attribute(name) {
                Some(NodeValue::Attribute(Arc::new(attr.clone())))
            } else if self.store.contains(name) {
                Some(NodeValue::Parameter(Arc::new(self.store.read(name)?)))
            } else {
                None
            };
            deps.push(name, value);
        }
        Ok(deps)
    }

    fn dispatch(&mut self, node: &dyn Node, output: NodeOutput, frame: Frame, ledger: &mut Ledger) -> Result<(), ProcessError> {
        let name = node.name();
        if output.kind() != node.kind() {
            return Err(ProcessError::UnknownKind { node: name.to_string(), declared: node.kind(), produced: output.kind() });
        }
        let duration = self.store.duration();

        match output {
            NodeOutput::KeyPointValues(items) => {
                let one_hz = realign_all(&items, frame, Frame::ONE_HZ);
                for kpv in &one_hz {
                    check_index(name, "KPV", &kpv.name, kpv.index, duration)?;
                }
                ledger.insert(name, NodeValue::KeyPointValues(Indexed::new(frame, items)));
                ledger.key_point_values.extend(one_hz);
            }
            NodeOutput::KeyTimeInstances(items) => {
                let one_hz = realign_all(&items, frame, Frame::ONE_HZ);
                for kti in &one_hz {
                    check_index(name, "KTI", &kti.name, kti.index, duration)?;
                }
                ledger.insert(name, NodeValue::KeyTimeInstances(Indexed::new(frame, items)));
                ledger.key_time_instances.extend(one_hz);
            }
            NodeOutput::Sections(items) => {
                let one_hz = realign_all(&items, frame, Frame::ONE_HZ);
                for section in &one_hz {
                    check_section(name, section, duration)?;
                }
                ledger.insert(name, NodeValue::Sections(Indexed::new(frame, items)));
                ledger.sections.extend(one_hz);
            }
            NodeOutput::FlightAttribute(Some(attr)) => {
                ledger.insert(name, NodeValue::Attribute(Arc::new(attr.clone())));
                ledger.flight_attributes.push(attr);
            }
            NodeOutput::FlightAttribute(None) => {
                tracing::warn!(node = %name, "Flight Attribute Node returned empty handed");
                self.unproduced.insert(name.to_string());
            }
            NodeOutput::Parameter { array, frame: result_frame } => {
                let array = reconcile_length(name, array, result_frame.frequency, duration)?;
                self.store
                    .write(Parameter::new(name, array, result_frame.frequency, result_frame.offset))?;
            }
        }
        Ok(())
    }
}

/// Indices are never negative. The upper bound applies only when the
/// duration is known.
fn check_index(node: &str, kind: &'static str, item: &str, index: f64, duration: Option<f64>) -> Result<(), ProcessError> {
    let limit = duration.unwrap_or(f64::INFINITY);
    if (0.0..=limit).contains(&index) {
        return Ok(());
    }
    Err(ProcessError::IndexOutOfRange { node: node.to_string(), kind, name: item.to_string(), index, duration: limit })
}

/// Start bounds lie in `[0, duration]`, stop bounds may reach one sample past it.
fn check_section(node: &str, section: &Section, duration: Option<f64>) -> Result<(), ProcessError> {
    let duration = duration.unwrap_or(f64::INFINITY);
    let bounds = [
        ("start", section.slice.start, duration),
        ("stop", section.slice.stop, duration + 1.0),
        ("start_edge", section.start_edge, duration),
        ("stop_edge", section.stop_edge, duration + 1.0),
    ];
    for (bound, value, limit) in bounds {
        if let Some(value) = value {
            if !(0.0..=limit).contains(&value) {
                return Err(ProcessError::SectionOutOfRange {
                    node: node.to_string(),
                    name: section.name.clone(),
                    bound,
                    value,
                    limit,
                });
            }
        }
    }
    Ok(())
}

/// Matches a derived array to `duration * frequency` samples.
///
/// A missing array becomes fully masked. An excess of up to
/// [`LENGTH_TOLERANCE`] samples is cut; anything else is fatal.
pub(crate) fn reconcile_length(
    node: &str,
    array: Option<MaskedArray>,
    frequency: f64,
    duration: Option<f64>,
) -> Result<MaskedArray, ProcessError> {
    let Some(duration) = duration else {
        return Ok(array.unwrap_or_default());
    };
    let expected = sample_count(duration * frequency);
    let mut array = match array {
        Some(array) => array,
        None => return Ok(MaskedArray::masked_zeros(expected)),
    };

    let actual = array.len();
    if actual == expected {
        return Ok(array);
    }
    if actual > expected && actual - expected <= LENGTH_TOLERANCE {
        tracing::warn!(
            node = %node,
            expected,
            actual,
            "Cutting excess data for parameter"
        );
        array.truncate(expected);
        return Ok(array);
    }
    Err(ProcessError::LengthMismatch { node: node.to_string(), expected, actual })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{Dependency, NodeError};
    use crate::store::aircraft::{AchievedFlightRecord, AircraftInfo};
    use crate::store::registry::NodeRegistry;
    use crate::store::source::MemoryStore;
    use crate::store::types::{Attribute, KeyPointValue, KeyTimeInstance, NodeKind, Slice};
    use chrono::Utc;
    use rstest::rstest;
    use std::sync::Mutex;

    #[rstest]
    #[case(200, Some(200))]
    #[case(201, Some(200))]
    #[case(202, Some(200))]
    #[case(204, Some(200))]
    #[case(205, None)]
    #[case(207, None)]
    #[case(199, None)]
    fn test_length_reconciliation(#[case] actual: usize, #[case] expected: Option<usize>) {
        // duration 100 s at 2 Hz -> 200 samples
        let result = reconcile_length("Test", Some(MaskedArray::new(vec![1.0; actual])), 2.0, Some(100.0));
        match expected {
            Some(len) => assert_eq!(result.unwrap().len(), len),
            None => assert!(matches!(
                result,
                Err(ProcessError::LengthMismatch { expected: 200, actual: a, .. }) if a == actual
            )),
        }
    }

    #[test]
    fn test_missing_array_is_fully_masked() {
        let arr = reconcile_length("Test", None, 0.5, Some(100.0)).unwrap();
        assert_eq!(arr.len(), 50);
        assert!(arr.is_fully_masked());
    }

    #[test]
    fn test_unknown_duration_skips_reconciliation() {
        let arr = reconcile_length("Test", Some(MaskedArray::new(vec![1.0; 7])), 2.0, None).unwrap();
        assert_eq!(arr.len(), 7);
    }

    #[rstest]
    #[case(Slice::new(0.0, 101.0), None, true)]
    #[case(Slice::new(-1.0, 10.0), None, false)]
    #[case(Slice::new(5.0, 101.5), None, false)]
    #[case(Slice { start: None, stop: None }, None, true)]
    #[case(Slice::new(5.0, 10.0), Some((Some(4.5), Some(101.0))), true)]
    #[case(Slice::new(5.0, 10.0), Some((Some(100.5), None)), false)]
    fn test_section_bounds(#[case] slice: Slice, #[case] edges: Option<(Option<f64>, Option<f64>)>, #[case] ok: bool) {
        let mut section = Section::new("Climbing", slice);
        if let Some((start, stop)) = edges {
            section = section.with_edges(start, stop);
        }
        assert_eq!(check_section("Climbing", &section, Some(100.0)).is_ok(), ok);
    }

    #[rstest]
    #[case(0.0, Some(100.0), true)]
    #[case(100.0, Some(100.0), true)]
    #[case(100.5, Some(100.0), false)]
    #[case(-0.5, Some(100.0), false)]
    #[case(1e9, None, true)]
    #[case(-5.0, None, false)]
    #[case(f64::NAN, None, false)]
    fn test_index_bounds(#[case] index: f64, #[case] duration: Option<f64>, #[case] ok: bool) {
        assert_eq!(check_index("Event", "KTI", "Event", index, duration).is_ok(), ok);
    }

    #[rstest]
    #[case(Slice::new(5.0, 1e6), None, true)]
    #[case(Slice::new(-1.0, 10.0), None, false)]
    #[case(Slice::new(5.0, 10.0), Some((Some(-0.5), None)), false)]
    #[case(Slice::new(5.0, 10.0), Some((None, Some(-2.0))), false)]
    fn test_section_bounds_with_unknown_duration(
        #[case] slice: Slice,
        #[case] edges: Option<(Option<f64>, Option<f64>)>,
        #[case] ok: bool,
    ) {
        let mut section = Section::new("Climbing", slice);
        if let Some((start, stop)) = edges {
            section = section.with_edges(start, stop);
        }
        assert_eq!(check_section("Climbing", &section, None).is_ok(), ok);
    }

    // --- Engine runs with scripted nodes ---

    type DeriveFn = dyn Fn(Frame, &Dependencies) -> Result<NodeOutput, NodeError> + Send + Sync;

    struct Scripted {
        name: &'static str,
        kind: NodeKind,
        deps: Vec<Dependency>,
        derive: Box<DeriveFn>,
    }

    impl Node for Scripted {
        fn name(&self) -> &str { self.name }
        fn kind(&self) -> NodeKind { self.kind }
        fn dependencies(&self) -> &[Dependency] { &self.deps }
        fn derive(&self, frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError> {
            (self.derive)(frame, deps)
        }
    }

    fn scripted(
        name: &'static str,
        kind: NodeKind,
        deps: Vec<Dependency>,
        derive: impl Fn(Frame, &Dependencies) -> Result<NodeOutput, NodeError> + Send + Sync + 'static,
    ) -> Scripted {
        Scripted { name, kind, deps, derive: Box::new(derive) }
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new(Some(100.0))
            .with_channel(Parameter::new("Slow", MaskedArray::new(vec![0.0; 50]), 0.5, 0.0))
            .with_channel(Parameter::new("Fast", MaskedArray::new(vec![0.0; 100]), 1.0, 0.25));
        store.open().unwrap();
        store
    }

    fn run(nodes: Vec<Scripted>, order: &[&str], store: &mut MemoryStore) -> (Result<(), ProcessError>, Ledger) {
        let mut registry = NodeRegistry::new();
        for n in nodes {
            registry.register(Arc::new(n)).unwrap();
        }
        let manager = NodeManager::new(
            Utc::now(),
            store.valid_channel_names(),
            vec![],
            registry,
            &AircraftInfo::with_tail_number("G-ABCD"),
            &AchievedFlightRecord::new(),
        );
        let order: Vec<String> = order.iter().map(|s| s.to_string()).collect();
        let mut ledger = Ledger::new();
        let result = Engine::new(&manager, store).run(&order, &mut ledger);
        (result, ledger)
    }

    #[test]
    fn test_frame_comes_from_first_declared_dependency() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let node = scripted(
            "Capture",
            NodeKind::KeyTimeInstance,
            vec![Dependency::required("Slow"), Dependency::required("Fast")],
            move |frame, deps| {
                *sink.lock().unwrap() = Some((frame, deps.parameter("Fast").unwrap().frame()));
                Ok(NodeOutput::KeyTimeInstances(vec![KeyTimeInstance::new(10.0, "Capture")]))
            },
        );
        let mut store = store();
        let (result, ledger) = run(vec![node], &["Fast", "Slow", "Capture"], &mut store);
        result.unwrap();

        let (frame, fast_frame) = seen.lock().unwrap().unwrap();
        assert_eq!(frame, Frame::new(0.5, 0.0));
        // Inputs are reconciled into the node's frame.
        assert_eq!(fast_frame, Frame::new(0.5, 0.0));
        // Index 10 at 0.5 Hz is 20 s.
        assert_eq!(ledger.key_time_instances[0].index, 20.0);
    }

    #[test]
    fn test_optional_dependency_absent_still_runs() {
        let node = scripted(
            "Partial",
            NodeKind::KeyPointValue,
            vec![Dependency::optional("Missing"), Dependency::required("Fast")],
            |_, deps| {
                assert!(deps.optional_parameter("Missing")?.is_none());
                Ok(NodeOutput::KeyPointValues(vec![KeyPointValue::new(1.0, 42.0, "Partial")]))
            },
        );
        let mut store = store();
        let (result, ledger) = run(vec![node], &["Partial"], &mut store);
        result.unwrap();
        assert_eq!(ledger.key_point_values.len(), 1);
        assert_eq!(ledger.key_point_values[0].index, 1.25);
    }

    #[test]
    fn test_all_dependencies_absent_is_fatal() {
        let node = scripted("Orphan", NodeKind::KeyTimeInstance, vec![Dependency::required("Nope")], |_, _| {
            Ok(NodeOutput::KeyTimeInstances(vec![]))
        });
        let mut store = store();
        let (result, _) = run(vec![node], &["Orphan"], &mut store);
        assert!(matches!(result, Err(ProcessError::NoDependenciesResolved(n)) if n == "Orphan"));
    }

    #[test]
    fn test_kti_out_of_range_names_node_and_index() {
        let node = scripted("Late", NodeKind::KeyTimeInstance, vec![Dependency::required("Fast")], |_, _| {
            Ok(NodeOutput::KeyTimeInstances(vec![
                KeyTimeInstance::new(5.0, "Late"),
                KeyTimeInstance::new(150.0, "Late"),
            ]))
        });
        let mut store = store();
        let (result, ledger) = run(vec![node], &["Late"], &mut store);

        let err = result.unwrap_err();
        assert_eq!(err.node(), Some("Late"));
        assert!(matches!(err, ProcessError::IndexOutOfRange { index, duration, .. } if index == 150.25 && duration == 100.0));
        // Nothing from the failing node is committed.
        assert!(ledger.key_time_instances.is_empty());
        assert!(!ledger.contains("Late"));
    }

    #[test]
    fn test_kpv_out_of_range_commits_nothing() {
        let node = scripted("Peak", NodeKind::KeyPointValue, vec![Dependency::required("Fast")], |_, _| {
            Ok(NodeOutput::KeyPointValues(vec![
                KeyPointValue::new(3.0, 1.0, "Peak"),
                KeyPointValue::new(-1.0, 2.0, "Peak"),
            ]))
        });
        let mut store = store();
        let (result, ledger) = run(vec![node], &["Peak"], &mut store);

        let err = result.unwrap_err();
        assert_eq!(err.node(), Some("Peak"));
        assert!(matches!(err, ProcessError::IndexOutOfRange { kind: "KPV", index, .. } if index == -0.75));
        assert!(ledger.key_point_values.is_empty());
        assert!(!ledger.contains("Peak"));
    }

    #[test]
    fn test_section_out_of_range_commits_nothing() {
        let node = scripted("Phase", NodeKind::Section, vec![Dependency::required("Slow")], |_, _| {
            Ok(NodeOutput::Sections(vec![
                Section::new("Phase", Slice::new(0.0, 10.0)),
                Section::new("Phase", Slice::new(10.0, 60.0)),
            ]))
        });
        let mut store = store();
        let (result, ledger) = run(vec![node], &["Phase"], &mut store);

        // Stop 60 at 0.5 Hz is 120 s, past the 101 s limit.
        let err = result.unwrap_err();
        assert_eq!(err.node(), Some("Phase"));
        assert!(matches!(
            err,
            ProcessError::SectionOutOfRange { bound: "stop", value, limit, .. } if value == 120.0 && limit == 101.0
        ));
        assert!(ledger.sections.is_empty());
        assert!(!ledger.contains("Phase"));
    }

    #[test]
    fn test_negative_index_rejected_without_duration() {
        let node = scripted("Early", NodeKind::KeyTimeInstance, vec![Dependency::required("Fast")], |_, _| {
            Ok(NodeOutput::KeyTimeInstances(vec![KeyTimeInstance::new(-5.0, "Early")]))
        });
        let mut store = MemoryStore::new(None)
            .with_channel(Parameter::new("Fast", MaskedArray::new(vec![0.0; 10]), 1.0, 0.0));
        store.open().unwrap();
        let (result, ledger) = run(vec![node], &["Early"], &mut store);

        assert!(matches!(result, Err(ProcessError::IndexOutOfRange { index, .. }) if index == -5.0));
        assert!(ledger.key_time_instances.is_empty());
    }

    #[test]
    fn test_error_stops_run_but_keeps_earlier_results() {
        let first = scripted("A First", NodeKind::KeyPointValue, vec![Dependency::required("Fast")], |_, _| {
            Ok(NodeOutput::KeyPointValues(vec![KeyPointValue::new(1.0, 1.0, "A First")]))
        });
        let failing = scripted("B Fails", NodeKind::KeyPointValue, vec![Dependency::required("Fast")], |_, _| {
            Err(NodeError::Domain("no data".into()))
        });
        let never = scripted("C Never", NodeKind::KeyPointValue, vec![Dependency::required("Fast")], |_, _| {
            panic!("must not run after a fatal error")
        });
        let mut store = store();
        let (result, ledger) = run(vec![first, failing, never], &["A First", "B Fails", "C Never"], &mut store);

        assert!(matches!(result, Err(ProcessError::Derive { node, .. }) if node == "B Fails"));
        assert_eq!(ledger.key_point_values.len(), 1);
    }

    #[test]
    fn test_kind_mismatch_is_unknown_kind() {
        let node = scripted("Confused", NodeKind::Section, vec![Dependency::required("Fast")], |_, _| {
            Ok(NodeOutput::KeyTimeInstances(vec![]))
        });
        let mut store = store();
        let (result, _) = run(vec![node], &["Confused"], &mut store);
        assert!(matches!(
            result,
            Err(ProcessError::UnknownKind { declared: NodeKind::Section, produced: NodeKind::KeyTimeInstance, .. })
        ));
    }

    #[test]
    fn test_empty_flight_attribute_is_recoverable() {
        let empty = scripted("Empty Attr", NodeKind::FlightAttribute, vec![Dependency::required("Fast")], |_, _| {
            Ok(NodeOutput::FlightAttribute(None))
        });
        let full = scripted("Full Attr", NodeKind::FlightAttribute, vec![Dependency::required("Fast")], |_, _| {
            Ok(NodeOutput::FlightAttribute(Some(Attribute::new("Full Attr", 7))))
        });
        let mut store = store();
        let (result, ledger) = run(vec![empty, full], &["Empty Attr", "Full Attr"], &mut store);
        result.unwrap();
        assert_eq!(ledger.flight_attributes, vec![Attribute::new("Full Attr", 7)]);
    }

    #[test]
    fn test_consumers_of_an_empty_flight_attribute_are_skipped() {
        let empty = scripted("Empty Attr", NodeKind::FlightAttribute, vec![Dependency::required("Fast")], |_, _| {
            Ok(NodeOutput::FlightAttribute(None))
        });
        let uses = scripted("Uses Attr", NodeKind::KeyTimeInstance, vec![Dependency::optional("Empty Attr")], |_, _| {
            panic!("must not run without inputs")
        });
        let downstream = scripted("Downstream", NodeKind::KeyPointValue, vec![Dependency::required("Uses Attr")], |_, _| {
            panic!("must not run without inputs")
        });
        let other = scripted("Other", NodeKind::KeyTimeInstance, vec![Dependency::required("Fast")], |_, _| {
            Ok(NodeOutput::KeyTimeInstances(vec![KeyTimeInstance::new(1.0, "Other")]))
        });
        let mut store = store();
        let (result, ledger) = run(
            vec![empty, uses, downstream, other],
            &["Empty Attr", "Uses Attr", "Downstream", "Other"],
            &mut store,
        );

        result.unwrap();
        assert!(!ledger.contains("Uses Attr"));
        assert!(!ledger.contains("Downstream"));
        assert_eq!(ledger.key_time_instances.len(), 1);
        assert_eq!(ledger.key_time_instances[0].name, "Other");
    }

    #[test]
    fn test_derived_parameter_written_and_consumed_downstream() {
        let derived = scripted("Doubled", NodeKind::DerivedParameter, vec![Dependency::required("Fast")], |frame, deps| {
            let fast = deps.parameter("Fast")?;
            // Two samples too many: trimmed with a warning.
            let mut values: Vec<f64> = fast.array.iter().map(|v| v.unwrap_or(0.0) * 2.0).collect();
            values.extend([0.0, 0.0]);
            Ok(NodeOutput::Parameter { array: Some(MaskedArray::new(values)), frame })
        });
        let consumer = scripted("Consumer", NodeKind::KeyTimeInstance, vec![Dependency::required("Doubled")], |_, deps| {
            assert_eq!(deps.parameter("Doubled")?.array.len(), 100);
            Ok(NodeOutput::KeyTimeInstances(vec![KeyTimeInstance::new(0.0, "Consumer")]))
        });
        let mut store = store();
        let (result, ledger) = run(vec![derived, consumer], &["Doubled", "Consumer"], &mut store);
        result.unwrap();

        let written = store.channel("Doubled").unwrap();
        assert_eq!(written.array.len(), 100);
        assert_eq!(written.offset, 0.25);
        assert_eq!(ledger.key_time_instances.len(), 1);
    }
}
