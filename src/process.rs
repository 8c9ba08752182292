//! The per-flight run: graph, caching, derivation, annotation, bookkeeping.

use crate::analysis::{cache_candidates, geo_locate, position_channels, timestamp};
use crate::compute::{Engine, FlightResults, Ledger, ProcessError};
use crate::graph::dag::DependencyGraph;
use crate::settings::Settings;
use crate::store::aircraft::{AchievedFlightRecord, AircraftInfo};
use crate::store::registry::{NodeManager, NodeRegistry};
use crate::store::source::{FlightDataStore, Session};
use crate::store::types::NodeKind;
use chrono::{DateTime, Utc};

/// Called once per flight with the open store, the aircraft and the
/// processing order, before any node runs.
pub type PreFlightHook = Box<dyn Fn(&mut dyn FlightDataStore, &AircraftInfo, &[String]) + Send + Sync>;

pub struct FlightProcessor {
    registry: NodeRegistry,
    settings: Settings,
    pre_flight_hook: Option<PreFlightHook>,
}

impl FlightProcessor {
    pub fn new(registry: NodeRegistry, settings: Settings) -> Self {
        Self { registry, settings, pre_flight_hook: None }
    }

    pub fn with_pre_flight_hook(
        mut self,
        hook: impl Fn(&mut dyn FlightDataStore, &AircraftInfo, &[String]) + Send + Sync + 'static,
    ) -> Self {
        self.pre_flight_hook = Some(Box::new(hook));
        self
    }

    pub fn registry(&self) -> &NodeRegistry { &self.registry }
    pub fn settings(&self) -> &Settings { &self.settings }

    /// Targets that are dropped quietly when they cannot be derived.
    ///
    /// With no required outputs every registered node is such a target;
    /// otherwise only flight attributes are, when enabled.
    fn lenient_targets(&self, required: &[String]) -> Vec<String> {
        if required.is_empty() {
            return self.registry.names().map(str::to_string).collect();
        }
        if !self.settings.include_flight_attributes {
            return Vec::new();
        }
        self.registry
            .names_of_kind(NodeKind::FlightAttribute)
            .into_iter()
            .filter(|name| !required.contains(name))
            .collect()
    }

    /// Derives every output reachable from `required` (or the whole registry
    /// when `required` is empty) for one flight.
    ///
    /// The store is opened for the duration of the call and closed on every
    /// exit path.
    pub fn process_flight<S: FlightDataStore>(
        &self,
        store: &mut S,
        aircraft_info: &AircraftInfo,
        start_datetime: DateTime<Utc>,
        achieved_flight_record: &AchievedFlightRecord,
        required: &[String],
    ) -> Result<FlightResults, ProcessError> {
        let tail_number = aircraft_info.tail_number.as_deref().unwrap_or("unknown");
        let span = tracing::info_span!("process_flight", tail_number = %tail_number);
        let _enter = span.enter();

        let mut session = Session::open(store)?;

        let manager = NodeManager::new(
            start_datetime,
            session.valid_channel_names(),
            required.to_vec(),
            self.registry.clone(),
            aircraft_info,
            achieved_flight_record,
        );
        let graph = DependencyGraph::build(&manager, &self.lenient_targets(required))?;
        let order = graph.process_order();

        let cached = cache_candidates(&graph, &manager, self.settings.cache_param_min_usage);
        if !cached.is_empty() {
            tracing::info!(channels = ?cached, "Store set to cache parameters");
            session.set_cache_channels(cached);
        }

        match &self.pre_flight_hook {
            Some(hook) => {
                tracing::info!("Performing pre-flight analysis actions");
                hook(&mut *session, aircraft_info, order);
            }
            None => tracing::info!("No pre-flight analysis actions to perform"),
        }

        let mut ledger = Ledger::new();
        Engine::new(&manager, &mut *session).run(order, &mut ledger)?;
        let mut results = ledger.into_results();

        if let Some((latitude, longitude)) = position_channels(&mut *session)? {
            geo_locate(&mut results.key_time_instances, &latitude, &longitude);
            if self.settings.geo_locate_key_point_values {
                geo_locate(&mut results.key_point_values, &latitude, &longitude);
            }
        }
        timestamp(&mut results.key_time_instances, start_datetime)?;
        timestamp(&mut results.key_point_values, start_datetime)?;

        session.set_version(env!("CARGO_PKG_VERSION"))?;
        session.set_dependency_tree(&graph.adjacencies())?;

        tracing::info!(
            flight_attributes = results.flight_attributes.len(),
            key_time_instances = results.key_time_instances.len(),
            key_point_values = results.key_point_values.len(),
            sections = results.sections.len(),
            "Flight processed"
        );
        Ok(results)
    }
}
