//! Test-only, in-memory `TransitStore` implementation and record builders
//! used by unit and behaviour tests.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::{
    entity::EntityType,
    key::{KeyPredicate, KeyTuple},
    record::{Agency, Calendar, Record, Route, ShapePoint, Stop, StopTime, Trip},
    snapshot::{FeedSnapshot, Snapshot, SnapshotError},
    store::TransitStore,
};

/// Failure injected into [`MemoryStore`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemoryStoreError {
    /// The call was configured to fail.
    #[error("upsert call {call} rejected")]
    InjectedFailure {
        /// Zero-based upsert call number.
        call: usize,
    },
    /// A record with a rejected key was submitted.
    #[error("{entity} key {key} rejected")]
    RejectedKey {
        /// Entity of the rejected record.
        entity: EntityType,
        /// Rejected key.
        key: KeyTuple,
    },
}

/// One call received by [`MemoryStore`], in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCall {
    /// An upsert against the entity's table.
    Upsert(EntityType),
    /// A single-key delete against the entity's table.
    Delete(EntityType),
}

/// In-memory store with call logging and failure injection.
///
/// Upserts are all-or-nothing per call, like a transactional backend.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: BTreeMap<EntityType, BTreeMap<KeyTuple, Record>>,
    failing_calls: BTreeSet<usize>,
    rejected: BTreeSet<(EntityType, KeyTuple)>,
    upsert_calls: Vec<usize>,
    delete_calls: usize,
    journal: Vec<StoreCall>,
}

impl MemoryStore {
    /// Store `records` directly, bypassing call logging.
    pub fn seed(&mut self, records: &[Record]) {
        for record in records {
            self.tables
                .entry(record.entity())
                .or_default()
                .insert(record.key(), record.clone());
        }
    }

    /// Fail the upsert call with zero-based number `call`.
    pub fn fail_upsert_call(&mut self, call: usize) {
        self.failing_calls.insert(call);
    }

    /// Fail every upsert or delete that touches `key`.
    pub fn reject_key<I, S>(&mut self, entity: EntityType, key: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rejected.insert((entity, key.into_iter().collect()));
    }

    /// Sizes of every upsert call in order.
    #[must_use]
    pub fn upsert_calls(&self) -> Vec<usize> {
        self.upsert_calls.clone()
    }

    /// Number of delete calls.
    #[must_use]
    pub const fn delete_calls(&self) -> usize {
        self.delete_calls
    }

    /// Every upsert and delete call in arrival order.
    #[must_use]
    pub fn journal(&self) -> &[StoreCall] {
        &self.journal
    }

    /// Rows held for `entity`.
    #[must_use]
    pub fn len(&self, entity: EntityType) -> usize {
        self.tables.get(&entity).map_or(0, BTreeMap::len)
    }

    /// Whether the store holds no rows at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.values().all(BTreeMap::is_empty)
    }

    /// Records of `entity` in key order.
    pub fn records(&self, entity: EntityType) -> impl Iterator<Item = &Record> {
        self.tables.get(&entity).into_iter().flat_map(BTreeMap::values)
    }

    /// Whether a row with `key` exists for `entity`.
    #[must_use]
    pub fn contains<I, S>(&self, entity: EntityType, key: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key: KeyTuple = key.into_iter().collect();
        self.tables
            .get(&entity)
            .is_some_and(|table| table.contains_key(&key))
    }
}

impl TransitStore for MemoryStore {
    type Error = MemoryStoreError;

    fn upsert(&mut self, entity: EntityType, records: &[Record]) -> Result<usize, Self::Error> {
        let call = self.upsert_calls.len();
        self.upsert_calls.push(records.len());
        self.journal.push(StoreCall::Upsert(entity));
        if self.failing_calls.contains(&call) {
            return Err(MemoryStoreError::InjectedFailure { call });
        }
        if let Some(key) = records
            .iter()
            .map(Record::key)
            .find(|key| self.rejected.contains(&(entity, key.clone())))
        {
            return Err(MemoryStoreError::RejectedKey { entity, key });
        }
        self.seed(records);
        Ok(records.len())
    }

    fn delete(&mut self, predicate: &KeyPredicate) -> Result<(), Self::Error> {
        self.delete_calls += 1;
        let entity = predicate.entity();
        self.journal.push(StoreCall::Delete(entity));
        if self.rejected.contains(&(entity, predicate.key().clone())) {
            return Err(MemoryStoreError::RejectedKey {
                entity,
                key: predicate.key().clone(),
            });
        }
        if let Some(table) = self.tables.get_mut(&entity) {
            table.retain(|_, record| !record.matches(predicate));
        }
        Ok(())
    }
}

/// Build a feed from `(entity, csv)` pairs.
///
/// # Errors
///
/// Returns [`SnapshotError`] when a CSV text does not load.
pub fn feed_from_csv(tables: &[(EntityType, &str)]) -> Result<FeedSnapshot, SnapshotError> {
    tables
        .iter()
        .map(|(entity, csv)| Snapshot::from_reader(*entity, csv.as_bytes()))
        .collect::<Result<Vec<_>, _>>()
        .map(FeedSnapshot::from_iter)
}

/// An agency record with placeholder contact details.
#[must_use]
pub fn agency(agency_id: &str) -> Record {
    Record::Agency(Agency {
        agency_id: agency_id.to_owned(),
        agency_name: format!("Agency {agency_id}"),
        agency_url: "https://example.invalid".to_owned(),
        agency_timezone: "Europe/London".to_owned(),
        agency_lang: None,
        agency_phone: None,
        agency_fare_url: None,
    })
}

/// A stop record at the origin.
#[must_use]
pub fn stop(stop_id: &str, stop_name: &str) -> Record {
    Record::Stop(Stop {
        stop_id: stop_id.to_owned(),
        stop_code: None,
        stop_name: stop_name.to_owned(),
        stop_desc: None,
        stop_lat: 0.0,
        stop_lon: 0.0,
        zone_id: None,
        stop_url: None,
        location_type: None,
        parent_station: None,
    })
}

/// A bus route run by `agency_id`.
#[must_use]
pub fn route(route_id: &str, agency_id: &str) -> Record {
    Record::Route(Route {
        route_id: route_id.to_owned(),
        agency_id: agency_id.to_owned(),
        route_short_name: route_id.to_owned(),
        route_long_name: format!("Route {route_id}"),
        route_desc: None,
        route_type: 3,
        route_url: None,
        route_color: None,
        route_text_color: None,
    })
}

/// A trip on `route_id` under `service_id`.
#[must_use]
pub fn trip(trip_id: &str, route_id: &str, service_id: &str) -> Record {
    Record::Trip(Trip {
        trip_id: trip_id.to_owned(),
        route_id: route_id.to_owned(),
        service_id: service_id.to_owned(),
        trip_headsign: None,
        trip_short_name: None,
        direction_id: None,
        block_id: None,
        shape_id: None,
        wheelchair_accessible: None,
        bikes_allowed: None,
    })
}

/// A stop time for `trip_id` at `stop_id`.
#[must_use]
pub fn stop_time(trip_id: &str, stop_sequence: i64, stop_id: &str) -> Record {
    Record::StopTime(StopTime {
        trip_id: trip_id.to_owned(),
        arrival_time: "08:00:00".to_owned(),
        departure_time: "08:00:00".to_owned(),
        stop_id: stop_id.to_owned(),
        stop_sequence,
        stop_headsign: None,
        pickup_type: None,
        drop_off_type: None,
        shape_dist_traveled: None,
        timepoint: None,
    })
}

/// A weekday service.
#[must_use]
pub fn calendar(service_id: &str) -> Record {
    Record::Calendar(Calendar {
        service_id: service_id.to_owned(),
        monday: true,
        tuesday: true,
        wednesday: true,
        thursday: true,
        friday: true,
        saturday: false,
        sunday: false,
        start_date: "20240101".to_owned(),
        end_date: "20241231".to_owned(),
    })
}

/// A shape point.
#[must_use]
pub fn shape_point(shape_id: &str, sequence: i64) -> Record {
    Record::ShapePoint(ShapePoint {
        shape_id: shape_id.to_owned(),
        shape_pt_lat: 51.5,
        shape_pt_lon: -0.1,
        shape_pt_sequence: sequence,
        shape_dist_traveled: None,
    })
}
