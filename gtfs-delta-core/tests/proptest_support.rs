//! Proptest strategies producing small GTFS feeds.
//!
//! Keys are drawn from narrow alphabets so that generated old and new tables
//! overlap often enough to exercise additions, modifications and deletions.
//! Any table may be left out of a feed, and integer key columns are written
//! with a varying number of leading zeros. Child rows are kept only when the
//! parents they reference are present in the same feed.

use std::collections::{BTreeMap, BTreeSet};

use gtfs_delta_core::{EntityType, FeedSnapshot, Snapshot};
use proptest::prelude::*;

type StopTimeRow = (String, u8, usize);

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

/// Decimal `value` with `zeros` extra leading zeros (`7`, `07`, `007`).
fn spelled(value: u8, zeros: usize) -> String {
    format!("{}{value}", "0".repeat(zeros))
}

fn optional<S: Strategy>(table: S) -> impl Strategy<Value = Option<S::Value>> {
    proptest::option::weighted(0.8, table)
}

fn ids<K: Clone + Ord, V>(table: Option<&BTreeMap<K, V>>) -> BTreeSet<K> {
    table
        .map(|rows| rows.keys().cloned().collect())
        .unwrap_or_default()
}

fn retain<K: Ord, V>(
    table: Option<BTreeMap<K, V>>,
    keep: impl Fn(&K, &V) -> bool,
) -> Option<BTreeMap<K, V>> {
    table.map(|mut rows| {
        rows.retain(|key, value| keep(key, value));
        rows
    })
}

fn snapshot(entity: EntityType, header: &[&str], rows: Vec<Vec<String>>) -> Snapshot {
    Snapshot::from_rows(entity, owned(header), rows).expect("generated rows carry their key")
}

/// Agencies keyed `A0`..`A3` with short names.
fn agency_table() -> impl Strategy<Value = BTreeMap<String, String>> {
    proptest::collection::btree_map("A[0-3]", "[a-c]{1,2}", 0..4)
}

/// Stops keyed `S0`..`S7` with short names.
fn stop_table() -> impl Strategy<Value = BTreeMap<String, String>> {
    proptest::collection::btree_map("S[0-7]", "[a-c]{0,2}", 0..8)
}

/// Routes keyed `R0`..`R3` with their agency and short name.
fn route_table() -> impl Strategy<Value = BTreeMap<String, (String, String)>> {
    proptest::collection::btree_map("R[0-3]", ("A[0-3]", "[a-c]{1,2}"), 0..4)
}

/// Calendar services `W0`..`W2` with a Monday flag.
fn calendar_table() -> impl Strategy<Value = BTreeMap<String, bool>> {
    proptest::collection::btree_map("W[0-2]", any::<bool>(), 0..3)
}

/// Calendar exceptions keyed by service and day of January.
fn calendar_date_table() -> impl Strategy<Value = BTreeMap<(String, u8), u8>> {
    proptest::collection::btree_map(("W[0-2]", 1_u8..5), 1_u8..3, 0..6)
}

/// Trips keyed `T0`..`T3` with their route and service.
fn trip_table() -> impl Strategy<Value = BTreeMap<String, (String, String)>> {
    proptest::collection::btree_map("T[0-3]", ("R[0-3]", "W[0-2]"), 0..4)
}

/// Stop times keyed by trip and sequence, holding the stop, the departure
/// minute and the leading zeros written before the sequence.
fn stop_time_table() -> impl Strategy<Value = BTreeMap<(String, u8), StopTimeRow>> {
    proptest::collection::btree_map(("T[0-3]", 0_u8..12), ("S[0-7]", 0_u8..60, 0_usize..3), 0..16)
}

/// Transfers keyed by stop pair with a transfer type.
fn transfer_table() -> impl Strategy<Value = BTreeMap<(String, String), u8>> {
    proptest::collection::btree_map(("S[0-7]", "S[0-7]"), 0_u8..4, 0..6)
}

/// Shape points keyed by shape id and a single-digit sequence, holding a
/// latitude digit and the leading zeros written before the sequence.
fn shape_table() -> impl Strategy<Value = BTreeMap<(String, u8), (u8, usize)>> {
    proptest::collection::btree_map(("[XY]", 0_u8..6), (0_u8..3, 0_usize..3), 0..10)
}

fn agency_snapshot(rows: &BTreeMap<String, String>) -> Snapshot {
    snapshot(
        EntityType::Agency,
        &["agency_id", "agency_name", "agency_url", "agency_timezone"],
        rows.iter()
            .map(|(id, name)| {
                vec![
                    id.clone(),
                    name.clone(),
                    "https://example.invalid".to_owned(),
                    "UTC".to_owned(),
                ]
            })
            .collect(),
    )
}

fn stops_snapshot(rows: &BTreeMap<String, String>) -> Snapshot {
    snapshot(
        EntityType::Stop,
        &["stop_id", "stop_name", "stop_lat", "stop_lon"],
        rows.iter()
            .map(|(id, name)| vec![id.clone(), name.clone(), "51.5".to_owned(), "-0.1".to_owned()])
            .collect(),
    )
}

fn routes_snapshot(rows: &BTreeMap<String, (String, String)>) -> Snapshot {
    snapshot(
        EntityType::Route,
        &["route_id", "agency_id", "route_short_name", "route_long_name", "route_type"],
        rows.iter()
            .map(|(id, (agency, name))| {
                vec![id.clone(), agency.clone(), name.clone(), "Line".to_owned(), "3".to_owned()]
            })
            .collect(),
    )
}

fn calendar_snapshot(rows: &BTreeMap<String, bool>) -> Snapshot {
    snapshot(
        EntityType::Calendar,
        &[
            "service_id", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday",
            "sunday", "start_date", "end_date",
        ],
        rows.iter()
            .map(|(id, monday)| {
                let mut row = vec![id.clone(), u8::from(*monday).to_string()];
                row.extend(owned(&["1", "1", "1", "1", "0", "0", "20240101", "20241231"]));
                row
            })
            .collect(),
    )
}

fn calendar_dates_snapshot(rows: &BTreeMap<(String, u8), u8>) -> Snapshot {
    snapshot(
        EntityType::CalendarDate,
        &["service_id", "date", "exception_type"],
        rows.iter()
            .map(|((service, day), exception)| {
                vec![service.clone(), format!("202401{day:02}"), exception.to_string()]
            })
            .collect(),
    )
}

fn trips_snapshot(rows: &BTreeMap<String, (String, String)>) -> Snapshot {
    snapshot(
        EntityType::Trip,
        &["trip_id", "route_id", "service_id"],
        rows.iter()
            .map(|(id, (route, service))| vec![id.clone(), route.clone(), service.clone()])
            .collect(),
    )
}

fn stop_times_snapshot(rows: &BTreeMap<(String, u8), StopTimeRow>) -> Snapshot {
    snapshot(
        EntityType::StopTime,
        &["trip_id", "arrival_time", "departure_time", "stop_id", "stop_sequence"],
        rows.iter()
            .map(|((trip, sequence), (stop, minute, zeros))| {
                let time = format!("08:{minute:02}:00");
                vec![trip.clone(), time.clone(), time, stop.clone(), spelled(*sequence, *zeros)]
            })
            .collect(),
    )
}

fn transfers_snapshot(rows: &BTreeMap<(String, String), u8>) -> Snapshot {
    snapshot(
        EntityType::Transfer,
        &["from_stop_id", "to_stop_id", "transfer_type"],
        rows.iter()
            .map(|((from, to), kind)| vec![from.clone(), to.clone(), kind.to_string()])
            .collect(),
    )
}

fn shapes_snapshot(rows: &BTreeMap<(String, u8), (u8, usize)>) -> Snapshot {
    snapshot(
        EntityType::Shape,
        &["shape_id", "shape_pt_lat", "shape_pt_lon", "shape_pt_sequence"],
        rows.iter()
            .map(|((shape, sequence), (lat, zeros))| {
                vec![
                    shape.clone(),
                    format!("51.{lat}"),
                    "-0.1".to_owned(),
                    spelled(*sequence, *zeros),
                ]
            })
            .collect(),
    )
}

/// A feed drawing on every entity type, any of which may be absent.
pub fn feed_strategy() -> impl Strategy<Value = FeedSnapshot> {
    (
        optional(agency_table()),
        optional(stop_table()),
        optional(route_table()),
        optional(calendar_table()),
        optional(calendar_date_table()),
        optional(trip_table()),
        optional(stop_time_table()),
        optional(transfer_table()),
        optional(shape_table()),
    )
        .prop_map(
            |(agencies, stops, routes, calendars, dates, trips, stop_times, transfers, shapes)| {
                let agency_ids = ids(agencies.as_ref());
                let stop_ids = ids(stops.as_ref());
                let routes = retain(routes, |_, (agency, _)| agency_ids.contains(agency));
                let route_ids = ids(routes.as_ref());
                let calendar_ids = ids(calendars.as_ref());
                let dates = retain(dates, |(service, _), _| calendar_ids.contains(service));
                let mut service_ids = calendar_ids.clone();
                service_ids.extend(ids(dates.as_ref()).into_iter().map(|(service, _)| service));
                let trips = retain(trips, |_, (route, service)| {
                    route_ids.contains(route) && service_ids.contains(service)
                });
                let trip_ids = ids(trips.as_ref());
                let stop_times = retain(stop_times, |(trip, _), (stop, _, _)| {
                    trip_ids.contains(trip) && stop_ids.contains(stop)
                });
                let transfers = retain(transfers, |(from, to), _| {
                    stop_ids.contains(from) && stop_ids.contains(to)
                });

                [
                    agencies.as_ref().map(agency_snapshot),
                    stops.as_ref().map(stops_snapshot),
                    routes.as_ref().map(routes_snapshot),
                    calendars.as_ref().map(calendar_snapshot),
                    dates.as_ref().map(calendar_dates_snapshot),
                    trips.as_ref().map(trips_snapshot),
                    stop_times.as_ref().map(stop_times_snapshot),
                    transfers.as_ref().map(transfers_snapshot),
                    shapes.as_ref().map(shapes_snapshot),
                ]
                .into_iter()
                .flatten()
                .collect()
            },
        )
}
