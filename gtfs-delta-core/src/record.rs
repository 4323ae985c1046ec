//! Typed GTFS records.
//!
//! Rows are parsed by column name through a [`ColumnIndex`] built from the
//! header, so column order may differ between feeds. Each record shape carries
//! its storage column layout as static metadata; backends derive their table
//! definitions from [`columns`].

use std::collections::HashMap;

use thiserror::Error;

use crate::{entity::EntityType, key::KeyPredicate, key::KeyTuple, reference::ForeignKey};

/// Storage type of a record column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Real,
    /// Boolean flag.
    Bool,
}

/// One storage column of a record shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Column name, identical to the GTFS field name.
    pub name: &'static str,
    /// Storage type.
    pub kind: ColumnKind,
    /// Whether the column may hold [`FieldValue::Null`].
    pub nullable: bool,
}

const fn text(name: &'static str) -> Column {
    Column { name, kind: ColumnKind::Text, nullable: false }
}

const fn opt_text(name: &'static str) -> Column {
    Column { name, kind: ColumnKind::Text, nullable: true }
}

const fn integer(name: &'static str) -> Column {
    Column { name, kind: ColumnKind::Integer, nullable: false }
}

const fn opt_integer(name: &'static str) -> Column {
    Column { name, kind: ColumnKind::Integer, nullable: true }
}

const fn real(name: &'static str) -> Column {
    Column { name, kind: ColumnKind::Real, nullable: false }
}

const fn opt_real(name: &'static str) -> Column {
    Column { name, kind: ColumnKind::Real, nullable: true }
}

const fn flag(name: &'static str) -> Column {
    Column { name, kind: ColumnKind::Bool, nullable: false }
}

/// A single typed value handed to storage backends.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent optional value.
    Null,
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Floating-point value.
    Real(f64),
    /// Boolean flag.
    Bool(bool),
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<&Option<String>> for FieldValue {
    fn from(value: &Option<String>) -> Self {
        value.as_ref().map_or(Self::Null, |text| Self::Text(text.clone()))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Null, Self::Integer)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Null, Self::Real)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Errors raised while converting a raw row into a typed record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    /// The header does not name a required column.
    #[error("{entity} row lacks required column '{column}'")]
    MissingColumn {
        /// Entity being parsed.
        entity: EntityType,
        /// Absent column.
        column: &'static str,
    },
    /// A value could not be read as an integer.
    #[error("{entity} column '{column}' holds '{value}', expected an integer")]
    InvalidInteger {
        /// Entity being parsed.
        entity: EntityType,
        /// Offending column.
        column: &'static str,
        /// Raw value.
        value: String,
    },
    /// A value could not be read as a decimal number.
    #[error("{entity} column '{column}' holds '{value}', expected a number")]
    InvalidReal {
        /// Entity being parsed.
        entity: EntityType,
        /// Offending column.
        column: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Header lookup resolving column names to row positions.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    /// Index `header`. When a name repeats, the first occurrence wins.
    #[must_use]
    pub fn new<S: AsRef<str>>(header: &[S]) -> Self {
        let mut positions = HashMap::with_capacity(header.len());
        for (idx, name) in header.iter().enumerate() {
            positions.entry(name.as_ref().to_owned()).or_insert(idx);
        }
        Self { positions }
    }

    /// Position of `column`, if present.
    #[must_use]
    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    /// View `values` through this header for `entity`.
    #[must_use]
    pub const fn row<'a>(&'a self, entity: EntityType, values: &'a [String]) -> RowView<'a> {
        RowView {
            entity,
            index: self,
            values,
        }
    }
}

/// A raw row read through its header.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    entity: EntityType,
    index: &'a ColumnIndex,
    values: &'a [String],
}

impl<'a> RowView<'a> {
    /// Raw value of `column`. Cells past the end of a short row read as
    /// empty; `None` means the header lacks the column.
    #[must_use]
    pub fn raw(&self, column: &str) -> Option<&'a str> {
        let position = self.index.position(column)?;
        Some(self.values.get(position).map_or("", String::as_str))
    }

    fn present(&self, column: &'static str) -> Option<&'a str> {
        self.raw(column).map(str::trim).filter(|value| !value.is_empty())
    }

    fn required(&self, column: &'static str) -> Result<&'a str, RecordError> {
        self.raw(column).ok_or(RecordError::MissingColumn {
            entity: self.entity,
            column,
        })
    }

    fn text(&self, column: &'static str) -> Result<String, RecordError> {
        self.required(column).map(str::to_owned)
    }

    fn opt_text(&self, column: &'static str) -> Option<String> {
        self.present(column).map(str::to_owned)
    }

    fn parse_integer(&self, column: &'static str, value: &str) -> Result<i64, RecordError> {
        value.parse().map_err(|_| RecordError::InvalidInteger {
            entity: self.entity,
            column,
            value: value.to_owned(),
        })
    }

    fn parse_real(&self, column: &'static str, value: &str) -> Result<f64, RecordError> {
        value.parse().map_err(|_| RecordError::InvalidReal {
            entity: self.entity,
            column,
            value: value.to_owned(),
        })
    }

    fn opt_integer(&self, column: &'static str) -> Result<Option<i64>, RecordError> {
        self.present(column)
            .map(|value| self.parse_integer(column, value))
            .transpose()
    }

    fn integer_or_zero(&self, column: &'static str) -> Result<i64, RecordError> {
        Ok(self.opt_integer(column)?.unwrap_or(0))
    }

    fn integer(&self, column: &'static str) -> Result<i64, RecordError> {
        let value = self.required(column)?.trim();
        self.parse_integer(column, value)
    }

    fn opt_real(&self, column: &'static str) -> Result<Option<f64>, RecordError> {
        self.present(column)
            .map(|value| self.parse_real(column, value))
            .transpose()
    }

    fn real_or_zero(&self, column: &'static str) -> Result<f64, RecordError> {
        self.required(column)?;
        Ok(self.opt_real(column)?.unwrap_or(0.0))
    }

    fn real(&self, column: &'static str) -> Result<f64, RecordError> {
        let value = self.required(column)?.trim();
        self.parse_real(column, value)
    }

    fn flag(&self, column: &'static str) -> Result<bool, RecordError> {
        Ok(self.required(column)? == "1")
    }
}

trait GtfsRecord: Sized {
    const COLUMNS: &'static [Column];

    fn parse(row: &RowView<'_>) -> Result<Self, RecordError>;

    fn key(&self) -> KeyTuple;

    fn values(&self) -> Vec<FieldValue>;

    fn references(&self) -> Vec<(ForeignKey, &str)> {
        Vec::new()
    }
}

/// A row of `agency.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agency {
    /// Primary key.
    pub agency_id: String,
    /// Display name.
    pub agency_name: String,
    /// Public website.
    pub agency_url: String,
    /// IANA timezone of the schedule times.
    pub agency_timezone: String,
    /// Primary language code.
    pub agency_lang: Option<String>,
    /// Contact telephone number.
    pub agency_phone: Option<String>,
    /// Page for buying fares.
    pub agency_fare_url: Option<String>,
}

impl GtfsRecord for Agency {
    const COLUMNS: &'static [Column] = &[
        text("agency_id"),
        text("agency_name"),
        text("agency_url"),
        text("agency_timezone"),
        opt_text("agency_lang"),
        opt_text("agency_phone"),
        opt_text("agency_fare_url"),
    ];

    fn parse(row: &RowView<'_>) -> Result<Self, RecordError> {
        Ok(Self {
            agency_id: row.text("agency_id")?,
            agency_name: row.text("agency_name")?,
            agency_url: row.text("agency_url")?,
            agency_timezone: row.text("agency_timezone")?,
            agency_lang: row.opt_text("agency_lang"),
            agency_phone: row.opt_text("agency_phone"),
            agency_fare_url: row.opt_text("agency_fare_url"),
        })
    }

    fn key(&self) -> KeyTuple {
        KeyTuple::new(vec![self.agency_id.clone()])
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            (&self.agency_id).into(),
            (&self.agency_name).into(),
            (&self.agency_url).into(),
            (&self.agency_timezone).into(),
            (&self.agency_lang).into(),
            (&self.agency_phone).into(),
            (&self.agency_fare_url).into(),
        ]
    }
}

/// A row of `stops.txt`. Blank coordinates read as `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    /// Primary key.
    pub stop_id: String,
    /// Short code shown to riders.
    pub stop_code: Option<String>,
    /// Display name.
    pub stop_name: String,
    /// Free-text description.
    pub stop_desc: Option<String>,
    /// WGS84 latitude.
    pub stop_lat: f64,
    /// WGS84 longitude.
    pub stop_lon: f64,
    /// Fare zone.
    pub zone_id: Option<String>,
    /// Page about the stop.
    pub stop_url: Option<String>,
    /// Stop, station or entrance code.
    pub location_type: Option<i64>,
    /// Station holding this stop.
    pub parent_station: Option<String>,
}

impl GtfsRecord for Stop {
    const COLUMNS: &'static [Column] = &[
        text("stop_id"),
        opt_text("stop_code"),
        text("stop_name"),
        opt_text("stop_desc"),
        real("stop_lat"),
        real("stop_lon"),
        opt_text("zone_id"),
        opt_text("stop_url"),
        opt_integer("location_type"),
        opt_text("parent_station"),
    ];

    fn parse(row: &RowView<'_>) -> Result<Self, RecordError> {
        Ok(Self {
            stop_id: row.text("stop_id")?,
            stop_code: row.opt_text("stop_code"),
            stop_name: row.text("stop_name")?,
            stop_desc: row.opt_text("stop_desc"),
            stop_lat: row.real_or_zero("stop_lat")?,
            stop_lon: row.real_or_zero("stop_lon")?,
            zone_id: row.opt_text("zone_id"),
            stop_url: row.opt_text("stop_url"),
            location_type: row.opt_integer("location_type")?,
            parent_station: row.opt_text("parent_station"),
        })
    }

    fn key(&self) -> KeyTuple {
        KeyTuple::new(vec![self.stop_id.clone()])
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            (&self.stop_id).into(),
            (&self.stop_code).into(),
            (&self.stop_name).into(),
            (&self.stop_desc).into(),
            self.stop_lat.into(),
            self.stop_lon.into(),
            (&self.zone_id).into(),
            (&self.stop_url).into(),
            self.location_type.into(),
            (&self.parent_station).into(),
        ]
    }
}

/// A row of `routes.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Primary key.
    pub route_id: String,
    /// Operating agency.
    pub agency_id: String,
    /// Short name such as a line number.
    pub route_short_name: String,
    /// Full name.
    pub route_long_name: String,
    /// Free-text description.
    pub route_desc: Option<String>,
    /// Vehicle mode code.
    pub route_type: i64,
    /// Page about the route.
    pub route_url: Option<String>,
    /// Hex colour of the route.
    pub route_color: Option<String>,
    /// Hex colour of text drawn on `route_color`.
    pub route_text_color: Option<String>,
}

impl GtfsRecord for Route {
    const COLUMNS: &'static [Column] = &[
        text("route_id"),
        text("agency_id"),
        text("route_short_name"),
        text("route_long_name"),
        opt_text("route_desc"),
        integer("route_type"),
        opt_text("route_url"),
        opt_text("route_color"),
        opt_text("route_text_color"),
    ];

    fn parse(row: &RowView<'_>) -> Result<Self, RecordError> {
        row.required("route_type")?;
        Ok(Self {
            route_id: row.text("route_id")?,
            agency_id: row.text("agency_id")?,
            route_short_name: row.text("route_short_name")?,
            route_long_name: row.text("route_long_name")?,
            route_desc: row.opt_text("route_desc"),
            route_type: row.integer_or_zero("route_type")?,
            route_url: row.opt_text("route_url"),
            route_color: row.opt_text("route_color"),
            route_text_color: row.opt_text("route_text_color"),
        })
    }

    fn key(&self) -> KeyTuple {
        KeyTuple::new(vec![self.route_id.clone()])
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            (&self.route_id).into(),
            (&self.agency_id).into(),
            (&self.route_short_name).into(),
            (&self.route_long_name).into(),
            (&self.route_desc).into(),
            self.route_type.into(),
            (&self.route_url).into(),
            (&self.route_color).into(),
            (&self.route_text_color).into(),
        ]
    }

    fn references(&self) -> Vec<(ForeignKey, &str)> {
        vec![(ForeignKey::Agency, self.agency_id.as_str())]
    }
}

/// A row of `trips.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    /// Primary key.
    pub trip_id: String,
    /// Route served.
    pub route_id: String,
    /// Calendar service the trip runs on.
    pub service_id: String,
    /// Destination shown to riders.
    pub trip_headsign: Option<String>,
    /// Public trip number.
    pub trip_short_name: Option<String>,
    /// Travel direction, `0` or `1`.
    pub direction_id: Option<i64>,
    /// Vehicle block shared with other trips.
    pub block_id: Option<String>,
    /// Path drawn for the trip.
    pub shape_id: Option<String>,
    /// Wheelchair accessibility code.
    pub wheelchair_accessible: Option<i64>,
    /// Bicycle allowance code.
    pub bikes_allowed: Option<i64>,
}

impl GtfsRecord for Trip {
    const COLUMNS: &'static [Column] = &[
        text("trip_id"),
        text("route_id"),
        text("service_id"),
        opt_text("trip_headsign"),
        opt_text("trip_short_name"),
        opt_integer("direction_id"),
        opt_text("block_id"),
        opt_text("shape_id"),
        opt_integer("wheelchair_accessible"),
        opt_integer("bikes_allowed"),
    ];

    fn parse(row: &RowView<'_>) -> Result<Self, RecordError> {
        Ok(Self {
            trip_id: row.text("trip_id")?,
            route_id: row.text("route_id")?,
            service_id: row.text("service_id")?,
            trip_headsign: row.opt_text("trip_headsign"),
            trip_short_name: row.opt_text("trip_short_name"),
            direction_id: row.opt_integer("direction_id")?,
            block_id: row.opt_text("block_id"),
            shape_id: row.opt_text("shape_id"),
            wheelchair_accessible: row.opt_integer("wheelchair_accessible")?,
            bikes_allowed: row.opt_integer("bikes_allowed")?,
        })
    }

    fn key(&self) -> KeyTuple {
        KeyTuple::new(vec![self.trip_id.clone()])
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            (&self.trip_id).into(),
            (&self.route_id).into(),
            (&self.service_id).into(),
            (&self.trip_headsign).into(),
            (&self.trip_short_name).into(),
            self.direction_id.into(),
            (&self.block_id).into(),
            (&self.shape_id).into(),
            self.wheelchair_accessible.into(),
            self.bikes_allowed.into(),
        ]
    }

    fn references(&self) -> Vec<(ForeignKey, &str)> {
        vec![
            (ForeignKey::Route, self.route_id.as_str()),
            (ForeignKey::Service, self.service_id.as_str()),
        ]
    }
}

/// A row of `stop_times.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct StopTime {
    /// Trip visiting the stop.
    pub trip_id: String,
    /// Arrival as `HH:MM:SS`, possibly past 24:00.
    pub arrival_time: String,
    /// Departure as `HH:MM:SS`.
    pub departure_time: String,
    /// Stop visited.
    pub stop_id: String,
    /// Position within the trip.
    pub stop_sequence: i64,
    /// Headsign override from this stop.
    pub stop_headsign: Option<String>,
    /// Pickup method code.
    pub pickup_type: Option<i64>,
    /// Drop-off method code.
    pub drop_off_type: Option<i64>,
    /// Distance along the shape.
    pub shape_dist_traveled: Option<f64>,
    /// Whether the times are exact.
    pub timepoint: Option<i64>,
}

impl GtfsRecord for StopTime {
    const COLUMNS: &'static [Column] = &[
        text("trip_id"),
        text("arrival_time"),
        text("departure_time"),
        text("stop_id"),
        integer("stop_sequence"),
        opt_text("stop_headsign"),
        opt_integer("pickup_type"),
        opt_integer("drop_off_type"),
        opt_real("shape_dist_traveled"),
        opt_integer("timepoint"),
    ];

    fn parse(row: &RowView<'_>) -> Result<Self, RecordError> {
        row.required("stop_sequence")?;
        Ok(Self {
            trip_id: row.text("trip_id")?,
            arrival_time: row.text("arrival_time")?,
            departure_time: row.text("departure_time")?,
            stop_id: row.text("stop_id")?,
            stop_sequence: row.integer_or_zero("stop_sequence")?,
            stop_headsign: row.opt_text("stop_headsign"),
            pickup_type: row.opt_integer("pickup_type")?,
            drop_off_type: row.opt_integer("drop_off_type")?,
            shape_dist_traveled: row.opt_real("shape_dist_traveled")?,
            timepoint: row.opt_integer("timepoint")?,
        })
    }

    fn key(&self) -> KeyTuple {
        KeyTuple::new(vec![self.trip_id.clone(), self.stop_sequence.to_string()])
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            (&self.trip_id).into(),
            (&self.arrival_time).into(),
            (&self.departure_time).into(),
            (&self.stop_id).into(),
            self.stop_sequence.into(),
            (&self.stop_headsign).into(),
            self.pickup_type.into(),
            self.drop_off_type.into(),
            self.shape_dist_traveled.into(),
            self.timepoint.into(),
        ]
    }

    fn references(&self) -> Vec<(ForeignKey, &str)> {
        vec![
            (ForeignKey::Trip, self.trip_id.as_str()),
            (ForeignKey::Stop, self.stop_id.as_str()),
        ]
    }
}

/// A row of `calendar.txt`. Weekday flags are set only by the value `1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    /// Primary key.
    pub service_id: String,
    /// Runs on Mondays.
    pub monday: bool,
    /// Runs on Tuesdays.
    pub tuesday: bool,
    /// Runs on Wednesdays.
    pub wednesday: bool,
    /// Runs on Thursdays.
    pub thursday: bool,
    /// Runs on Fridays.
    pub friday: bool,
    /// Runs on Saturdays.
    pub saturday: bool,
    /// Runs on Sundays.
    pub sunday: bool,
    /// First service day, `YYYYMMDD`.
    pub start_date: String,
    /// Last service day, `YYYYMMDD`.
    pub end_date: String,
}

impl GtfsRecord for Calendar {
    const COLUMNS: &'static [Column] = &[
        text("service_id"),
        flag("monday"),
        flag("tuesday"),
        flag("wednesday"),
        flag("thursday"),
        flag("friday"),
        flag("saturday"),
        flag("sunday"),
        text("start_date"),
        text("end_date"),
    ];

    fn parse(row: &RowView<'_>) -> Result<Self, RecordError> {
        Ok(Self {
            service_id: row.text("service_id")?,
            monday: row.flag("monday")?,
            tuesday: row.flag("tuesday")?,
            wednesday: row.flag("wednesday")?,
            thursday: row.flag("thursday")?,
            friday: row.flag("friday")?,
            saturday: row.flag("saturday")?,
            sunday: row.flag("sunday")?,
            start_date: row.text("start_date")?,
            end_date: row.text("end_date")?,
        })
    }

    fn key(&self) -> KeyTuple {
        KeyTuple::new(vec![self.service_id.clone()])
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            (&self.service_id).into(),
            self.monday.into(),
            self.tuesday.into(),
            self.wednesday.into(),
            self.thursday.into(),
            self.friday.into(),
            self.saturday.into(),
            self.sunday.into(),
            (&self.start_date).into(),
            (&self.end_date).into(),
        ]
    }
}

/// A row of `calendar_dates.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDate {
    /// Service the exception applies to.
    pub service_id: String,
    /// Affected day, `YYYYMMDD`.
    pub date: String,
    /// `1` adds the day, `2` removes it.
    pub exception_type: i64,
}

impl GtfsRecord for CalendarDate {
    const COLUMNS: &'static [Column] = &[
        text("service_id"),
        text("date"),
        integer("exception_type"),
    ];

    fn parse(row: &RowView<'_>) -> Result<Self, RecordError> {
        row.required("exception_type")?;
        Ok(Self {
            service_id: row.text("service_id")?,
            date: row.text("date")?,
            exception_type: row.integer_or_zero("exception_type")?,
        })
    }

    fn key(&self) -> KeyTuple {
        KeyTuple::new(vec![self.service_id.clone(), self.date.clone()])
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            (&self.service_id).into(),
            (&self.date).into(),
            self.exception_type.into(),
        ]
    }

    fn references(&self) -> Vec<(ForeignKey, &str)> {
        vec![(ForeignKey::CalendarService, self.service_id.as_str())]
    }
}

/// A row of `transfers.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Stop the rider leaves.
    pub from_stop_id: String,
    /// Stop the rider boards at.
    pub to_stop_id: String,
    /// Transfer rule code.
    pub transfer_type: i64,
    /// Minimum seconds needed to transfer.
    pub min_transfer_time: Option<i64>,
}

impl GtfsRecord for Transfer {
    const COLUMNS: &'static [Column] = &[
        text("from_stop_id"),
        text("to_stop_id"),
        integer("transfer_type"),
        opt_integer("min_transfer_time"),
    ];

    fn parse(row: &RowView<'_>) -> Result<Self, RecordError> {
        Ok(Self {
            from_stop_id: row.text("from_stop_id")?,
            to_stop_id: row.text("to_stop_id")?,
            transfer_type: row.integer_or_zero("transfer_type")?,
            min_transfer_time: row.opt_integer("min_transfer_time")?,
        })
    }

    fn key(&self) -> KeyTuple {
        KeyTuple::new(vec![self.from_stop_id.clone(), self.to_stop_id.clone()])
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            (&self.from_stop_id).into(),
            (&self.to_stop_id).into(),
            self.transfer_type.into(),
            self.min_transfer_time.into(),
        ]
    }

    fn references(&self) -> Vec<(ForeignKey, &str)> {
        vec![
            (ForeignKey::Stop, self.from_stop_id.as_str()),
            (ForeignKey::Stop, self.to_stop_id.as_str()),
        ]
    }
}

/// A row of `shapes.txt`. Coordinates and sequence are mandatory.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapePoint {
    /// Shape the point belongs to.
    pub shape_id: String,
    /// WGS84 latitude.
    pub shape_pt_lat: f64,
    /// WGS84 longitude.
    pub shape_pt_lon: f64,
    /// Position along the shape.
    pub shape_pt_sequence: i64,
    /// Distance from the first point.
    pub shape_dist_traveled: Option<f64>,
}

impl GtfsRecord for ShapePoint {
    const COLUMNS: &'static [Column] = &[
        text("shape_id"),
        real("shape_pt_lat"),
        real("shape_pt_lon"),
        integer("shape_pt_sequence"),
        opt_real("shape_dist_traveled"),
    ];

    fn parse(row: &RowView<'_>) -> Result<Self, RecordError> {
        Ok(Self {
            shape_id: row.text("shape_id")?,
            shape_pt_lat: row.real("shape_pt_lat")?,
            shape_pt_lon: row.real("shape_pt_lon")?,
            shape_pt_sequence: row.integer("shape_pt_sequence")?,
            shape_dist_traveled: row.opt_real("shape_dist_traveled")?,
        })
    }

    fn key(&self) -> KeyTuple {
        KeyTuple::new(vec![
            self.shape_id.clone(),
            self.shape_pt_sequence.to_string(),
        ])
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            (&self.shape_id).into(),
            self.shape_pt_lat.into(),
            self.shape_pt_lon.into(),
            self.shape_pt_sequence.into(),
            self.shape_dist_traveled.into(),
        ]
    }
}

/// A typed row of any supported entity type.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Agency row.
    Agency(Agency),
    /// Stop row.
    Stop(Stop),
    /// Route row.
    Route(Route),
    /// Trip row.
    Trip(Trip),
    /// Stop time row.
    StopTime(StopTime),
    /// Calendar row.
    Calendar(Calendar),
    /// Calendar exception row.
    CalendarDate(CalendarDate),
    /// Transfer row.
    Transfer(Transfer),
    /// Shape point row.
    ShapePoint(ShapePoint),
}

macro_rules! each_record {
    ($record:expr, $inner:ident => $body:expr) => {
        match $record {
            Record::Agency($inner) => $body,
            Record::Stop($inner) => $body,
            Record::Route($inner) => $body,
            Record::Trip($inner) => $body,
            Record::StopTime($inner) => $body,
            Record::Calendar($inner) => $body,
            Record::CalendarDate($inner) => $body,
            Record::Transfer($inner) => $body,
            Record::ShapePoint($inner) => $body,
        }
    };
}

/// Storage columns of `entity`, in [`Record::values`] order.
#[must_use]
pub const fn columns(entity: EntityType) -> &'static [Column] {
    match entity {
        EntityType::Agency => Agency::COLUMNS,
        EntityType::Stop => Stop::COLUMNS,
        EntityType::Route => Route::COLUMNS,
        EntityType::Trip => Trip::COLUMNS,
        EntityType::StopTime => StopTime::COLUMNS,
        EntityType::Calendar => Calendar::COLUMNS,
        EntityType::CalendarDate => CalendarDate::COLUMNS,
        EntityType::Transfer => Transfer::COLUMNS,
        EntityType::Shape => ShapePoint::COLUMNS,
    }
}

impl Record {
    /// Parse `row` as a record of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when a required column is missing from the
    /// header or a numeric field does not parse.
    pub fn parse(entity: EntityType, row: &RowView<'_>) -> Result<Self, RecordError> {
        Ok(match entity {
            EntityType::Agency => Self::Agency(Agency::parse(row)?),
            EntityType::Stop => Self::Stop(Stop::parse(row)?),
            EntityType::Route => Self::Route(Route::parse(row)?),
            EntityType::Trip => Self::Trip(Trip::parse(row)?),
            EntityType::StopTime => Self::StopTime(StopTime::parse(row)?),
            EntityType::Calendar => Self::Calendar(Calendar::parse(row)?),
            EntityType::CalendarDate => Self::CalendarDate(CalendarDate::parse(row)?),
            EntityType::Transfer => Self::Transfer(Transfer::parse(row)?),
            EntityType::Shape => Self::ShapePoint(ShapePoint::parse(row)?),
        })
    }

    /// Entity type of this record.
    #[must_use]
    pub const fn entity(&self) -> EntityType {
        match self {
            Self::Agency(_) => EntityType::Agency,
            Self::Stop(_) => EntityType::Stop,
            Self::Route(_) => EntityType::Route,
            Self::Trip(_) => EntityType::Trip,
            Self::StopTime(_) => EntityType::StopTime,
            Self::Calendar(_) => EntityType::Calendar,
            Self::CalendarDate(_) => EntityType::CalendarDate,
            Self::Transfer(_) => EntityType::Transfer,
            Self::ShapePoint(_) => EntityType::Shape,
        }
    }

    /// Primary-key tuple built from the typed fields.
    #[must_use]
    pub fn key(&self) -> KeyTuple {
        each_record!(self, inner => inner.key())
    }

    /// Field values in [`columns`] order.
    #[must_use]
    pub fn values(&self) -> Vec<FieldValue> {
        each_record!(self, inner => inner.values())
    }

    /// `(column, value)` pairs for storage backends.
    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        columns(self.entity())
            .iter()
            .map(|column| column.name)
            .zip(self.values())
            .collect()
    }

    /// Foreign keys this record needs to resolve.
    #[must_use]
    pub fn references(&self) -> Vec<(ForeignKey, &str)> {
        each_record!(self, inner => inner.references())
    }

    /// Whether the record is the row `predicate` selects.
    ///
    /// Integer key columns compare numerically so `"07"` matches `7`.
    #[must_use]
    pub fn matches(&self, predicate: &KeyPredicate) -> bool {
        if predicate.entity() != self.entity() {
            return false;
        }
        let key = self.key();
        let kinds = predicate.columns().map(|(name, _)| {
            columns(self.entity())
                .iter()
                .find(|column| column.name == name)
                .map_or(ColumnKind::Text, |column| column.kind)
        });
        key.values()
            .iter()
            .zip(predicate.key().values())
            .zip(kinds)
            .all(|((ours, theirs), kind)| match kind {
                ColumnKind::Integer => match (ours.parse::<i64>(), theirs.trim().parse::<i64>()) {
                    (Ok(left), Ok(right)) => left == right,
                    _ => ours == theirs,
                },
                _ => ours == theirs,
            })
    }
}

/// `key` with integer key columns spelled in plain decimal form.
///
/// Two keys the store treats as the same row have the same canonical form,
/// so `("T1", "07")` and `("T1", "7")` collide for stop times.
#[must_use]
pub fn canonical_key(entity: EntityType, key: &KeyTuple) -> KeyTuple {
    entity
        .primary_key()
        .iter()
        .zip(key.values())
        .map(|(name, value)| {
            let integer = columns(entity)
                .iter()
                .any(|column| column.name == *name && column.kind == ColumnKind::Integer);
            match value.trim().parse::<i64>() {
                Ok(number) if integer => number.to_string(),
                _ => value.clone(),
            }
        })
        .collect()
}
