//! Static registry of the GTFS entity types understood by the diff and apply
//! engines.
//!
//! Every per-type fact (file name, storage table, primary-key columns and
//! dependency tier) lives in one registry row so nothing has to be re-derived
//! from table names at apply time.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

/// Dependency tier governing the order in which entity types are applied.
///
/// Tiers are ordered: every type in a later tier may reference types from
/// earlier tiers, never the other way around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Tier 0: entities with no foreign keys (agencies, stops).
    Independent,
    /// Tier 1: routes, which reference agencies.
    Routes,
    /// Tier 2: everything that references routes, trips, stops or services.
    Dependent,
}

impl Tier {
    /// All tiers in apply order.
    pub const ALL: [Self; 3] = [Self::Independent, Self::Routes, Self::Dependent];

    /// Numeric level of the tier (0, 1 or 2).
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Independent => 0,
            Self::Routes => 1,
            Self::Dependent => 2,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.level())
    }
}

/// One tabular category of a GTFS feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityType {
    /// `agency.txt`
    Agency,
    /// `stops.txt`
    Stop,
    /// `routes.txt`
    Route,
    /// `trips.txt`
    Trip,
    /// `stop_times.txt`
    StopTime,
    /// `calendar.txt`
    Calendar,
    /// `calendar_dates.txt`
    CalendarDate,
    /// `transfers.txt`
    Transfer,
    /// `shapes.txt`
    Shape,
}

struct EntityLayout {
    stem: &'static str,
    file_name: &'static str,
    table: &'static str,
    primary_key: &'static [&'static str],
    tier: Tier,
}

const AGENCY: EntityLayout = EntityLayout {
    stem: "agency",
    file_name: "agency.txt",
    table: "agencies",
    primary_key: &["agency_id"],
    tier: Tier::Independent,
};

const STOP: EntityLayout = EntityLayout {
    stem: "stops",
    file_name: "stops.txt",
    table: "stops",
    primary_key: &["stop_id"],
    tier: Tier::Independent,
};

const ROUTE: EntityLayout = EntityLayout {
    stem: "routes",
    file_name: "routes.txt",
    table: "routes",
    primary_key: &["route_id"],
    tier: Tier::Routes,
};

const TRIP: EntityLayout = EntityLayout {
    stem: "trips",
    file_name: "trips.txt",
    table: "trips",
    primary_key: &["trip_id"],
    tier: Tier::Dependent,
};

const STOP_TIME: EntityLayout = EntityLayout {
    stem: "stop_times",
    file_name: "stop_times.txt",
    table: "stop_times",
    primary_key: &["trip_id", "stop_sequence"],
    tier: Tier::Dependent,
};

const CALENDAR: EntityLayout = EntityLayout {
    stem: "calendar",
    file_name: "calendar.txt",
    table: "calendars",
    primary_key: &["service_id"],
    tier: Tier::Dependent,
};

const CALENDAR_DATE: EntityLayout = EntityLayout {
    stem: "calendar_dates",
    file_name: "calendar_dates.txt",
    table: "calendar_dates",
    primary_key: &["service_id", "date"],
    tier: Tier::Dependent,
};

const TRANSFER: EntityLayout = EntityLayout {
    stem: "transfers",
    file_name: "transfers.txt",
    table: "transfers",
    primary_key: &["from_stop_id", "to_stop_id"],
    tier: Tier::Dependent,
};

const SHAPE: EntityLayout = EntityLayout {
    stem: "shapes",
    file_name: "shapes.txt",
    table: "shapes",
    primary_key: &["shape_id", "shape_pt_sequence"],
    tier: Tier::Dependent,
};

impl EntityType {
    /// Every entity type, listed in apply order.
    pub const ALL: [Self; 9] = [
        Self::Agency,
        Self::Stop,
        Self::Route,
        Self::Trip,
        Self::StopTime,
        Self::Calendar,
        Self::CalendarDate,
        Self::Transfer,
        Self::Shape,
    ];

    const fn layout(self) -> &'static EntityLayout {
        match self {
            Self::Agency => &AGENCY,
            Self::Stop => &STOP,
            Self::Route => &ROUTE,
            Self::Trip => &TRIP,
            Self::StopTime => &STOP_TIME,
            Self::Calendar => &CALENDAR,
            Self::CalendarDate => &CALENDAR_DATE,
            Self::Transfer => &TRANSFER,
            Self::Shape => &SHAPE,
        }
    }

    /// File stem used for diff package members and summary keys (`stops`).
    #[must_use]
    pub const fn stem(self) -> &'static str {
        self.layout().stem
    }

    /// Member name inside a GTFS feed archive (`stops.txt`).
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        self.layout().file_name
    }

    /// Storage table receiving rows of this type.
    #[must_use]
    pub const fn table(self) -> &'static str {
        self.layout().table
    }

    /// Ordered primary-key column names (one or two columns).
    #[must_use]
    pub const fn primary_key(self) -> &'static [&'static str] {
        self.layout().primary_key
    }

    /// Dependency tier of this type.
    #[must_use]
    pub const fn tier(self) -> Tier {
        self.layout().tier
    }

    /// Whether the primary key spans more than one column.
    #[must_use]
    pub const fn has_composite_key(self) -> bool {
        self.primary_key().len() > 1
    }

    /// Entity types belonging to `tier`, in apply order.
    pub fn in_tier(tier: Tier) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |entity| entity.tier() == tier)
    }

    /// Look up an entity type by its feed member name (`stop_times.txt`).
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|entity| entity.file_name() == name)
    }

    /// Look up an entity type by its stem (`stop_times`).
    #[must_use]
    pub fn from_stem(stem: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|entity| entity.stem() == stem)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// Raised when a name does not correspond to any known entity type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown GTFS entity type '{name}'")]
pub struct UnknownEntityError {
    /// The unrecognised name.
    pub name: String,
}

impl FromStr for EntityType {
    type Err = UnknownEntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_stem(s)
            .or_else(|| Self::from_file_name(s))
            .ok_or_else(|| UnknownEntityError { name: s.to_owned() })
    }
}

impl Serialize for EntityType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.stem())
    }
}

impl<'de> Deserialize<'de> for EntityType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::from_stem(&name).ok_or_else(|| de::Error::custom(UnknownEntityError { name }))
    }
}
