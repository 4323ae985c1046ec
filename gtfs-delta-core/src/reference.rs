//! Known-valid parent keys used for referential validation during apply.
//!
//! The cache is loaded once before a run and never mutated by the apply
//! engine. Rows written earlier in the same run are therefore invisible to
//! later tiers until the caller reloads the cache.

use std::{collections::BTreeSet, convert::Infallible, fmt};

use crate::{entity::EntityType, record::Record, snapshot::FeedSnapshot};

/// Kind of parent a record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ForeignKey {
    /// `agency_id` of an agency.
    Agency,
    /// `stop_id` of a stop.
    Stop,
    /// `route_id` of a route.
    Route,
    /// `trip_id` of a trip.
    Trip,
    /// A service id from either `calendar.txt` or `calendar_dates.txt`.
    Service,
    /// A service id from `calendar.txt` only.
    CalendarService,
}

impl fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Agency => "agency",
            Self::Stop => "stop",
            Self::Route => "route",
            Self::Trip => "trip",
            Self::Service => "service",
            Self::CalendarService => "calendar service",
        })
    }
}

/// Why a changed row was not submitted for writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SkipReason {
    /// The row refers to a parent absent from the cache.
    MissingReference(ForeignKey),
    /// The row could not be converted into a typed record.
    Malformed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingReference(fk) => write!(f, "missing {fk} reference"),
            Self::Malformed => f.write_str("malformed row"),
        }
    }
}

/// One key set held by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReferenceSet {
    /// Known agency ids.
    Agencies,
    /// Known stop ids.
    Stops,
    /// Known route ids.
    Routes,
    /// Known trip ids.
    Trips,
    /// Service ids defined in `calendar.txt`.
    CalendarServices,
    /// Service ids defined in `calendar_dates.txt`.
    CalendarDateServices,
}

impl ReferenceSet {
    /// Every set, in load order.
    pub const ALL: [Self; 6] = [
        Self::Agencies,
        Self::Stops,
        Self::Routes,
        Self::Trips,
        Self::CalendarServices,
        Self::CalendarDateServices,
    ];

    /// Entity type and column the set is drawn from.
    #[must_use]
    pub const fn source(self) -> (EntityType, &'static str) {
        match self {
            Self::Agencies => (EntityType::Agency, "agency_id"),
            Self::Stops => (EntityType::Stop, "stop_id"),
            Self::Routes => (EntityType::Route, "route_id"),
            Self::Trips => (EntityType::Trip, "trip_id"),
            Self::CalendarServices => (EntityType::Calendar, "service_id"),
            Self::CalendarDateServices => (EntityType::CalendarDate, "service_id"),
        }
    }
}

/// Read-only snapshot of the parent keys the store already holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceCache {
    agencies: BTreeSet<String>,
    stops: BTreeSet<String>,
    routes: BTreeSet<String>,
    trips: BTreeSet<String>,
    calendar_services: BTreeSet<String>,
    calendar_date_services: BTreeSet<String>,
}

impl ReferenceCache {
    /// An empty cache that rejects every reference.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn set_mut(&mut self, set: ReferenceSet) -> &mut BTreeSet<String> {
        match set {
            ReferenceSet::Agencies => &mut self.agencies,
            ReferenceSet::Stops => &mut self.stops,
            ReferenceSet::Routes => &mut self.routes,
            ReferenceSet::Trips => &mut self.trips,
            ReferenceSet::CalendarServices => &mut self.calendar_services,
            ReferenceSet::CalendarDateServices => &mut self.calendar_date_services,
        }
    }

    /// Keys held in `set`.
    #[must_use]
    pub const fn set(&self, set: ReferenceSet) -> &BTreeSet<String> {
        match set {
            ReferenceSet::Agencies => &self.agencies,
            ReferenceSet::Stops => &self.stops,
            ReferenceSet::Routes => &self.routes,
            ReferenceSet::Trips => &self.trips,
            ReferenceSet::CalendarServices => &self.calendar_services,
            ReferenceSet::CalendarDateServices => &self.calendar_date_services,
        }
    }

    /// Add `keys` to `set`, returning the cache for chaining.
    #[must_use]
    pub fn with_keys<I, S>(mut self, set: ReferenceSet, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extend(set, keys);
        self
    }

    /// Add `keys` to `set`.
    pub fn extend<I, S>(&mut self, set: ReferenceSet, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_mut(set).extend(keys.into_iter().map(Into::into));
    }

    /// Whether `value` resolves as a reference of kind `fk`.
    #[must_use]
    pub fn contains(&self, fk: ForeignKey, value: &str) -> bool {
        match fk {
            ForeignKey::Agency => self.agencies.contains(value),
            ForeignKey::Stop => self.stops.contains(value),
            ForeignKey::Route => self.routes.contains(value),
            ForeignKey::Trip => self.trips.contains(value),
            ForeignKey::Service => {
                self.calendar_services.contains(value)
                    || self.calendar_date_services.contains(value)
            }
            ForeignKey::CalendarService => self.calendar_services.contains(value),
        }
    }

    /// Derive a cache from the key columns of a full feed.
    ///
    /// Used when the feed itself is the truth being loaded, as in a reset.
    #[must_use]
    pub fn from_feed(feed: &FeedSnapshot) -> Self {
        let mut cache = Self::new();
        for set in ReferenceSet::ALL {
            let (entity, column) = set.source();
            let Some(snapshot) = feed.get(entity) else {
                continue;
            };
            let Some(position) = snapshot.column_position(column) else {
                continue;
            };
            cache.extend(
                set,
                snapshot
                    .rows()
                    .filter_map(|(_, row)| row.values().get(position).cloned()),
            );
        }
        cache
    }
}

/// Source of the reference cache for one apply run.
pub trait ReferenceCacheProvider {
    /// Error raised when the cache cannot be loaded.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the current parent key sets.
    ///
    /// # Errors
    ///
    /// Returns the provider's error when its backing source is unreadable.
    fn load(&self) -> Result<ReferenceCache, Self::Error>;
}

impl ReferenceCacheProvider for ReferenceCache {
    type Error = Infallible;

    fn load(&self) -> Result<ReferenceCache, Self::Error> {
        Ok(self.clone())
    }
}

impl ReferenceCacheProvider for FeedSnapshot {
    type Error = Infallible;

    fn load(&self) -> Result<ReferenceCache, Self::Error> {
        Ok(ReferenceCache::from_feed(self))
    }
}

/// Check every foreign key of `record` against `cache`.
///
/// # Errors
///
/// Returns the skip reason for the first unresolved reference.
pub fn check_references(record: &Record, cache: &ReferenceCache) -> Result<(), SkipReason> {
    record
        .references()
        .into_iter()
        .find(|(fk, value)| !cache.contains(*fk, value))
        .map_or(Ok(()), |(fk, _)| Err(SkipReason::MissingReference(fk)))
}
