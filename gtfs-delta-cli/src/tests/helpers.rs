//! Test helpers for writing feed archives and layering CLI overrides.

use super::*;
use crate::diff::{DiffArgs, DiffConfig};
use camino::Utf8PathBuf;
use gtfs_delta_core::EntityType;
use gtfs_delta_data::SqliteTransitStore;
use std::{fs::File, io::Write as _};
use tempfile::TempDir;
use zip::{ZipWriter, write::SimpleFileOptions};

pub(super) const AGENCY: &str = "agency_id,agency_name,agency_url,agency_timezone\n\
A1,Metro,https://example.invalid,Europe/London\n";
pub(super) const ROUTES: &str = "route_id,agency_id,route_short_name,route_long_name,route_type\n\
R1,A1,1,Crosstown,3\n";
pub(super) const CALENDAR: &str = "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
WK,1,1,1,1,1,0,0,20240101,20241231\n";
pub(super) const TRIPS: &str = "route_id,service_id,trip_id\nR1,WK,T1\n";
pub(super) const STOPS: &str = "stop_id,stop_name,stop_lat,stop_lon\n\
S1,Main Street,51.50,-0.12\n\
S2,Harbour,51.51,-0.13\n";
pub(super) const STOP_TIMES: &str = "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
T1,08:00:00,08:00:00,S1,1\n\
T1,08:05:00,08:05:00,S2,2\n";

/// Stop times with only the first call of `T1`.
pub(super) fn one_stop_time() -> String {
    STOP_TIMES
        .lines()
        .take(2)
        .map(|line| format!("{line}\n"))
        .collect()
}

/// Scratch directory holding feeds, packages and databases.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("UTF-8 tempdir");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.path("transit.sqlite")
    }

    /// Write a feed archive with overridable stops and stop times.
    pub(super) fn write_feed(&self, name: &str, stops: &str, stop_times: &str) -> Utf8PathBuf {
        self.write_archive(
            name,
            &[
                ("agency.txt", AGENCY),
                ("routes.txt", ROUTES),
                ("calendar.txt", CALENDAR),
                ("trips.txt", TRIPS),
                ("stops.txt", stops),
                ("stop_times.txt", stop_times),
            ],
        )
    }

    pub(super) fn write_archive(&self, name: &str, members: &[(&str, &str)]) -> Utf8PathBuf {
        let path = self.path(name);
        let file = File::create(&path).expect("create archive");
        let mut zip = ZipWriter::new(file);
        for (member, body) in members {
            zip.start_file(*member, SimpleFileOptions::default())
                .expect("start member");
            zip.write_all(body.as_bytes()).expect("write member");
        }
        zip.finish().expect("finish archive");
        path
    }

    pub(super) fn count(&self, entity: EntityType) -> usize {
        SqliteTransitStore::open(&self.database())
            .expect("open store")
            .count(entity)
            .expect("count rows")
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct LayerOverrides {
    pub(super) old: Option<Utf8PathBuf>,
    pub(super) new: Option<Utf8PathBuf>,
    pub(super) output: Option<Utf8PathBuf>,
}

/// Resolve `diff` configuration with CLI values over environment values
/// over config file values.
pub(super) fn merge_layers(
    mut cli_args: DiffArgs,
    file_layer: Option<LayerOverrides>,
    env_layer: Option<LayerOverrides>,
) -> Result<DiffConfig, CliError> {
    merge_field(
        &mut cli_args.old,
        extract_field(&env_layer, |layer| &layer.old),
        extract_field(&file_layer, |layer| &layer.old),
    );
    merge_field(
        &mut cli_args.new,
        extract_field(&env_layer, |layer| &layer.new),
        extract_field(&file_layer, |layer| &layer.new),
    );
    merge_field(
        &mut cli_args.output,
        extract_field(&env_layer, |layer| &layer.output),
        extract_field(&file_layer, |layer| &layer.output),
    );
    DiffConfig::try_from(cli_args)
}

fn merge_field<T: Clone>(target: &mut Option<T>, env_value: Option<T>, file_value: Option<T>) {
    if target.is_none()
        && let Some(value) = env_value.or(file_value)
    {
        *target = Some(value);
    }
}

fn extract_field<T: Clone>(
    layer: &Option<LayerOverrides>,
    accessor: fn(&LayerOverrides) -> &Option<T>,
) -> Option<T> {
    layer.as_ref().and_then(|entry| accessor(entry).clone())
}
