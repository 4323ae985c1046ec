//! Behaviour-driven step definitions driving the sync CLI scenarios.

use super::helpers::{STOP_TIMES, STOPS, Workspace, one_stop_time};
use super::*;
use crate::{
    reset::reset_database,
    sync::{SyncConfig, SyncOutcome, run_sync_with},
};
use camino::Utf8PathBuf;
use gtfs_delta_core::EntityType;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::{cell::RefCell, fs};

/// Aggregates sync scenario state so each step only needs a single world
/// argument.
#[derive(Debug)]
struct SyncWorld {
    workspace: Workspace,
    latest: RefCell<Option<Utf8PathBuf>>,
    include_database: RefCell<bool>,
    result: RefCell<Option<Result<SyncOutcome, CliError>>>,
}

impl SyncWorld {
    fn new() -> Self {
        Self {
            workspace: Workspace::new(),
            latest: RefCell::new(None),
            include_database: RefCell::new(true),
            result: RefCell::new(None),
        }
    }

    fn cached(&self) -> Utf8PathBuf {
        self.workspace.path("cache/cached.zip")
    }

    fn outcome(&self) -> SyncOutcome {
        let borrowed = self.result.borrow();
        match borrowed.as_ref().expect("result recorded") {
            Ok(outcome) => *outcome,
            Err(err) => panic!("expected sync to succeed, got {err}"),
        }
    }
}

#[fixture]
fn world() -> SyncWorld {
    SyncWorld::new()
}

#[given("a latest feed with two stop times")]
fn latest_two_stop_times(#[from(world)] world: &SyncWorld) {
    let path = world.workspace.write_feed("latest.zip", STOPS, STOP_TIMES);
    world.latest.replace(Some(path));
}

#[given("a latest feed with one stop time")]
fn latest_one_stop_time(#[from(world)] world: &SyncWorld) {
    let path = world
        .workspace
        .write_feed("latest.zip", STOPS, &one_stop_time());
    world.latest.replace(Some(path));
}

#[given("no cached snapshot exists")]
fn no_cached_snapshot(#[from(world)] world: &SyncWorld) {
    assert!(!world.cached().exists(), "cached snapshot should be absent");
}

#[given("a cached snapshot with two stop times already loaded")]
fn cached_snapshot_loaded(#[from(world)] world: &SyncWorld) {
    let source = world.workspace.write_feed("previous.zip", STOPS, STOP_TIMES);
    fs::create_dir_all(world.workspace.path("cache")).expect("create cache directory");
    fs::copy(&source, world.cached()).expect("seed cached snapshot");
    reset_database(
        &world.cached(),
        &world.workspace.database(),
        gtfs_delta_core::ApplyConfig::default(),
        &mut Vec::new(),
    )
    .expect("seed database");
}

#[given("no database path is given")]
fn no_database(#[from(world)] world: &SyncWorld) {
    world.include_database.replace(false);
}

#[when("I run the sync command")]
fn run_sync_command(#[from(world)] world: &SyncWorld) {
    let latest = world.latest.borrow().clone().expect("latest feed written");
    let mut invocation = vec![
        "gtfs-delta".to_owned(),
        "sync".to_owned(),
        format!("--{ARG_LATEST}"),
        latest.to_string(),
        format!("--{ARG_CACHED}"),
        world.cached().to_string(),
        format!("--{ARG_WORK_DIR}"),
        world.workspace.path("work").to_string(),
    ];
    if *world.include_database.borrow() {
        invocation.extend([
            format!("--{ARG_DATABASE}"),
            world.workspace.database().to_string(),
        ]);
    }
    let outcome = Cli::try_parse_from(invocation)
        .map_err(CliError::ArgumentParsing)
        .and_then(|cli| match cli.command {
            Command::Sync(args) => SyncConfig::try_from(args),
            other => panic!("expected sync command, got {other:?}"),
        })
        .and_then(|config| run_sync_with(&config, &mut Vec::new()));
    world.result.replace(Some(outcome));
}

#[then("the sync performs a full reset")]
fn performs_reset(#[from(world)] world: &SyncWorld) {
    assert_eq!(world.outcome(), SyncOutcome::Reset);
}

#[then("the sync applies differences")]
fn applies_differences(#[from(world)] world: &SyncWorld) {
    assert_eq!(world.outcome(), SyncOutcome::Applied);
}

#[then("the database holds 2 stop times")]
fn two_stop_times(#[from(world)] world: &SyncWorld) {
    assert_eq!(world.workspace.count(EntityType::StopTime), 2);
}

#[then("the database holds 1 stop time")]
fn one_stop_time_left(#[from(world)] world: &SyncWorld) {
    assert_eq!(world.workspace.count(EntityType::StopTime), 1);
}

#[then("the cached snapshot matches the latest feed")]
fn cached_matches_latest(#[from(world)] world: &SyncWorld) {
    let latest = world.latest.borrow().clone().expect("latest feed written");
    assert_eq!(
        fs::read(world.cached()).expect("read cached snapshot"),
        fs::read(latest).expect("read latest feed")
    );
}

#[then("the CLI reports that the \"database\" flag is missing")]
fn reports_missing_database(#[from(world)] world: &SyncWorld) {
    let borrowed = world.result.borrow();
    let error = borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect_err("expected error");
    match error {
        CliError::MissingArgument { field, env } => {
            assert_eq!(*field, ARG_DATABASE);
            assert_eq!(*env, ENV_SYNC_DATABASE);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

macro_rules! register_sync_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/sync_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: SyncWorld) {
            let _ = world;
        }
    };
}

register_sync_scenario!(
    resetting_without_cache,
    "resetting when no cached snapshot exists"
);
register_sync_scenario!(
    applying_from_cache,
    "applying differences from a cached snapshot"
);
register_sync_scenario!(
    rejecting_missing_database,
    "rejecting a sync without a database"
);
