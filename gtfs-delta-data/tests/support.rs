use std::io::{Cursor, Write};

use zip::{ZipWriter, write::SimpleFileOptions};

pub const AGENCY: &str = "agency_id,agency_name,agency_url,agency_timezone\n\
A1,Metro,https://example.invalid,Europe/London\n";
pub const ROUTES: &str = "route_id,agency_id,route_short_name,route_long_name,route_type\n\
R1,A1,1,Crosstown,3\n";
pub const CALENDAR: &str = "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
WK,1,1,1,1,1,0,0,20240101,20241231\n";
pub const TRIPS: &str = "route_id,service_id,trip_id\nR1,WK,T1\n";
pub const STOPS: &str = "stop_id,stop_name,stop_lat,stop_lon\n\
S1,Main Street,51.50,-0.12\n\
S2,Harbour,51.51,-0.13\n";
pub const STOP_TIMES: &str = "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
T1,08:00:00,08:00:00,S1,1\n\
T1,08:05:00,08:05:00,S2,2\n";

/// Zip archive holding `members`, rewound for reading.
pub fn zip_of(members: &[(&str, &str)]) -> Cursor<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in members {
        zip.start_file(*name, SimpleFileOptions::default())
            .unwrap_or_else(|err| panic!("failed to start member {name}: {err}"));
        zip.write_all(body.as_bytes())
            .unwrap_or_else(|err| panic!("failed to write member {name}: {err}"));
    }
    let mut cursor = zip
        .finish()
        .unwrap_or_else(|err| panic!("failed to finish archive: {err}"));
    cursor.set_position(0);
    cursor
}

/// A complete feed archive, with `stops` and `stop_times` overridable.
pub fn feed_archive(stops: &str, stop_times: &str) -> Cursor<Vec<u8>> {
    zip_of(&[
        ("agency.txt", AGENCY),
        ("routes.txt", ROUTES),
        ("calendar.txt", CALENDAR),
        ("trips.txt", TRIPS),
        ("stops.txt", stops),
        ("stop_times.txt", stop_times),
    ])
}
