//! Human-readable command output.

use std::io::Write;

use gtfs_delta_core::{ApplyReport, DiffFailure, DiffPackage, EntityApplyReport};

use crate::CliError;

pub(crate) fn write_diff_summary(
    writer: &mut dyn Write,
    package: &DiffPackage,
    failures: &[DiffFailure],
) -> Result<(), CliError> {
    for table in package.tables() {
        writeln!(
            writer,
            "{}: {} ({} changed, {} deleted)",
            table.entity,
            table.status,
            table.changed_records(),
            table.deleted_records()
        )
        .map_err(CliError::WriteOutput)?;
    }
    for failure in failures {
        writeln!(writer, "{}: failed ({})", failure.entity, failure.error)
            .map_err(CliError::WriteOutput)?;
    }
    Ok(())
}

pub(crate) fn write_apply_report(
    writer: &mut dyn Write,
    report: &ApplyReport,
) -> Result<(), CliError> {
    if !report.applied {
        return writeln!(writer, "no changes to apply").map_err(CliError::WriteOutput);
    }
    for (entity, counts) in &report.entities {
        write_counts(writer, &entity.to_string(), counts)?;
    }
    write_counts(writer, "total", &report.totals())
}

fn write_counts(
    writer: &mut dyn Write,
    label: &str,
    counts: &EntityApplyReport,
) -> Result<(), CliError> {
    writeln!(
        writer,
        "{label}: {} validated, {} skipped, {} upserted, {} upsert failures, \
         {} deleted, {} delete failures",
        counts.validated,
        counts.skipped_total(),
        counts.upserted,
        counts.upsert_failed,
        counts.deleted,
        counts.delete_failed
    )
    .map_err(CliError::WriteOutput)?;
    for (reason, count) in &counts.skipped {
        writeln!(writer, "  skipped {count}: {reason}").map_err(CliError::WriteOutput)?;
    }
    Ok(())
}
