use std::fs::File;
use std::path::PathBuf;

use haulrate_core::import::{parse_import_file, ImportMode, ImportReport, RateImporter};
use haulrate_db::SqlRateCatalog;

use crate::commands::{with_database, CommandResult};

pub fn run(file: PathBuf, mode: ImportMode) -> CommandResult {
    let report = with_database("import", |config, pool| async move {
        let reader = File::open(&file).map_err(|error| {
            ("import_file", format!("could not open `{}`: {error}", file.display()), 7u8)
        })?;
        let parsed = parse_import_file(reader, config.import.max_rows);

        let catalog = SqlRateCatalog::new(pool);
        RateImporter::new(&catalog)
            .with_actor("cli")
            .run(parsed, mode)
            .await
            .map_err(|error| ("catalog", error.to_string(), 4u8))
    });

    match report {
        Ok(report) => {
            let message = render_message(&report);
            let data = serde_json::to_value(&report).ok();
            if report.has_errors() {
                CommandResult::failure_with_data("import", "import_rejected", message, 8, data)
            } else {
                CommandResult::success_with_data("import", message, data)
            }
        }
        Err(failure) => failure,
    }
}

fn render_message(report: &ImportReport) -> String {
    let verb = match report.mode {
        ImportMode::Simulate => "would import",
        ImportMode::Commit => "imported",
    };
    format!(
        "{}: {verb} {} rates from {} rows, {} rejected",
        report.mode, report.accepted, report.total_rows, report.rejected
    )
}
