use haulrate_db::migrations;

use crate::commands::{with_database, CommandResult};

pub fn run() -> CommandResult {
    let applied = with_database("migrate", |_config, pool| async move {
        migrations::applied_versions(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))
    });

    match applied {
        Ok(versions) => {
            let listed = versions.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");
            CommandResult::success("migrate", format!("applied pending migrations (schema versions: {listed})"))
        }
        Err(failure) => failure,
    }
}
