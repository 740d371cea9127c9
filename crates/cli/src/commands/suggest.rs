use haulrate_core::fare::suggestion::RateSuggestions;
use haulrate_core::fare::FareEngine;
use haulrate_db::SqlRateCatalog;

use crate::commands::{with_database, CommandResult};

pub fn run() -> CommandResult {
    let suggestions = with_database("suggest", |_config, pool| async move {
        FareEngine::new(SqlRateCatalog::new(pool))
            .suggestions()
            .await
            .map_err(|error| ("catalog", error.to_string(), 4u8))
    });

    match suggestions {
        Ok(suggestions) => CommandResult::success_with_data(
            "suggest",
            render_message(&suggestions),
            serde_json::to_value(&suggestions).ok(),
        ),
        Err(failure) => failure,
    }
}

fn render_message(suggestions: &RateSuggestions) -> String {
    if suggestions.is_empty() {
        return "no active rates are configured".to_string();
    }
    let tonnages = suggestions
        .available_tonnages
        .iter()
        .map(|tonnage| format!("{tonnage}t"))
        .collect::<Vec<_>>();
    format!(
        "centers: {}; tonnages: {}",
        suggestions.available_centers.join(", "),
        tonnages.join(", ")
    )
}
