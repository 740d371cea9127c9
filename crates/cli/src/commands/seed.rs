use haulrate_db::{FareSeedDataset, SeedMasterInfo};

use crate::commands::{with_database, CommandResult};

pub fn run() -> CommandResult {
    let seeded = with_database("seed", |_config, pool| async move {
        let seed_result = FareSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = FareSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        if !verification.all_present {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            return Err(("seed_verification", verification_message(&failed_checks), 6u8));
        }

        Ok(seed_result.masters_seeded)
    });

    match seeded {
        Ok(masters) => CommandResult::success("seed", render_summary(&masters)),
        Err(failure) => failure,
    }
}

fn render_summary(masters: &[SeedMasterInfo]) -> String {
    let lines = masters
        .iter()
        .map(|master| {
            format!(
                "  - {}: {} {}t ({})",
                master.id, master.center_name, master.tonnage, master.description
            )
        })
        .collect::<Vec<_>>();
    format!("fare seed dataset loaded with {} rate masters:\n{}", masters.len(), lines.join("\n"))
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use haulrate_db::SeedMasterInfo;

    use super::{render_summary, verification_message};

    #[test]
    fn verification_message_targets_failed_checks() {
        assert_eq!(
            verification_message(&["rm-seoul-5", "Daegu 5t: only line expired at the end of 2024"]),
            "seed verification failed for checks: rm-seoul-5, Daegu 5t: only line expired at the end of 2024"
        );
    }

    #[test]
    fn verification_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "some seed data failed to load");
    }

    #[test]
    fn summary_lists_one_line_per_master() {
        let summary = render_summary(&[SeedMasterInfo {
            id: "rm-busan-2.5",
            center_name: "부산센터",
            tonnage: "2.5",
            description: "Busan 2.5t: night loading surcharge",
        }]);

        assert!(summary.starts_with("fare seed dataset loaded with 1 rate masters:"));
        assert!(summary.contains("  - rm-busan-2.5: 부산센터 2.5t (Busan 2.5t: night loading surcharge)"));
    }
}
