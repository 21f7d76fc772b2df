use crate::commands::{open_migrated, prepare, CommandFailure, CommandResult};
use homeserve_db::{DemoDataset, SeedResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated(&config).await?;

        let seeded = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        pool.close().await;

        let failed_checks = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();
        if !verification.all_present {
            return Err(verification_failure(&failed_checks));
        }
        Ok::<SeedResult, CommandFailure>(seeded)
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", describe(&seeded)),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn describe(seeded: &SeedResult) -> String {
    format!(
        "demo dataset loaded: householders [{}], providers [{}], services [{}]",
        seeded.householder_ids.join(", "),
        seeded.provider_ids.join(", "),
        seeded.service_names.join(", ")
    )
}

fn verification_failure(failed_checks: &[&str]) -> CommandFailure {
    let message = if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    };
    ("seed_verification", message, 6u8)
}

#[cfg(test)]
mod tests {
    use super::verification_failure;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let (class, message, code) = verification_failure(&["P2", "SVC-gardening"]);

        assert_eq!(class, "seed_verification");
        assert_eq!(message, "Seed verification failed for checks: P2, SVC-gardening");
        assert_eq!(code, 6);
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let (_, message, _) = verification_failure(&[]);
        assert_eq!(message, "Some seed data failed to load");
    }
}
