// Seeding - genesis block, voter roster and candidate list

use crate::chain::timestamp_now;
use crate::config::SeedConfig;
use crate::coordinator::VoteCoordinator;
use crate::service::ServiceError;
use serde::Serialize;
use tracing::info;

/// What a seeding run changed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub genesis_created: bool,
    pub voters_added: usize,
    /// Voters that already existed and were left untouched
    pub voters_skipped: usize,
    pub candidates_added: usize,
}

/// Bring an empty or partially seeded database up to `seed`.
///
/// Safe to run repeatedly: the genesis block is only created on an empty
/// ledger, existing voters keep their credentials and voting status, and
/// candidates are only inserted into an empty roster.
pub(crate) fn apply(
    coordinator: &VoteCoordinator,
    seed: &SeedConfig,
) -> Result<SeedReport, ServiceError> {
    seed.validate()?;

    let mut report = SeedReport {
        genesis_created: coordinator.ledger().initialize(timestamp_now())?.is_some(),
        ..SeedReport::default()
    };

    for voter in &seed.voters {
        if coordinator
            .registry()
            .register(&voter.usercode, &voter.passcode)?
        {
            report.voters_added += 1;
        } else {
            report.voters_skipped += 1;
        }
    }

    report.candidates_added = coordinator.roster().seed(&seed.candidates)?;
    coordinator.store().flush()?;

    info!(
        genesis_created = report.genesis_created,
        voters_added = report.voters_added,
        voters_skipped = report.voters_skipped,
        candidates_added = report.candidates_added,
        "Seeding complete"
    );
    Ok(report)
}
