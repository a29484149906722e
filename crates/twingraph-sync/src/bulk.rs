//! One-shot synchronization of a twin listing.
//!
//! Used to bring the graph in line with the hub outside the event path:
//! every twin is created if missing, otherwise replaced if its version is
//! newer. A failing twin is logged and counted; the run continues.

use tracing::{error, info};
use twingraph_graph::{GraphClient, GraphStore};
use twingraph_types::TwinSnapshot;

use crate::command::{CommandOutcome, SyncCommand, TwinChange};

/// Totals of a [`sync_twins`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSyncSummary {
    /// Twins created or replaced.
    pub synced: usize,
    /// Twins already up to date.
    pub unchanged: usize,
    /// Twins whose command failed.
    pub failed: usize,
}

/// Run Create-or-Update for every twin in `twins`.
pub async fn sync_twins<S: GraphStore>(
    graph: &GraphClient<S>,
    twins: impl IntoIterator<Item = TwinSnapshot>,
) -> BulkSyncSummary {
    let mut summary = BulkSyncSummary::default();

    for snapshot in twins {
        let command = SyncCommand::CreateOrUpdate(TwinChange::new(
            snapshot.hub_name,
            snapshot.device_id,
            snapshot.twin,
        ));
        let id = command.change().graph_twin_id();
        info!(id = %id, "syncing twin");

        match command.run(graph).await {
            Ok(CommandOutcome::Applied) => summary.synced = summary.synced.saturating_add(1),
            Ok(_) => summary.unchanged = summary.unchanged.saturating_add(1),
            Err(e) => {
                error!(id = %id, error = %e, "twin sync failed");
                summary.failed = summary.failed.saturating_add(1);
            }
        }
    }

    info!(
        synced = summary.synced,
        unchanged = summary.unchanged,
        failed = summary.failed,
        "twin sync finished"
    );
    summary
}
