//! Refresh pipeline
//!
//! One cycle runs to completion and either yields a new [`Snapshot`] or fails
//! as a whole:
//!
//! fetch current → validate → [fetch past hour → fill gaps] → fetch today →
//! validate → aggregate → fetch mode → assemble

pub mod aggregate;
pub mod gap_fill;
pub mod snapshot;
pub mod validate;

pub use aggregate::{aggregate, Totals};
pub use gap_fill::{fill_gaps, has_gaps};
pub use snapshot::Snapshot;
pub use validate::{require_fields, validate};

use tracing::{debug, warn};

use crate::errors::RefreshError;
use crate::powervault::{Field, PowervaultApi};

/// Runs one refresh cycle against the API.
pub fn refresh<A: PowervaultApi + ?Sized>(
    api: &A,
    unit_id: &str,
) -> Result<Snapshot, RefreshError> {
    let current = validate(api.fetch_current(unit_id)?, "current")?;
    let mut reading = current.into_iter().next().unwrap_or_default();

    if has_gaps(&reading) {
        let history = api.fetch_past_hour(unit_id)?;
        debug!("Filling gaps from {} past-hour reading(s)", history.len());
        reading = fill_gaps(&reading, &history);
    }

    let today = validate(api.fetch_today(unit_id)?, "today")?;
    let totals = aggregate(&today, &Field::TOTALS);

    let mode = api.fetch_mode(unit_id)?;

    Snapshot::assemble(&reading, totals, mode)
}

/// Runs [`refresh`], retrying a failed cycle up to `retries` more times.
///
/// The error of the last attempt is returned.
pub fn refresh_with_retry<A: PowervaultApi + ?Sized>(
    api: &A,
    unit_id: &str,
    retries: u32,
) -> Result<Snapshot, RefreshError> {
    let mut attempt = 0;
    loop {
        match refresh(api, unit_id) {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!("Refresh attempt {} failed, retrying: {}", attempt, e);
            }
            Err(e) => return Err(e),
        }
    }
}
