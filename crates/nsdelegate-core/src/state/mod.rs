// # Name Server Sources
//
// Implementations of the NameServerSource trait plus the State Reader stage
// that turns a source and an action into a `DesiredState`.

pub mod static_list;
pub mod terraform;

pub use static_list::StaticNameServerSource;
pub use terraform::{DEFAULT_STATE_OUTPUT, TerraformStateSource};

use crate::config::Action;
use crate::error::{Error, Result};
use crate::reconcile::DesiredState;
use crate::record::NameServerSet;
use crate::traits::NameServerSource;

/// Read the desired state for `record_name`
///
/// The source is always read when one is configured, so an unreadable state
/// location fails the run for both actions. Only `add` requires a non-empty
/// result; `remove` deletes whatever the zone holds.
pub async fn read_desired(
    source: Option<&dyn NameServerSource>,
    action: Action,
    record_name: &str,
) -> Result<DesiredState> {
    let name_servers = match source {
        Some(source) => {
            let name_servers = source.name_servers().await?;
            tracing::info!(
                "Read {} name server(s) from {}: {}",
                name_servers.len(),
                source.describe(),
                name_servers
            );
            if action == Action::Add && name_servers.is_empty() {
                return Err(Error::state_empty(format!(
                    "No name servers found in {}",
                    source.describe()
                )));
            }
            name_servers
        }
        None if action == Action::Add => {
            return Err(Error::config(
                "A name server source is required for action 'add'",
            ));
        }
        None => NameServerSet::new(),
    };

    Ok(match action {
        Action::Add => DesiredState::add(record_name, name_servers),
        Action::Remove => DesiredState::remove(record_name, name_servers),
    })
}
