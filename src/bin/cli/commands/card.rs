use clap::Subcommand;
use engram::models::CardId;

use crate::client::{BulkAction, EngramClient};
use crate::output::{self, OutputConfig};

/// Card commands
#[derive(Subcommand, Debug)]
pub enum CardCommands {
    /// Show a card
    Show {
        /// The card ID
        id: CardId,
    },
    /// Suspend cards
    Suspend {
        #[clap(required = true)]
        ids: Vec<CardId>,
    },
    /// Unsuspend cards
    Unsuspend {
        #[clap(required = true)]
        ids: Vec<CardId>,
    },
    /// Hide cards until tomorrow
    Bury {
        #[clap(required = true)]
        ids: Vec<CardId>,
    },
    /// Forget cards, making them new again
    Reset {
        #[clap(required = true)]
        ids: Vec<CardId>,
    },
}

/// Executes a card command
pub async fn execute(
    client: &EngramClient,
    cmd: CardCommands,
    config: &OutputConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let (action, ids, verb) = match cmd {
        CardCommands::Show { id } => {
            let card = client.get_card(id).await?;
            output::print_card(&card, config);
            return Ok(());
        }
        CardCommands::Suspend { ids } => (BulkAction::Suspend, ids, "Suspended"),
        CardCommands::Unsuspend { ids } => (BulkAction::Unsuspend, ids, "Unsuspended"),
        CardCommands::Bury { ids } => (BulkAction::Bury, ids, "Buried"),
        CardCommands::Reset { ids } => (BulkAction::Reset, ids, "Reset"),
    };
    let affected = client.bulk_cards(action, ids).await?;
    output::print_success(&format!("{} {} cards", verb, affected.count), config);
    Ok(())
}
