use clap::Subcommand;
use engram::models::DeckId;

use crate::client::EngramClient;
use crate::output::{self, OutputConfig};

/// Deck management commands
#[derive(Subcommand, Debug)]
pub enum DeckCommands {
    /// Show the deck tree with due counts
    List,
    /// Create a deck; `::` separates parent and child names
    Add {
        /// The full deck name
        name: String,
    },
    /// Select the deck to study
    Select {
        /// The deck ID
        id: DeckId,
    },
    /// Rename a deck, moving its children along
    Rename {
        /// The deck ID
        id: DeckId,
        /// The new full name
        name: String,
    },
    /// Remove a deck and its children
    Remove {
        /// The deck ID
        id: DeckId,
        /// Delete the cards too instead of moving them to the default deck
        #[clap(long)]
        cards_too: bool,
    },
}

/// Executes a deck command
pub async fn execute(
    client: &EngramClient,
    cmd: DeckCommands,
    config: &OutputConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        DeckCommands::List => {
            let tree = client.list_decks().await?;
            output::print_deck_tree(&tree, config);
        }
        DeckCommands::Add { name } => {
            let deck = client.create_deck(name).await?;
            output::print_deck(&deck, config);
        }
        DeckCommands::Select { id } => {
            let counts = client.select_deck(id).await?;
            output::print_counts(&counts, config);
        }
        DeckCommands::Rename { id, name } => {
            let deck = client.rename_deck(id, name).await?;
            output::print_deck(&deck, config);
        }
        DeckCommands::Remove { id, cards_too } => {
            client.remove_deck(id, cards_too).await?;
            output::print_success(&format!("Removed deck {}", id), config);
        }
    }
    Ok(())
}
