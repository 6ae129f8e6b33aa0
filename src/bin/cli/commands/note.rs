use clap::Subcommand;
use engram::dto::CreateNoteDto;
use engram::models::{DEFAULT_DECK_ID, DeckId};

use crate::client::EngramClient;
use crate::output::{self, OutputConfig};

/// Note commands
#[derive(Subcommand, Debug)]
pub enum NoteCommands {
    /// Add a note and generate its cards
    Add {
        /// Field contents, front first
        #[clap(required = true)]
        fields: Vec<String>,
        /// Deck to add the cards to
        #[clap(long, default_value_t = DEFAULT_DECK_ID)]
        deck: DeckId,
        /// Tag to attach; may be repeated
        #[clap(long = "tag")]
        tags: Vec<String>,
        /// Template ordinal to create a card for; may be repeated
        #[clap(long = "ordinal")]
        ordinals: Vec<u32>,
    },
}

/// Executes a note command
pub async fn execute(
    client: &EngramClient,
    cmd: NoteCommands,
    config: &OutputConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        NoteCommands::Add { fields, deck, tags, ordinals } => {
            let ordinals = if ordinals.is_empty() { vec![0] } else { ordinals };
            let dto = CreateNoteDto { deck_id: deck, fields, tags, ordinals };
            let created = client.add_note(&dto).await?;
            match config.format {
                output::OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&created)?);
                }
                output::OutputFormat::Human if config.quiet => {
                    for id in &created.card_ids {
                        println!("{}", id);
                    }
                }
                output::OutputFormat::Human => {
                    let ids: Vec<String> = created.card_ids.iter().map(|id| id.to_string()).collect();
                    println!("Added note {} with cards {}", created.note_id, ids.join(", "));
                }
            }
        }
    }
    Ok(())
}
