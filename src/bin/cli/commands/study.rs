use clap::Subcommand;
use engram::models::CardId;

use crate::client::EngramClient;
use crate::output::{self, OutputConfig};

/// Study commands
#[derive(Subcommand, Debug)]
pub enum StudyCommands {
    /// Show the next card to study
    Next,
    /// Answer the card shown by `study next`
    Answer {
        /// The card ID
        card_id: CardId,
        /// again (1), hard (2), good (3) or easy (4)
        #[clap(value_parser = parse_grade)]
        grade: u8,
    },
    /// Show the remaining counts
    Counts,
}

/// Accepts a grade by button number or by name
fn parse_grade(value: &str) -> Result<u8, String> {
    let grade = match value.trim().to_ascii_lowercase().as_str() {
        "1" | "again" => 1,
        "2" | "hard" => 2,
        "3" | "good" => 3,
        "4" | "easy" => 4,
        _ => return Err(format!("'{}' is not a grade; use 1-4 or again, hard, good, easy", value)),
    };
    Ok(grade)
}

/// Executes a study command
pub async fn execute(
    client: &EngramClient,
    cmd: StudyCommands,
    config: &OutputConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        StudyCommands::Next => {
            let next = client.next_card().await?;
            output::print_next_card(&next, config);
        }
        StudyCommands::Answer { card_id, grade } => {
            let result = client.answer(card_id, grade).await?;
            output::print_answer(&result, config);
        }
        StudyCommands::Counts => {
            let counts = client.counts().await?;
            output::print_counts(&counts, config);
        }
    }
    Ok(())
}
