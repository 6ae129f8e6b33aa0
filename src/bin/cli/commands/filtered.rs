use clap::{Subcommand, ValueEnum};
use engram::dto::{CreateFilteredDeckDto, FilteredDeckDto};
use engram::models::{DeckId, DynOrder};

use crate::client::EngramClient;
use crate::output::{self, OutputConfig};

/// Order in which a filtered deck takes its cards
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OrderArg {
    Oldest,
    Random,
    SmallestInterval,
    LargestInterval,
    MostLapses,
    Added,
    Due,
    ReverseAdded,
    DuePriority,
}

impl From<OrderArg> for DynOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Oldest => DynOrder::Oldest,
            OrderArg::Random => DynOrder::Random,
            OrderArg::SmallestInterval => DynOrder::SmallestInterval,
            OrderArg::LargestInterval => DynOrder::LargestInterval,
            OrderArg::MostLapses => DynOrder::MostLapses,
            OrderArg::Added => DynOrder::Added,
            OrderArg::Due => DynOrder::Due,
            OrderArg::ReverseAdded => DynOrder::ReverseAdded,
            OrderArg::DuePriority => DynOrder::DuePriority,
        }
    }
}

/// Filtered deck commands
#[derive(Subcommand, Debug)]
pub enum FilteredCommands {
    /// Create a filtered deck and fill it
    Create {
        /// The deck name
        name: String,
        /// Search selecting the cards, e.g. "deck:Spanish is:due"
        search: String,
        /// Most cards to take
        #[clap(long, default_value_t = 100)]
        limit: u32,
        /// Order of the search results
        #[clap(long, value_enum, default_value_t = OrderArg::Oldest)]
        order: OrderArg,
        /// Study without changing the cards' schedules
        #[clap(long)]
        no_resched: bool,
    },
    /// Empty and refill a filtered deck
    Rebuild {
        /// The deck ID
        id: DeckId,
    },
    /// Return a filtered deck's cards to their home decks
    Empty {
        /// The deck ID
        id: DeckId,
    },
}

fn print_result(verb: &str, result: &FilteredDeckDto, config: &OutputConfig) {
    if config.quiet {
        println!("{}", result.card_count);
        return;
    }
    output::print_success(&format!("{} filtered deck {}: {} cards", verb, result.deck_id, result.card_count), config);
}

/// Executes a filtered deck command
pub async fn execute(
    client: &EngramClient,
    cmd: FilteredCommands,
    config: &OutputConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        FilteredCommands::Create { name, search, limit, order, no_resched } => {
            let dto = CreateFilteredDeckDto { name, search, limit, order: order.into(), resched: !no_resched };
            let result = client.create_filtered_deck(&dto).await?;
            print_result("Built", &result, config);
        }
        FilteredCommands::Rebuild { id } => {
            let result = client.rebuild_filtered_deck(id).await?;
            print_result("Rebuilt", &result, config);
        }
        FilteredCommands::Empty { id } => {
            let result = client.empty_filtered_deck(id).await?;
            print_result("Emptied", &result, config);
        }
    }
    Ok(())
}
