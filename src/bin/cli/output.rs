use clap::ValueEnum;
use engram::dto::{AnswerResultDto, DeckSummaryDto, NextCardDto};
use engram::models::{Card, Queue};
use engram::sched::{Counts, DeckDueNode};
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Bundled output configuration passed to all print functions
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    /// The output format
    pub format: OutputFormat,
    /// When true, print minimal output (just IDs or counts)
    pub quiet: bool,
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Could not encode output: {}", e),
    }
}

/// Renders a delay in seconds the way answer buttons label it
pub fn format_interval(secs: i64) -> String {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    match secs {
        s if s < MINUTE => format!("{}s", s.max(0)),
        s if s < HOUR => format!("{}m", s / MINUTE),
        s if s < DAY => format!("{}h", s / HOUR),
        s if s < 30 * DAY => format!("{}d", s / DAY),
        s if s < 365 * DAY => format!("{:.1}mo", s as f64 / (30 * DAY) as f64),
        s => format!("{:.1}y", s as f64 / (365 * DAY) as f64),
    }
}

fn queue_name(queue: Queue) -> &'static str {
    match queue {
        Queue::Buried => "buried",
        Queue::Suspended => "suspended",
        Queue::New => "new",
        Queue::Learning => "learning",
        Queue::Review => "review",
        Queue::DayLearning => "learning (day)",
    }
}

fn print_deck_nodes(nodes: &[DeckDueNode], depth: usize) {
    for node in nodes {
        let marker = if node.collapsed && !node.children.is_empty() { "+" } else { " " };
        let label = format!("{}{}{}", "  ".repeat(depth), marker, node.name);
        println!(
            "{:<10}  {:<32}  {:>5}  {:>5}  {:>5}",
            node.deck_id, label, node.new, node.learn, node.review
        );
        if !node.collapsed {
            print_deck_nodes(&node.children, depth + 1);
        }
    }
}

fn collect_ids(nodes: &[DeckDueNode], out: &mut Vec<i64>) {
    for node in nodes {
        out.push(node.deck_id);
        collect_ids(&node.children, out);
    }
}

/// Prints the deck tree in the specified format
pub fn print_deck_tree(nodes: &[DeckDueNode], config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if config.quiet {
                let mut ids = Vec::new();
                collect_ids(nodes, &mut ids);
                for id in ids {
                    println!("{}", id);
                }
                return;
            }
            if nodes.is_empty() {
                println!("No decks found.");
                return;
            }
            println!("{:<10}  {:<32}  {:>5}  {:>5}  {:>5}", "ID", "DECK", "NEW", "LEARN", "DUE");
            print_deck_nodes(nodes, 0);
        }
        OutputFormat::Json => print_json(nodes),
    }
}

/// Prints a single deck in the specified format
pub fn print_deck(deck: &DeckSummaryDto, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if config.quiet {
                println!("{}", deck.id);
                return;
            }
            println!("ID:       {}", deck.id);
            println!("Name:     {}", deck.name);
            println!("Filtered: {}", deck.filtered);
        }
        OutputFormat::Json => print_json(deck),
    }
}

/// Prints study counts in the specified format
pub fn print_counts(counts: &Counts, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if config.quiet {
                println!("{} {} {}", counts.new, counts.learning, counts.review);
                return;
            }
            println!("New: {}  Learning: {}  Review: {}", counts.new, counts.learning, counts.review);
        }
        OutputFormat::Json => print_json(counts),
    }
}

/// Prints a single card in the specified format
pub fn print_card(card: &Card, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if config.quiet {
                println!("{}", card.id);
                return;
            }
            println!("ID:       {}", card.id);
            println!("Note:     {}", card.nid);
            println!("Deck:     {}", card.did);
            if card.odid != 0 {
                println!("Home:     {}", card.odid);
            }
            println!("Template: {}", card.ord + 1);
            println!("Queue:    {}", queue_name(card.queue));
            println!("Due:      {}", card.due);
            println!("Interval: {}d", card.ivl);
            println!("Ease:     {:.2}", f64::from(card.factor) / 1000.0);
            println!("Reviews:  {}", card.reps);
            println!("Lapses:   {}", card.lapses);
        }
        OutputFormat::Json => print_json(card),
    }
}

/// Prints the next card to study with its answer buttons
pub fn print_next_card(next: &NextCardDto, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            let Some(card) = &next.card else {
                if !config.quiet {
                    println!("Congratulations! You have finished for now.");
                }
                return;
            };
            if config.quiet {
                println!("{}", card.id);
                return;
            }
            println!("Card {} ({})", card.id, queue_name(card.queue));
            print_counts(&next.counts, config);
            let labels = ["again", "hard", "good", "easy"];
            let buttons: Vec<String> = labels
                .iter()
                .zip(&next.intervals)
                .enumerate()
                .map(|(i, (label, secs))| format!("[{}] {} {}", i + 1, label, format_interval(*secs)))
                .collect();
            println!("{}", buttons.join("  "));
        }
        OutputFormat::Json => print_json(next),
    }
}

/// Prints the result of answering a card
pub fn print_answer(result: &AnswerResultDto, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if config.quiet {
                println!("{}", result.card.id);
                return;
            }
            let card = &result.card;
            match card.queue {
                Queue::Review => println!("Card {} is next due in {} days", card.id, card.ivl),
                _ => println!("Card {} is now {}", card.id, queue_name(card.queue)),
            }
            print_counts(&result.counts, config);
        }
        OutputFormat::Json => print_json(result),
    }
}

/// Prints a success message in the specified format
pub fn print_success(message: &str, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if !config.quiet {
                println!("{}", message);
            }
        }
        OutputFormat::Json => {
            print_json(&serde_json::json!({ "message": message }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0), "0s");
        assert_eq!(format_interval(60), "1m");
        assert_eq!(format_interval(600), "10m");
        assert_eq!(format_interval(3 * 3600), "3h");
        assert_eq!(format_interval(4 * 86_400), "4d");
        assert_eq!(format_interval(45 * 86_400), "1.5mo");
        assert_eq!(format_interval(730 * 86_400), "2.0y");
    }
}
