pub mod card;
pub mod deck;
pub mod filtered;
pub mod note;
pub mod study;
