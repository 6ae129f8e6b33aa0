use super::*;

const STAMP: Stamp = Stamp { now_ms: 1_000_000, usn: -1 };

fn manager() -> DeckManager {
    DeckManager::load(Vec::new(), Vec::new(), STAMP)
}

fn names(manager: &DeckManager) -> Vec<String> {
    manager.all_sorted().iter().map(|d| d.name.clone()).collect()
}

#[test]
fn test_load_creates_defaults() {
    let mut manager = manager();
    assert_eq!(manager.name(DEFAULT_DECK_ID), Some("Default"));
    assert!(manager.config(DEFAULT_CONFIG_ID).is_some());

    let changes = manager.take_changes();
    assert_eq!(changes.decks.len(), 1);
    assert_eq!(changes.configs.len(), 1);
    assert!(manager.take_changes().is_empty());
}

#[test]
fn test_normalize_name() {
    assert_eq!(normalize_name(" A :: B ").unwrap(), "A::B");
    assert_eq!(normalize_name("A::::B").unwrap(), "A::B");
    assert_eq!(normalize_name("\"Quoted\"").unwrap(), "Quoted");
    assert!(matches!(normalize_name(" :: "), Err(SchedError::InvalidDeckName(_))));
}

#[test]
fn test_id_creates_missing_parents() {
    let mut manager = manager();
    let leaf = manager.id("Lang::Spanish::Verbs", true, STAMP).unwrap().unwrap();

    assert_eq!(names(&manager), vec!["Default", "Lang", "Lang::Spanish", "Lang::Spanish::Verbs"]);
    assert_eq!(manager.parents(leaf).len(), 2);
    assert_eq!(manager.parents(leaf)[0].name, "Lang");
}

#[test]
fn test_id_is_case_insensitive_and_keeps_parent_case() {
    let mut manager = manager();
    let lang = manager.id("Lang", true, STAMP).unwrap().unwrap();
    assert_eq!(manager.id("lang", false, STAMP).unwrap(), Some(lang));

    let child = manager.id("LANG::French", true, STAMP).unwrap().unwrap();
    assert_eq!(manager.name(child), Some("Lang::French"));
    assert_eq!(manager.id("missing", false, STAMP).unwrap(), None);
}

#[test]
fn test_ids_increase() {
    let mut manager = manager();
    let a = manager.id("A", true, STAMP).unwrap().unwrap();
    let b = manager.id("B", true, STAMP).unwrap().unwrap();
    assert!(b > a);
}

#[test]
fn test_filtered_decks_cannot_have_children() {
    let mut manager = manager();
    manager.add_filtered("Cram", STAMP).unwrap();

    let err = manager.id("Cram::Inner", true, STAMP).unwrap_err();
    assert!(matches!(err, SchedError::FilteredDeckNesting(_)));
    assert!(matches!(manager.add_filtered("Cram", STAMP), Err(SchedError::DeckExists(_))));
}

#[test]
fn test_rename_moves_children() {
    let mut manager = manager();
    let parent = manager.id("Old", true, STAMP).unwrap().unwrap();
    manager.id("Old::Child::Leaf", true, STAMP).unwrap();

    manager.rename(parent, "New::Nested", STAMP).unwrap();

    assert_eq!(
        names(&manager),
        vec!["Default", "New", "New::Nested", "New::Nested::Child", "New::Nested::Child::Leaf"]
    );
}

#[test]
fn test_rename_rejects_conflicts() {
    let mut manager = manager();
    let a = manager.id("A", true, STAMP).unwrap().unwrap();
    manager.id("B", true, STAMP).unwrap();
    let cram = manager.add_filtered("Cram", STAMP).unwrap();

    assert!(matches!(manager.rename(a, "b", STAMP), Err(SchedError::DeckExists(_))));
    assert!(matches!(manager.rename(a, "A::Below", STAMP), Err(SchedError::InvalidDeckName(_))));
    assert!(matches!(manager.rename(a, "Cram::A", STAMP), Err(SchedError::FilteredDeckNesting(_))));
    // Changing only the case of the own name is allowed
    manager.rename(a, "a", STAMP).unwrap();
    assert_eq!(manager.name(a), Some("a"));
    assert!(manager.is_filtered(cram));
}

#[test]
fn test_drag_and_drop() {
    let mut manager = manager();
    let a = manager.id("A", true, STAMP).unwrap().unwrap();
    let b = manager.id("B", true, STAMP).unwrap().unwrap();
    let a_child = manager.id("A::Child", true, STAMP).unwrap().unwrap();

    // Onto own descendant: nothing happens
    manager.rename_for_drag_and_drop(a, Some(a_child), STAMP).unwrap();
    assert_eq!(manager.name(a), Some("A"));

    manager.rename_for_drag_and_drop(a, Some(b), STAMP).unwrap();
    assert_eq!(manager.name(a), Some("B::A"));
    assert_eq!(manager.name(a_child), Some("B::A::Child"));

    manager.rename_for_drag_and_drop(a_child, None, STAMP).unwrap();
    assert_eq!(manager.name(a_child), Some("Child"));
}

#[test]
fn test_children_are_sorted_and_exclude_prefix_siblings() {
    let mut manager = manager();
    let top = manager.id("Top", true, STAMP).unwrap().unwrap();
    manager.id("Top::B", true, STAMP).unwrap();
    manager.id("Top::A", true, STAMP).unwrap();
    manager.id("Topping", true, STAMP).unwrap();

    let children: Vec<String> = manager.children(top).into_iter().map(|(name, _)| name).collect();
    assert_eq!(children, vec!["Top::A", "Top::B"]);
    assert_eq!(manager.deck_and_child_ids(top)[0], top);
}

#[test]
fn test_collapse_toggles() {
    let mut manager = manager();
    assert!(manager.collapse(DEFAULT_DECK_ID, STAMP).unwrap());
    assert!(!manager.collapse(DEFAULT_DECK_ID, STAMP).unwrap());
    assert!(matches!(manager.collapse(404, STAMP), Err(SchedError::DeckNotFound(404))));
}

#[test]
fn test_config_lifecycle() {
    let mut manager = manager();
    let deck = manager.id("Fast", true, STAMP).unwrap().unwrap();
    let conf_id = manager.add_config("Quick", None, STAMP);
    manager.set_config(deck, conf_id, STAMP).unwrap();
    assert_eq!(manager.dids_for_config(conf_id), vec![deck]);

    let mut conf = manager.config(conf_id).unwrap().clone();
    conf.new.per_day = 99;
    manager.update_config(conf, STAMP).unwrap();
    assert_eq!(manager.config_for_deck(deck).new.per_day, 99);

    let old = manager.restore_config_to_default(conf_id, STAMP).unwrap();
    assert_eq!(old.new.per_day, 99);
    assert_eq!(manager.config_for_deck(deck).new.per_day, 20);
    assert_eq!(manager.config_for_deck(deck).name, "Quick");

    manager.remove_config(conf_id, STAMP).unwrap();
    assert_eq!(manager.config_for_deck(deck).id, DEFAULT_CONFIG_ID);
    assert!(matches!(manager.remove_config(DEFAULT_CONFIG_ID, STAMP), Err(SchedError::DefaultConfig)));
    assert!(matches!(manager.remove_config(conf_id, STAMP), Err(SchedError::ConfigNotFound(_))));
}

#[test]
fn test_config_for_missing_config_falls_back() {
    let mut deck = Deck::new_normal("Orphan");
    deck.id = 5;
    if let DeckKind::Normal(normal) = &mut deck.kind {
        normal.conf = 77;
    }
    let manager = DeckManager::load(vec![deck], Vec::new(), STAMP);
    assert_eq!(manager.config_for_deck(5).id, DEFAULT_CONFIG_ID);
}

#[test]
fn test_check_integrity_repairs_tree() {
    let mut orphan = Deck::new_normal("Missing::Child");
    orphan.id = 10;
    let mut first = Deck::new_normal("Dup");
    first.id = 11;
    let mut second = Deck::new_normal("dup");
    second.id = 12;
    let mut manager = DeckManager::load(vec![orphan, first, second], Vec::new(), STAMP);

    let repairs = manager.check_integrity(STAMP);

    assert_eq!(repairs, 2);
    assert!(manager.by_name("Missing").is_some());
    assert_eq!(manager.name(12), Some("dup+"));
}

#[test]
fn test_check_integrity_records_renames() {
    let mut first = Deck::new_normal("Verbs");
    first.id = 20;
    let mut second = Deck::new_normal("VERBS");
    second.id = 21;
    let mut manager = DeckManager::load(vec![first, second], Vec::new(), STAMP);
    manager.take_changes();

    assert_eq!(manager.check_integrity(STAMP), 1);
    let changes = manager.take_changes();
    assert_eq!(changes.decks.len(), 1);
    assert_eq!(changes.decks[0].id, 21);
    assert_eq!(changes.decks[0].name, "VERBS+");

    assert_eq!(manager.check_integrity(STAMP), 0);
    assert!(manager.take_changes().is_empty());
}

#[test]
fn test_remove_entry_is_reported() {
    let mut manager = manager();
    let deck = manager.id("Gone", true, STAMP).unwrap().unwrap();
    manager.take_changes();

    assert!(manager.remove_entry(deck).is_some());
    assert!(manager.remove_entry(deck).is_none());
    let changes = manager.take_changes();
    assert_eq!(changes.removed_decks, vec![deck]);
}
