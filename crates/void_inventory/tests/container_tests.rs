//! Integration tests for linear containers

use void_inventory::*;

fn potion() -> ItemRef {
    Item::new("potion", "Potion").with_type("consumable").with_stack(10).with_weight(0.5).into_ref()
}

fn sword() -> ItemRef {
    Item::new("sword", "Sword").with_type("weapon").with_weight(3.5).into_ref()
}

#[test]
fn test_from_json_config() {
    let config = ContainerConfig::from_json(
        r#"{ "id": "backpack", "name": "Backpack", "capacity": 4, "stack_sort_threshold": 2 }"#,
    )
    .unwrap();
    let mut backpack = Container::from_config(&config).unwrap();

    assert_eq!(backpack.id(), "backpack");
    assert_eq!(backpack.capacity(), Capacity::Fixed(4));
    assert_eq!(backpack.add_items(&potion(), 45, None).exceeded, 5);

    let grid_config = ContainerConfig::grid("stash", 4, 4);
    assert!(matches!(Container::from_config(&grid_config), Err(InventoryError::Config(_))));

    let negative = ContainerConfig::linear("broken", -3);
    assert!(matches!(Container::from_config(&negative), Err(InventoryError::InvalidCapacity(-3))));
}

#[test]
fn test_container_conditions() {
    let mut rack = Container::new("rack", "Weapon Rack", Capacity::Fixed(4))
        .with_condition(ItemFilter::equipment())
        .with_condition(|item: &Item| item.weight < 10.0);

    assert!(rack.add_items(&sword(), 1, None).is_success());
    assert_eq!(rack.add_items(&potion(), 1, None).result, AddItemResult::ItemConditionNotMet);

    let anvil = Item::new("anvil", "Anvil").with_type("weapon").with_weight(80.0).into_ref();
    assert_eq!(rack.add_items(&anvil, 1, None).result, AddItemResult::ItemConditionNotMet);
    assert_eq!(rack.can_accept(&anvil, 1), 0);

    rack.clear_conditions();
    assert!(rack.add_items(&anvil, 1, None).is_success());
}

#[test]
fn test_add_by_id() {
    let mut registry = ItemRegistry::new();
    registry.register(Item::new("gem", "Gem").with_type("valuable").with_stack(99));

    let mut pouch = Container::new("pouch", "Pouch", Capacity::Fixed(1));
    let outcome = pouch.add_items_by_id(&registry, "gem", 120);
    assert_eq!(outcome.added, 99);
    assert_eq!(outcome.exceeded, 21);
    assert_eq!(pouch.add_items_by_id(&registry, "ruby", 1).result, AddItemResult::ItemIsNull);
}

#[test]
fn test_queries() {
    let mut bag = Container::new("bag", "Bag", Capacity::Fixed(6));
    bag.add_items(&potion(), 14, None);
    bag.add_items(&sword(), 2, None);

    assert_eq!(bag.find_slot_indices("potion"), vec![0, 1]);
    assert_eq!(bag.find_slot_indices_by_type("weapon"), vec![2, 3]);
    assert_eq!(bag.occupied_slot_count(), 4);
    assert_eq!(bag.empty_slot_count(), 2);
    assert!(bag.has_items("potion", 14));
    assert!(!bag.has_items("potion", 15));
    assert!((bag.total_weight() - 14.0).abs() < f32::EPSILON);

    let counts = bag.get_all_item_counts();
    assert_eq!(counts.get("potion"), Some(&14));
    assert_eq!(counts.get("sword"), Some(&2));
}

#[test]
fn test_unlimited_stack() {
    let mut vault = Container::new("vault", "Vault", Capacity::Fixed(1));
    let coin = Item::new("coin", "Coin").with_stack(0).into_ref();

    vault.add_items(&coin, 100_000, None);
    vault.add_items(&coin, 5, None);
    assert_eq!(vault.slot(0).map(Slot::count), Some(100_005));
    assert!(!vault.is_full());
    assert_eq!(vault.can_accept(&coin, 7), 7);
}

#[test]
fn test_clear_reports_totals() {
    let mut bag = Container::new("bag", "Bag", Capacity::Unbounded);
    bag.add_items(&potion(), 25, None);
    bag.add_items(&sword(), 1, None);

    let queue = EventQueue::new();
    bag.subscribe(queue.listener());
    bag.clear();

    let events = queue.drain();
    assert_eq!(events.iter().filter(|e| e.is_slot_count_changed()).count(), 4);
    let zeroed = events
        .iter()
        .filter(|e| matches!(e, ContainerEvent::ItemTotalCountChanged { new_total: 0, .. }))
        .count();
    assert_eq!(zeroed, 2);
    assert!(bag.is_empty());
}

#[test]
fn test_unsubscribe() {
    let mut bag = Container::new("bag", "Bag", Capacity::Unbounded);
    let queue = EventQueue::new();
    let id = bag.subscribe(queue.listener());

    bag.add_items(&potion(), 1, None);
    assert!(!queue.drain().is_empty());

    assert!(bag.unsubscribe(id));
    bag.add_items(&potion(), 1, None);
    assert!(queue.is_empty());
}

#[test]
fn test_rebuild_when_in_sync() {
    let mut bag = Container::new("bag", "Bag", Capacity::Unbounded);
    bag.add_items(&potion(), 12, None);

    let queue = EventQueue::new();
    bag.subscribe(queue.listener());
    bag.rebuild_caches();

    let events = queue.drain();
    assert!(matches!(events.first(), Some(ContainerEvent::CachesRebuilt)));
    // Totals were already in sync, nothing else to report
    assert_eq!(events.len(), 1);
    assert!(bag.validate_caches());
}

#[test]
fn test_rearranging() {
    let mut bag = Container::new("bag", "Bag", Capacity::Fixed(4));
    bag.add_items(&potion(), 16, None);
    bag.set_slot_condition(3, Some(ItemFilter::new().with_type("weapon"))).unwrap();

    assert!(!bag.move_item(1, 3));
    // Slot 0 is already a full stack
    assert!(!bag.move_item(1, 0));
    assert!(bag.split_stack(0, 3, 2));
    assert!(bag.move_item(2, 1));
    assert_eq!(bag.slot(1).map(Slot::count), Some(9));
    assert_eq!(bag.item_total_count("potion"), 16);
    assert!(bag.validate_caches());
}

#[test]
fn test_transfer_between_containers() {
    fn transfer(from: &mut impl ItemContainer, to: &mut impl ItemContainer, item: &ItemRef, count: u32) -> u32 {
        let accepted = to.add_items(item, count, None);
        if accepted.added > 0 {
            let removed = from.remove_item(&item.id, accepted.added);
            assert!(removed.is_success());
        }
        accepted.added
    }

    let mut bag = Container::new("bag", "Bag", Capacity::Unbounded);
    let mut belt = Container::new("belt", "Belt", Capacity::Fixed(1));
    bag.add_items(&potion(), 25, None);

    assert_eq!(transfer(&mut bag, &mut belt, &potion(), 25), 10);
    assert_eq!(bag.item_total_count("potion"), 15);
    assert_eq!(belt.item_total_count("potion"), 10);
    assert!(ItemContainer::is_full(&belt));
}
