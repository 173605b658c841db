//! Integration tests for grid containers

use void_inventory::*;

fn chest() -> ItemRef {
    Item::new("chest", "Chest").with_type("storage").with_size(2, 2).into_ref()
}

fn staff() -> ItemRef {
    Item::new("staff", "Staff").with_type("weapon").with_size(1, 3).into_ref()
}

#[test]
fn test_grid_from_config() {
    let config = ContainerConfig::from_json(
        r#"{ "id": "stash", "name": "Stash", "kind": "Grid", "grid_width": 6, "grid_height": 4 }"#,
    )
    .unwrap();
    let grid = GridContainer::from_config(&config).unwrap();

    assert_eq!((grid.width(), grid.height()), (6, 4));
    assert_eq!(grid.slots().len(), 24);
    assert!(grid.is_empty());

    let linear = ContainerConfig::linear("bag", 10);
    assert!(GridContainer::from_config(&linear).is_err());
    let flat = ContainerConfig::grid("flat", 6, 0);
    assert!(matches!(GridContainer::from_config(&flat), Err(InventoryError::InvalidGridSize { .. })));
}

#[test]
fn test_mixed_sizes() {
    let mut grid = GridContainer::new("stash", "Stash", 4, 3).unwrap();
    let potion = Item::new("potion", "Potion").with_stack(5).into_ref();

    assert_eq!(grid.add_items(&potion, 7, None).slots, vec![0, 1]);
    let placed = grid.add_items(&chest(), 1, None);
    assert_eq!(placed.slots, vec![2]);
    assert_eq!(grid.anchor_of(7), Some(2));

    // Next chest needs a 2x2 block: rows 1-2, columns 0-1
    assert_eq!(grid.add_items(&chest(), 1, None).slots, vec![4]);
    assert_eq!(grid.item_at(1, 2).map(|item| item.id.as_str()), Some("chest"));
    assert_eq!(grid.item_total_count("chest"), 2);
    assert!(grid.validate_caches());
}

#[test]
fn test_stackable_multi_cell() {
    let mut grid = GridContainer::new("stash", "Stash", 4, 2).unwrap();
    let crates = Item::new("crate", "Supply Crate").with_stack(5).with_size(2, 2).into_ref();

    let outcome = grid.add_items(&crates, 7, None);
    assert_eq!(outcome.slots, vec![0, 2]);
    assert_eq!(grid.slot(2).map(Slot::count), Some(2));

    let topped = grid.add_items(&crates, 4, None);
    assert_eq!(topped.added, 3);
    assert_eq!(topped.exceeded, 1);
    assert!(grid.is_full());
}

#[test]
fn test_cell_conditions() {
    let mut grid = GridContainer::new("belt", "Belt", 2, 2).unwrap();
    grid.set_cell_condition(0, 0, Some(ItemFilter::new().with_type("ammo"))).unwrap();

    assert_eq!(grid.add_items(&chest(), 1, None).result, AddItemResult::NoSuitableSlotFound);
    assert!(grid.set_cell_condition(5, 0, None).is_err());

    let arrow = Item::new("arrow", "Arrow").with_type("ammo").with_stack(20).into_ref();
    assert_eq!(grid.add_items(&arrow, 10, None).slots, vec![0]);
}

#[test]
fn test_explicit_placement() {
    let mut grid = GridContainer::new("stash", "Stash", 4, 4).unwrap();

    assert_eq!(grid.add_item_at(&chest(), 1, 4, 0, Rotation::Deg0).result, AddItemResult::SlotNotFound);
    assert_eq!(grid.add_item_at(&chest(), 1, 3, 3, Rotation::Deg0).result, AddItemResult::SlotNotFound);
    assert_eq!(grid.add_item_at(&chest(), 0, 0, 0, Rotation::Deg0).result, AddItemResult::AddNothing);

    assert!(grid.add_item_at(&staff(), 1, 0, 1, Rotation::Deg90).is_success());
    let placement = grid.placement(2 + 4).unwrap();
    assert_eq!(placement.anchor, 4);
    assert_eq!((placement.width, placement.height), (3, 1));
}

#[test]
fn test_remove_clears_footprints() {
    let mut grid = GridContainer::new("stash", "Stash", 4, 4).unwrap();
    grid.add_items(&chest(), 3, None);
    let queue = EventQueue::new();
    grid.subscribe(queue.listener());

    let outcome = grid.remove_item("chest", 2);
    assert!(outcome.is_success());
    assert_eq!(outcome.slots, vec![0, 2]);
    assert_eq!(grid.find_slot_indices("chest"), vec![8]);
    assert!(grid.slot(1).unwrap().is_empty());
    assert!(grid.slot(5).unwrap().is_empty());

    // Through a marker cell of the remaining chest
    assert!(grid.remove_item_at_index(13, 1, None).is_success());
    assert!(grid.is_empty());
    assert!(grid.validate_caches());

    let totals: Vec<_> = queue.drain().into_iter().filter(|e| e.is_total_count_changed()).collect();
    assert_eq!(totals.len(), 2);
}

#[test]
fn test_rotation_cycle() {
    let mut grid = GridContainer::new("stash", "Stash", 4, 4).unwrap();
    grid.add_item_at(&staff(), 1, 0, 0, Rotation::Deg0);
    let queue = EventQueue::new();
    grid.subscribe(queue.listener());

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(grid.rotate_item(4).or_else(|_| grid.rotate_item(1)).unwrap());
    }
    assert_eq!(seen, vec![Rotation::Deg90, Rotation::Deg180, Rotation::Deg270, Rotation::Deg0]);
    assert_eq!(grid.slot(8).and_then(Slot::marker_anchor), Some(0));

    let rotated = queue
        .drain()
        .into_iter()
        .filter(|e| matches!(e, ContainerEvent::ItemRotated { anchor: 0, .. }))
        .count();
    assert_eq!(rotated, 4);
    // Rotation moves no units
    assert_eq!(grid.item_total_count("staff"), 1);
    assert!(grid.validate_caches());

    assert!(matches!(grid.rotate_item(15), Err(InventoryError::NotAnAnchor(15))));
}

#[test]
fn test_grid_as_item_container() {
    fn stash_all(target: &mut impl ItemContainer, items: &[(ItemRef, u32)]) -> u32 {
        items.iter().map(|(item, count)| target.add_items(item, *count, None).exceeded).sum()
    }

    let mut grid = GridContainer::new("stash", "Stash", 3, 3).unwrap();
    let overflow = stash_all(&mut grid, &[(chest(), 1), (staff(), 2)]);
    assert_eq!(overflow, 1);
    assert_eq!(ItemContainer::find_slot_indices(&grid, "staff"), vec![2]);
}
