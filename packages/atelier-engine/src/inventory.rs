use crate::domain::types::{ClothingItem, ProjectedItem};
use crate::error::FitError;
use std::collections::HashSet;

/// Top, bottom and shoes must each be filled by a distinct garment.
pub const MIN_DISTINCT_ITEMS: usize = 3;

/// The per-request, deduplicated view of the wardrobe that prompts are built
/// from and oracle answers are checked against.
#[derive(Debug, Clone)]
pub struct ProjectedInventory {
    items: Vec<ProjectedItem>,
    ids: HashSet<String>,
}

impl ProjectedInventory {
    pub fn items(&self) -> &[ProjectedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&ProjectedItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.items).unwrap_or_default()
    }
}

/// Projects the caller's inventory plus any borrowed garments. The first
/// occurrence of an id wins and input order is kept.
pub fn project(
    inventory: &[ClothingItem],
    borrowed: &[ClothingItem],
) -> Result<ProjectedInventory, FitError> {
    let mut ids = HashSet::new();
    let mut items = Vec::with_capacity(inventory.len() + borrowed.len());

    for item in inventory.iter().chain(borrowed) {
        if ids.insert(item.id.clone()) {
            items.push(ProjectedItem::from(item));
        }
    }

    if items.len() < MIN_DISTINCT_ITEMS {
        return Err(FitError::InsufficientInventory {
            found: items.len(),
            required: MIN_DISTINCT_ITEMS,
        });
    }

    Ok(ProjectedInventory { items, ids })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Category;

    fn item(id: &str, category: Category) -> ClothingItem {
        ClothingItem::new(id, category)
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_and_order() {
        let inventory = vec![
            item("a", Category::Top).with_color("white"),
            item("b", Category::Bottom),
            item("a", Category::Top).with_color("black"),
            item("c", Category::Shoes),
        ];
        let projected = project(&inventory, &[]).unwrap();
        let ids: Vec<&str> = projected.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(
            projected.get("a").unwrap().attributes.color.as_deref(),
            Some("white")
        );
    }

    #[test]
    fn test_borrowed_items_are_appended() {
        let inventory = vec![item("a", Category::Top), item("b", Category::Bottom)];
        let borrowed = vec![item("friend-shoes", Category::Shoes), item("a", Category::Top)];
        let projected = project(&inventory, &borrowed).unwrap();
        assert_eq!(projected.len(), 3);
        assert!(projected.contains("friend-shoes"));
        assert_eq!(projected.items()[2].id, "friend-shoes");
    }

    #[test]
    fn test_duplicates_do_not_count_towards_minimum() {
        let inventory = vec![
            item("a", Category::Top),
            item("a", Category::Top),
            item("b", Category::Bottom),
        ];
        match project(&inventory, &[]) {
            Err(FitError::InsufficientInventory { found, required }) => {
                assert_eq!(found, 2);
                assert_eq!(required, 3);
            }
            other => panic!("expected InsufficientInventory, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_inventory_fails() {
        assert!(matches!(
            project(&[], &[]),
            Err(FitError::InsufficientInventory { found: 0, .. })
        ));
    }

    #[test]
    fn test_prompt_json_is_an_array_of_projections() {
        let inventory = vec![
            item("a", Category::Top).with_style_tags(&["casual"]),
            item("b", Category::Bottom),
            item("c", Category::Shoes),
        ];
        let projected = project(&inventory, &[]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&projected.to_prompt_json()).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 3);
        assert_eq!(value[0]["attributes"]["style_tags"][0], "casual");
        assert!(value[1]["attributes"].get("style_tags").is_none());
    }
}
