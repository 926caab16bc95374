//! Event menus (宴会菜单)

use shared::models::{EventMenu, EventMenuCreate, EventMenuUpdate};
use shared::types::EntityId;

use crate::orders::money;
use crate::store::{Commit, EntityStore, StoreError, StoreResult, to_object};

impl EntityStore {
    /// Menus by name
    pub fn event_menus(&self) -> Vec<EventMenu> {
        let mut menus: Vec<EventMenu> = self.read(|s| s.menus.values().cloned().collect());
        menus.sort_by(|a, b| a.name.cmp(&b.name));
        menus
    }

    pub fn event_menu(&self, id: &EntityId) -> Option<EventMenu> {
        self.read(|s| s.menus.get(id).cloned())
    }

    pub fn create_event_menu(&self, input: EventMenuCreate) -> StoreResult<Commit<EventMenu>> {
        if input.name.trim().is_empty() {
            return Err(StoreError::Validation("menu name is required".into()));
        }
        money::validate_amount(input.price_per_person, "price per person")?;
        let menu = EventMenu {
            id: EntityId::local(),
            name: input.name.trim().to_string(),
            price_per_person: input.price_per_person,
            description: input.description.filter(|d| !d.trim().is_empty()),
            active: true,
        };
        self.begin_insert(menu)
    }

    /// Price changes never reach events that already selected the menu
    pub fn update_event_menu(&self, id: &EntityId, update: EventMenuUpdate) -> StoreResult<Commit<EventMenu>> {
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(StoreError::Validation("menu name is required".into()));
        }
        if let Some(price) = update.price_per_person {
            money::validate_amount(price, "price per person")?;
        }
        let patch = to_object(&update).unwrap_or_default();
        if patch.is_empty() {
            return Err(StoreError::Validation("nothing to update".into()));
        }
        self.begin_update(id, patch)
    }

    pub fn delete_event_menu(&self, id: &EntityId) -> StoreResult<Commit<EventMenu>> {
        self.begin_delete(id)
    }
}
