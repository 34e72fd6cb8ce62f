use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::custom_data::CustomData;

/// How many history versions an entry keeps before truncation.
pub const DEFAULT_HISTORY_MAX_ITEMS: usize = 10;

/// An image attached to the database and referenced by entries and
/// groups through [`Icon::Custom`](crate::Icon::Custom).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomIcon {
    pub data: Vec<u8>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Database-wide auxiliary state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    custom_icons: HashMap<Uuid, CustomIcon>,
    /// Icon UUIDs in display order.
    custom_icons_order: Vec<Uuid>,
    custom_data: CustomData,
    history_max_items: usize,
}

impl Metadata {
    pub fn new() -> Self {
        Self {
            custom_icons: HashMap::new(),
            custom_icons_order: Vec::new(),
            custom_data: CustomData::new(),
            history_max_items: DEFAULT_HISTORY_MAX_ITEMS,
        }
    }

    pub fn custom_icons_order(&self) -> &[Uuid] {
        &self.custom_icons_order
    }

    pub fn has_custom_icon(&self, uuid: Uuid) -> bool {
        self.custom_icons.contains_key(&uuid)
    }

    pub fn custom_icon(&self, uuid: Uuid) -> Option<&CustomIcon> {
        self.custom_icons.get(&uuid)
    }

    /// Add an icon, appending it to the display order if it is new.
    /// Adding an existing UUID replaces the image data in place.
    pub fn add_custom_icon(&mut self, uuid: Uuid, icon: CustomIcon) {
        if self.custom_icons.insert(uuid, icon).is_none() {
            self.custom_icons_order.push(uuid);
        }
    }

    pub fn remove_custom_icon(&mut self, uuid: Uuid) -> Option<CustomIcon> {
        let removed = self.custom_icons.remove(&uuid);
        if removed.is_some() {
            self.custom_icons_order.retain(|id| *id != uuid);
        }
        removed
    }

    pub fn custom_data(&self) -> &CustomData {
        &self.custom_data
    }

    pub fn custom_data_mut(&mut self) -> &mut CustomData {
        &mut self.custom_data
    }

    pub fn history_max_items(&self) -> usize {
        self.history_max_items
    }

    pub fn set_history_max_items(&mut self, max: usize) {
        self.history_max_items = max;
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}
