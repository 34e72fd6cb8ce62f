//! Reconciliation of database-wide auxiliary state.
//!
//! Custom icons are additive only: icons the target is missing are
//! copied over, removals are not propagated. Custom data is reconciled
//! as a whole map when the source's copy is newer, removing unprotected
//! keys absent from the source and transferring differing values. The
//! reserved `LastModified` key is never merged explicitly; the data
//! model regenerates it on every write.

use haven_model::CustomData;

use crate::change::{Change, ChangeList};
use crate::merger::Merger;

impl Merger<'_> {
    pub(crate) fn merge_metadata(&mut self) -> ChangeList {
        let mut changes = ChangeList::new();
        let source_meta = self.source.metadata();

        for icon_uuid in source_meta.custom_icons_order().to_vec() {
            if self.target.metadata().has_custom_icon(icon_uuid) {
                continue;
            }
            let Some(icon) = source_meta.custom_icon(icon_uuid) else {
                continue;
            };
            self.target
                .metadata_mut()
                .add_custom_icon(icon_uuid, icon.clone());
            changes.push(Change::unspecified(format!(
                "Adding missing icon {}",
                icon_uuid.simple()
            )));
        }

        let source_data = source_meta.custom_data();
        let target_data = self.target.metadata().custom_data();
        let target_has_stamp = target_data.contains(CustomData::LAST_MODIFIED);
        let both_newer = match (target_data.last_modified(), source_data.last_modified()) {
            (Some(target_stamp), Some(source_stamp)) => target_stamp < source_stamp,
            _ => false,
        };
        if target_has_stamp && !both_newer {
            return changes;
        }

        // Keys the source dropped are removed here too, unless the
        // source marks them protected.
        let target_keys: Vec<String> = target_data.keys().map(str::to_string).collect();
        for key in target_keys {
            if source_data.contains(&key) || source_data.is_protected(&key) {
                continue;
            }
            let value = self
                .target
                .metadata()
                .custom_data()
                .value(&key)
                .unwrap_or_default()
                .to_string();
            self.target.metadata_mut().custom_data_mut().remove(&key);
            changes.push(Change::unspecified(format!(
                "Removed custom data {key} [{value}]"
            )));
        }

        for key in source_data.keys() {
            if key == CustomData::LAST_MODIFIED {
                continue;
            }
            let source_value = source_data.value(key).unwrap_or_default().to_string();
            if self.target.metadata().custom_data().value(key) == Some(source_value.as_str()) {
                continue;
            }
            self.target
                .metadata_mut()
                .custom_data_mut()
                .set(key, source_value.clone());
            changes.push(Change::unspecified(format!(
                "Adding custom data {key} [{source_value}]"
            )));
        }
        changes
    }
}
