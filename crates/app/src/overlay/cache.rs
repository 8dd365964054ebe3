//! Per-tag overlay instances.
//!
//! Visuals live in an arena of slots. `clear_all` hands every slot back to the
//! free list, and the next cycle's `place` calls reuse them, so a steady set
//! of tags does not reallocate the arena every frame.

use std::collections::HashMap;

use overlay_geometry::{Point2, Vector2};
use tracing::warn;

use crate::overlay::assets::{AssetRef, AssetResolver};

/// One image (or placeholder) anchored at a detected tag, in UI space.
#[derive(Clone, Debug)]
pub(crate) struct OverlayVisual {
    pub(crate) tag_id: i64,
    pub(crate) position: Point2,
    pub(crate) size: Vector2,
    pub(crate) asset: Option<AssetRef>,
    pub(crate) fallback_label: Option<String>,
}

impl OverlayVisual {
    /// Text drawn alongside the overlay.
    pub(crate) fn caption(&self) -> String {
        match (&self.asset, &self.fallback_label) {
            (Some(_), _) => format!("Detected Tag ID: {}", self.tag_id),
            (None, Some(label)) => label.clone(),
            (None, None) => format!("Tag ID: {}", self.tag_id),
        }
    }
}

#[derive(Default)]
pub(crate) struct OverlayCache {
    slots: Vec<Option<OverlayVisual>>,
    index: HashMap<i64, usize>,
    free: Vec<usize>,
}

impl OverlayCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the overlay for `tag_id`; last write wins.
    pub(crate) fn place(
        &mut self,
        tag_id: i64,
        position: Point2,
        size: Vector2,
        resolver: &impl AssetResolver,
    ) -> &OverlayVisual {
        let (asset, fallback_label) = match resolver.resolve(tag_id) {
            Ok(asset) => (Some(asset), None),
            Err(miss) => {
                let text = miss.placeholder_text(tag_id);
                warn!(tag_id, reason = miss.label(), "{text}");
                metrics::counter!("overlay_asset_misses_total", "reason" => miss.label())
                    .increment(1);
                (None, Some(text))
            }
        };

        let slot = self.acquire_slot(tag_id);
        self.slots[slot].insert(OverlayVisual {
            tag_id,
            position,
            size,
            asset,
            fallback_label,
        })
    }

    /// Drop every visual and release all slots.
    pub(crate) fn clear_all(&mut self) {
        for (_, slot) in self.index.drain() {
            self.slots[slot] = None;
            self.free.push(slot);
        }
    }

    #[cfg(test)]
    pub(crate) fn get(&self, tag_id: i64) -> Option<&OverlayVisual> {
        self.index
            .get(&tag_id)
            .and_then(|&slot| self.slots[slot].as_ref())
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Live visuals in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &OverlayVisual> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub(crate) fn tag_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.index.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Slots allocated so far, live or free.
    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn acquire_slot(&mut self, tag_id: i64) -> usize {
        if let Some(&slot) = self.index.get(&tag_id) {
            return slot;
        }
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.index.insert(tag_id, slot);
        slot
    }
}
