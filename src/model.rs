//! Data models for box planning.
//!
//! This module defines the fundamental data structures of a packing plan:
//! - `InventoryCounts`: Snapshot of the units that still need packing
//! - `BoxTemplate`: A named recipe describing one way to fill a box
//! - `PackedBox`: A placed template or partial box inside a plan
//! - `PackingPlan`: The ordered boxes plus a leftover summary

use serde::Serialize;
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{ItemSize, UnitCounts};

/// Validation error for inventory data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unknown item size '{0}', expected one of 60, 250, 340, 750")]
    UnknownSize(String),
    #[error("{0} is given more than once")]
    DuplicateSize(ItemSize),
    #[error("{size} count {count} exceeds the limit of {limit} units per size")]
    CountLimitExceeded {
        size: ItemSize,
        count: u32,
        limit: u32,
    },
}

/// Converts a raw quantity into a unit count.
///
/// Non-finite and negative values become 0, fractions are truncated.
pub fn sanitize_count(raw: f64) -> u32 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    // `as` saturates at u32::MAX for out-of-range floats.
    raw.trunc() as u32
}

/// Immutable snapshot of the units that must be shipped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InventoryCounts {
    units: UnitCounts,
}

impl InventoryCounts {
    pub const fn new(c60: u32, c250: u32, c340: u32, c750: u32) -> Self {
        Self {
            units: UnitCounts::new(c60, c250, c340, c750),
        }
    }

    pub const fn from_units(units: UnitCounts) -> Self {
        Self { units }
    }

    /// Builds a snapshot from raw per-size quantities, sanitizing each one.
    pub fn from_raw<I>(raw: I) -> Self
    where
        I: IntoIterator<Item = (ItemSize, f64)>,
    {
        let mut units = UnitCounts::zero();
        for (size, value) in raw {
            units.set(size, sanitize_count(value));
        }
        Self { units }
    }

    #[inline]
    pub const fn units(&self) -> UnitCounts {
        self.units
    }

    #[inline]
    pub const fn get(&self, size: ItemSize) -> u32 {
        self.units.get(size)
    }

    /// True iff every size other than 750 ml is zero and 750 ml is positive.
    #[inline]
    pub const fn is_pure_750(&self) -> bool {
        self.units.is_pure_750()
    }

    /// Rejects snapshots where a single size exceeds `limit`.
    pub fn ensure_within(&self, limit: u32) -> Result<(), ValidationError> {
        match self.units.iter().find(|(_, count)| *count > limit) {
            Some((size, count)) => Err(ValidationError::CountLimitExceeded { size, count, limit }),
            None => Ok(()),
        }
    }

    /// Human readable one-liner, e.g. `60ml 8, 250ml 0, 340ml 0, 750ml 1`.
    pub fn pretty(&self) -> String {
        self.units
            .iter()
            .map(|(size, count)| format!("{} {}", size, count))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A named, fixed combination of units that fills one box.
///
/// `only_if_pure_750` restricts the template to inventories that consist
/// exclusively of 750 ml units; it is evaluated at selection time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct BoxTemplate {
    pub name: String,
    pub units: UnitCounts,
    pub only_if_pure_750: bool,
}

impl BoxTemplate {
    pub fn new(name: impl Into<String>, units: UnitCounts) -> Self {
        Self {
            name: name.into(),
            units,
            only_if_pure_750: false,
        }
    }

    /// Marks the template as usable for pure-750 inventories only.
    pub fn pure_750_only(mut self) -> Self {
        self.only_if_pure_750 = true;
        self
    }

    /// Identity used for deduplication: composition plus eligibility flag.
    #[inline]
    pub fn composition_key(&self) -> (UnitCounts, bool) {
        (self.units, self.only_if_pure_750)
    }

    /// Display length in characters, used to pick the canonical label.
    #[inline]
    pub fn name_len(&self) -> usize {
        self.name.chars().count()
    }

    /// Checks whether the template can be placed on `remaining` units.
    #[inline]
    pub fn is_applicable(&self, remaining: &UnitCounts, pure_750: bool) -> bool {
        self.units.fits_within(remaining) && (!self.only_if_pure_750 || pure_750)
    }
}

/// Origin of a box inside a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BoxKind {
    Template,
    Partial,
}

/// A box in the final plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct PackedBox {
    pub name: String,
    pub units: UnitCounts,
    pub kind: BoxKind,
}

impl PackedBox {
    /// Instantiates a catalog template.
    pub fn from_template(template: &BoxTemplate) -> Self {
        Self {
            name: template.name.clone(),
            units: template.units,
            kind: BoxKind::Template,
        }
    }

    /// Single-size box holding `count` units of `size`.
    pub fn partial(size: ItemSize, count: u32) -> Self {
        debug_assert!(count > 0 && count <= size.capacity());
        Self {
            name: format!("Partial box: {}×{}", count, size.label()),
            units: UnitCounts::single(size, count),
            kind: BoxKind::Partial,
        }
    }

    #[inline]
    pub fn is_partial(&self) -> bool {
        self.kind == BoxKind::Partial
    }
}

/// Totals reported next to the box list.
///
/// `left_*` is always 0 for a plan produced by the optimizer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[schema(example = json!({"boxes": 2, "left_60": 0, "left_250": 0, "left_340": 0, "left_750": 0}))]
pub struct PlanSummary {
    pub boxes: usize,
    pub left_60: u32,
    pub left_250: u32,
    pub left_340: u32,
    pub left_750: u32,
}

/// Ordered boxes covering an inventory, plus summary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackingPlan {
    pub inventory: InventoryCounts,
    pub boxes: Vec<PackedBox>,
    pub summary: PlanSummary,
}

impl PackingPlan {
    /// Assembles a plan and derives its summary from what the boxes actually hold.
    pub fn new(inventory: InventoryCounts, boxes: Vec<PackedBox>) -> Self {
        let left = inventory.units().saturating_sub(Self::sum_units(&boxes));
        let summary = PlanSummary {
            boxes: boxes.len(),
            left_60: left.c60,
            left_250: left.c250,
            left_340: left.c340,
            left_750: left.c750,
        };
        Self {
            inventory,
            boxes,
            summary,
        }
    }

    fn sum_units(boxes: &[PackedBox]) -> UnitCounts {
        boxes.iter().map(|b| b.units).sum()
    }

    /// Units placed across all boxes.
    pub fn shipped_units(&self) -> UnitCounts {
        Self::sum_units(&self.boxes)
    }

    pub fn box_count(&self) -> usize {
        self.boxes.len()
    }

    pub fn partial_box_count(&self) -> usize {
        self.boxes.iter().filter(|b| b.is_partial()).count()
    }

    /// Every unit of the inventory is in exactly one box.
    pub fn is_complete(&self) -> bool {
        self.shipped_units() == self.inventory.units()
    }
}
