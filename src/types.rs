//! Common types for per-size unit bookkeeping.
//!
//! This module defines the four item sizes, their single-size box capacities
//! and the `UnitCounts` vector that every other module uses to describe
//! how many units of each size a template, box or inventory holds.

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::ValidationError;

/// Maximum number of 60 ml units a box holds when filled with 60 ml only.
pub const CAPACITY_60: u32 = 10;

/// Maximum number of 250 ml units a box holds when filled with 250 ml only.
pub const CAPACITY_250: u32 = 8;

/// Maximum number of 340 ml units a box holds when filled with 340 ml only.
pub const CAPACITY_340: u32 = 8;

/// Maximum number of 750 ml units a box holds when filled with 750 ml only.
pub const CAPACITY_750: u32 = 2;

/// One of the four fixed item sizes.
///
/// The declaration order is the canonical size order (60, 250, 340, 750)
/// used for draining leftovers and for rendering tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum ItemSize {
    #[serde(rename = "60")]
    Ml60,
    #[serde(rename = "250")]
    Ml250,
    #[serde(rename = "340")]
    Ml340,
    #[serde(rename = "750")]
    Ml750,
}

impl ItemSize {
    /// All sizes in canonical order.
    pub const ALL: [ItemSize; 4] = [
        ItemSize::Ml60,
        ItemSize::Ml250,
        ItemSize::Ml340,
        ItemSize::Ml750,
    ];

    /// Nominal volume in millilitres, which doubles as the size identifier.
    #[inline]
    pub const fn millilitres(self) -> u32 {
        match self {
            ItemSize::Ml60 => 60,
            ItemSize::Ml250 => 250,
            ItemSize::Ml340 => 340,
            ItemSize::Ml750 => 750,
        }
    }

    /// Maximum units per box when the box holds this size alone.
    #[inline]
    pub const fn capacity(self) -> u32 {
        match self {
            ItemSize::Ml60 => CAPACITY_60,
            ItemSize::Ml250 => CAPACITY_250,
            ItemSize::Ml340 => CAPACITY_340,
            ItemSize::Ml750 => CAPACITY_750,
        }
    }

    /// Size identifier as used on the wire and in table headers.
    pub const fn label(self) -> &'static str {
        match self {
            ItemSize::Ml60 => "60",
            ItemSize::Ml250 => "250",
            ItemSize::Ml340 => "340",
            ItemSize::Ml750 => "750",
        }
    }
}

impl fmt::Display for ItemSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ml", self.millilitres())
    }
}

/// Accepts `"60"` as well as `"60ml"` / `"60 ml"` (case-insensitive).
impl FromStr for ItemSize {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let lowered = raw.trim().to_ascii_lowercase();
        let digits = lowered.strip_suffix("ml").unwrap_or(&lowered).trim_end();
        ItemSize::ALL
            .into_iter()
            .find(|size| size.label() == digits)
            .ok_or_else(|| ValidationError::UnknownSize(raw.to_string()))
    }
}

/// Per-size unit vector.
///
/// Used for template compositions, box contents, inventories and the
/// optimizer's search state alike.
///
/// # Examples
/// ```
/// use box_planner::types::UnitCounts;
///
/// let stock = UnitCounts::new(8, 0, 0, 1);
/// let template = UnitCounts::new(8, 0, 0, 1);
/// assert!(template.fits_within(&stock));
/// assert!((stock - template).is_zero());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct UnitCounts {
    pub c60: u32,
    pub c250: u32,
    pub c340: u32,
    pub c750: u32,
}

impl UnitCounts {
    #[inline]
    pub const fn new(c60: u32, c250: u32, c340: u32, c750: u32) -> Self {
        Self {
            c60,
            c250,
            c340,
            c750,
        }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// A vector holding `count` units of a single size.
    #[inline]
    pub const fn single(size: ItemSize, count: u32) -> Self {
        match size {
            ItemSize::Ml60 => Self::new(count, 0, 0, 0),
            ItemSize::Ml250 => Self::new(0, count, 0, 0),
            ItemSize::Ml340 => Self::new(0, 0, count, 0),
            ItemSize::Ml750 => Self::new(0, 0, 0, count),
        }
    }

    #[inline]
    pub const fn get(&self, size: ItemSize) -> u32 {
        match size {
            ItemSize::Ml60 => self.c60,
            ItemSize::Ml250 => self.c250,
            ItemSize::Ml340 => self.c340,
            ItemSize::Ml750 => self.c750,
        }
    }

    #[inline]
    pub fn set(&mut self, size: ItemSize, count: u32) {
        match size {
            ItemSize::Ml60 => self.c60 = count,
            ItemSize::Ml250 => self.c250 = count,
            ItemSize::Ml340 => self.c340 = count,
            ItemSize::Ml750 => self.c750 = count,
        }
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.c60 == 0 && self.c250 == 0 && self.c340 == 0 && self.c750 == 0
    }

    /// Sum over all sizes.
    #[inline]
    pub const fn total(&self) -> u32 {
        self.c60 + self.c250 + self.c340 + self.c750
    }

    /// Checks if every component is <= the corresponding component of `available`.
    #[inline]
    pub const fn fits_within(&self, available: &Self) -> bool {
        self.c60 <= available.c60
            && self.c250 <= available.c250
            && self.c340 <= available.c340
            && self.c750 <= available.c750
    }

    /// True iff only 750 ml units are present and there is at least one.
    #[inline]
    pub const fn is_pure_750(&self) -> bool {
        self.c60 == 0 && self.c250 == 0 && self.c340 == 0 && self.c750 > 0
    }

    /// Number of single-size partial boxes needed to drain these units.
    ///
    /// Sum over sizes of `ceil(count / capacity)`.
    #[inline]
    pub fn drain_box_count(&self) -> u32 {
        ItemSize::ALL
            .into_iter()
            .map(|size| self.get(size).div_ceil(size.capacity()))
            .sum()
    }

    /// Largest single-size `ceil(count / capacity)`.
    ///
    /// No box can hold more than one size's capacity, so no plan uses fewer boxes.
    #[inline]
    pub fn box_lower_bound(&self) -> u32 {
        ItemSize::ALL
            .into_iter()
            .map(|size| self.get(size).div_ceil(size.capacity()))
            .max()
            .unwrap_or(0)
    }

    /// Component-wise subtraction clamped at zero.
    #[inline]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self::new(
            self.c60.saturating_sub(rhs.c60),
            self.c250.saturating_sub(rhs.c250),
            self.c340.saturating_sub(rhs.c340),
            self.c750.saturating_sub(rhs.c750),
        )
    }

    /// Iterates `(size, count)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemSize, u32)> + '_ {
        ItemSize::ALL.into_iter().map(|size| (size, self.get(size)))
    }
}

impl Add for UnitCounts {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(
            self.c60 + rhs.c60,
            self.c250 + rhs.c250,
            self.c340 + rhs.c340,
            self.c750 + rhs.c750,
        )
    }
}

/// Callers check `fits_within` first; underflow is a logic error.
impl Sub for UnitCounts {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        debug_assert!(rhs.fits_within(&self), "unit subtraction underflow");
        Self::new(
            self.c60 - rhs.c60,
            self.c250 - rhs.c250,
            self.c340 - rhs.c340,
            self.c750 - rhs.c750,
        )
    }
}

impl std::iter::Sum for UnitCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}
