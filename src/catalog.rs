//! Box template catalog.
//!
//! Generates the fixed and parametrized template families and collapses
//! templates with identical composition into one canonical entry.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::model::BoxTemplate;
use crate::types::{CAPACITY_60, CAPACITY_250, CAPACITY_340, CAPACITY_750, UnitCounts};

/// `(60 ml count, 250/340 ml count)` pairs of the mixed 60 ml family.
///
/// The second value is split across 250 ml and 340 ml in every combination.
const SIXTY_MIX_PAIRS: [(u32, u32); 6] = [(8, 2), (6, 3), (6, 4), (5, 5), (3, 6), (1, 7)];

/// Extra units distributed over 60/250/340 ml next to two 750 ml units.
const TWO_750_EXTRA: u32 = 2;

/// Extra units distributed over 250/340 ml next to one 750 ml unit.
const ONE_750_EXTRA: u32 = 5;

/// Deduplicated, ordered list of templates the optimizer may place.
#[derive(Clone, Debug, Default)]
pub struct TemplateCatalog {
    templates: Vec<BoxTemplate>,
}

impl TemplateCatalog {
    /// Standard catalog for an inventory with the given pure-750 status.
    pub fn generate(pure_750: bool) -> Self {
        Self::from_templates(generate_templates(pure_750))
    }

    /// Deduplicates an arbitrary template list into a catalog.
    pub fn from_templates(templates: impl IntoIterator<Item = BoxTemplate>) -> Self {
        Self {
            templates: deduplicate(templates),
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BoxTemplate> {
        self.templates.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoxTemplate> {
        self.templates.iter()
    }

    pub fn as_slice(&self) -> &[BoxTemplate] {
        &self.templates
    }

    /// Finds a template by display name.
    pub fn find(&self, name: &str) -> Option<&BoxTemplate> {
        self.templates.iter().find(|tpl| tpl.name == name)
    }
}

/// Produces every candidate template, duplicates included.
///
/// The generator never omits templates based on `pure_750`; eligibility
/// is checked by the optimizer when a template is selected.
pub fn generate_templates(pure_750: bool) -> Vec<BoxTemplate> {
    let mut templates = vec![
        BoxTemplate::new(
            format!("{CAPACITY_60}×60"),
            UnitCounts::new(CAPACITY_60, 0, 0, 0),
        ),
        BoxTemplate::new(
            format!("{CAPACITY_250}×250"),
            UnitCounts::new(0, CAPACITY_250, 0, 0),
        ),
        BoxTemplate::new(
            format!("{CAPACITY_340}×340"),
            UnitCounts::new(0, 0, CAPACITY_340, 0),
        ),
        BoxTemplate::new(
            format!("{CAPACITY_750}×750"),
            UnitCounts::new(0, 0, 0, CAPACITY_750),
        ),
    ];

    // Two 750 ml plus two more units; the all-zero split is the pure 2×750 box.
    for a60 in 0..=TWO_750_EXTRA {
        for a250 in 0..=TWO_750_EXTRA - a60 {
            let a340 = TWO_750_EXTRA - a60 - a250;
            if a60 == 0 && a250 == 0 && a340 == 0 {
                continue;
            }
            templates.push(BoxTemplate::new(
                format!("2×750 + ({a60}×60,{a250}×250,{a340}×340)"),
                UnitCounts::new(a60, a250, a340, 2),
            ));
        }
    }

    for a250 in 0..=ONE_750_EXTRA {
        let a340 = ONE_750_EXTRA - a250;
        templates.push(BoxTemplate::new(
            format!("1×750 + ({a250}×250,{a340}×340)"),
            UnitCounts::new(0, a250, a340, 1),
        ));
    }

    templates.push(BoxTemplate::new("1×750 + 8×60", UnitCounts::new(8, 0, 0, 1)));
    templates.push(BoxTemplate::new("1×250 + 8×60", UnitCounts::new(8, 1, 0, 0)));

    for (a60, k) in SIXTY_MIX_PAIRS {
        for a250 in 0..=k {
            let a340 = k - a250;
            templates.push(BoxTemplate::new(
                format!("{k}×(250/340) + {a60}×60 → ({a250}×250,{a340}×340,{a60}×60)"),
                UnitCounts::new(a60, a250, a340, 0),
            ));
        }
    }

    debug!(
        pure_750,
        candidates = templates.len(),
        "generated template candidates"
    );
    templates
}

/// Keeps one template per `(composition, only_if_pure_750)` key.
///
/// The shortest name wins, ties go to the first one seen. Surviving
/// templates keep the position at which their key first appeared.
pub fn deduplicate(templates: impl IntoIterator<Item = BoxTemplate>) -> Vec<BoxTemplate> {
    let mut slots: FxHashMap<(UnitCounts, bool), usize> = FxHashMap::default();
    let mut unique: Vec<BoxTemplate> = Vec::new();

    for template in templates {
        match slots.get(&template.composition_key()) {
            Some(&slot) => {
                if template.name_len() < unique[slot].name_len() {
                    unique[slot] = template;
                }
            }
            None => {
                slots.insert(template.composition_key(), unique.len());
                unique.push(template);
            }
        }
    }

    unique
}
