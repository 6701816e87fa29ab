//! Optimization logic for box planning.
//!
//! This module implements an exact, memoized search over the remaining
//! per-size counts that selects the sequence of catalog templates with:
//! - the fewest boxes in total (templates plus drained partial boxes)
//! - the most full templates among equally short plans
//! - the smallest drained remainder among those
//!
//! The chosen templates are then replayed into boxes and anything left is
//! drained into single-size partial boxes.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::TemplateCatalog;
use crate::model::{InventoryCounts, PackedBox, PackingPlan};
use crate::stack::ensure_sufficient_stack;
use crate::types::{ItemSize, UnitCounts};

/// Objective of a (partial) plan, compared lexicographically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PlanScore {
    /// Total boxes: placed templates plus boxes for the drained remainder.
    pub cost: u32,
    /// Number of templates placed.
    pub full_count: u32,
    /// Boxes contributed by the unmatched remainder at the end of the path.
    pub tail_partial: u32,
}

impl PlanScore {
    /// Score of placing nothing and draining `remaining` into partial boxes.
    #[inline]
    pub fn drain_only(remaining: &UnitCounts) -> Self {
        let partial = remaining.drain_box_count();
        Self {
            cost: partial,
            full_count: 0,
            tail_partial: partial,
        }
    }

    /// Score of placing one more template on top of `child`.
    #[inline]
    pub fn after_template(child: &Self) -> Self {
        Self {
            cost: child.cost + 1,
            full_count: child.full_count + 1,
            tail_partial: child.tail_partial,
        }
    }

    /// Priority: cost (low) > full_count (high) > tail_partial (low).
    ///
    /// Strict: equal scores are never better, so the first candidate wins.
    pub fn is_better_than(&self, other: &Self) -> bool {
        if self.cost != other.cost {
            return self.cost < other.cost;
        }
        if self.full_count != other.full_count {
            return self.full_count > other.full_count;
        }
        self.tail_partial < other.tail_partial
    }
}

/// Best result for one search state.
///
/// `step` links to the chosen template and the shared outcome of the state
/// it leads to, so the optimal picks form a persistent list.
#[derive(Debug)]
pub struct Outcome {
    pub score: PlanScore,
    step: Option<(usize, Rc<Outcome>)>,
}

impl Outcome {
    /// Catalog indices along the optimal path, in application order.
    pub fn picks(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(self), |outcome| {
            outcome.step.as_ref().map(|(_, child)| child.as_ref())
        })
        .filter_map(|outcome| outcome.step.as_ref().map(|(index, _)| *index))
    }
}

/// Memoized search over remaining `(60, 250, 340, 750)` counts.
///
/// The memo lives as long as the optimizer, i.e. one planning run.
pub struct PlanOptimizer<'a> {
    catalog: &'a TemplateCatalog,
    pure_750: bool,
    memo: FxHashMap<UnitCounts, Rc<Outcome>>,
}

impl<'a> PlanOptimizer<'a> {
    /// `pure_750` must describe the original inventory, not a search state.
    pub fn new(catalog: &'a TemplateCatalog, pure_750: bool) -> Self {
        Self {
            catalog,
            pure_750,
            memo: FxHashMap::default(),
        }
    }

    /// Returns the optimal outcome for `remaining`, computing it at most once.
    pub fn solve(&mut self, remaining: UnitCounts) -> Rc<Outcome> {
        if let Some(known) = self.memo.get(&remaining) {
            return Rc::clone(known);
        }

        let outcome = ensure_sufficient_stack(|| self.evaluate(remaining));
        self.memo.insert(remaining, Rc::clone(&outcome));
        outcome
    }

    fn evaluate(&mut self, remaining: UnitCounts) -> Rc<Outcome> {
        let catalog = self.catalog;
        let mut best = Outcome {
            score: PlanScore::drain_only(&remaining),
            step: None,
        };

        for (index, template) in catalog.iter().enumerate() {
            if !template.is_applicable(&remaining, self.pure_750) {
                continue;
            }

            let child = self.solve(remaining - template.units);
            let score = PlanScore::after_template(&child.score);
            if score.is_better_than(&best.score) {
                best = Outcome {
                    score,
                    step: Some((index, child)),
                };
            }
        }

        Rc::new(best)
    }

    /// Number of distinct states evaluated so far.
    pub fn states_evaluated(&self) -> usize {
        self.memo.len()
    }
}

/// Events emitted while a plan is built, suitable for live streaming.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum PlanEvent {
    /// The deduplicated catalog is ready.
    CatalogReady { templates: usize, pure_750: bool },
    /// The search finished.
    Optimized {
        cost: u32,
        full_count: u32,
        tail_partial: u32,
        states: usize,
    },
    /// A box was appended to the plan.
    BoxEmitted {
        index: usize,
        name: String,
        c60: u32,
        c250: u32,
        c340: u32,
        c750: u32,
        partial: bool,
    },
    /// Planning is complete.
    Finished { boxes: usize },
}

impl PlanEvent {
    fn box_emitted(index: usize, packed: &PackedBox) -> Self {
        PlanEvent::BoxEmitted {
            index,
            name: packed.name.clone(),
            c60: packed.units.c60,
            c250: packed.units.c250,
            c340: packed.units.c340,
            c750: packed.units.c750,
            partial: packed.is_partial(),
        }
    }
}

/// Computes the packing plan for an inventory with the standard catalog.
///
/// # Examples
/// ```
/// use box_planner::model::InventoryCounts;
/// use box_planner::optimizer::plan_inventory;
///
/// let plan = plan_inventory(&InventoryCounts::new(8, 0, 0, 1));
/// assert_eq!(plan.box_count(), 1);
/// assert_eq!(plan.boxes[0].name, "1×750 + 8×60");
/// ```
pub fn plan_inventory(inventory: &InventoryCounts) -> PackingPlan {
    plan_inventory_with_progress(inventory, |_| {})
}

/// Like `plan_inventory`, reporting each step to `on_event`.
pub fn plan_inventory_with_progress(
    inventory: &InventoryCounts,
    on_event: impl FnMut(&PlanEvent),
) -> PackingPlan {
    let catalog = TemplateCatalog::generate(inventory.is_pure_750());
    plan_with_catalog(inventory, &catalog, on_event)
}

/// Plans an inventory against a caller-supplied catalog.
pub fn plan_with_catalog(
    inventory: &InventoryCounts,
    catalog: &TemplateCatalog,
    mut on_event: impl FnMut(&PlanEvent),
) -> PackingPlan {
    let pure_750 = inventory.is_pure_750();
    on_event(&PlanEvent::CatalogReady {
        templates: catalog.len(),
        pure_750,
    });

    let mut optimizer = PlanOptimizer::new(catalog, pure_750);
    let outcome = optimizer.solve(inventory.units());
    debug!(
        cost = outcome.score.cost,
        full_count = outcome.score.full_count,
        tail_partial = outcome.score.tail_partial,
        states = optimizer.states_evaluated(),
        "search finished"
    );
    on_event(&PlanEvent::Optimized {
        cost: outcome.score.cost,
        full_count: outcome.score.full_count,
        tail_partial: outcome.score.tail_partial,
        states: optimizer.states_evaluated(),
    });

    let mut boxes = reconstruct(catalog, &outcome);
    let consumed: UnitCounts = boxes.iter().map(|b| b.units).sum();
    let remaining = inventory.units() - consumed;
    if outcome.score.tail_partial == 0 && !remaining.is_zero() {
        warn!(
            ?remaining,
            "search reported a full cover but units remain; draining them"
        );
    }
    drain_leftovers(remaining, &mut boxes);

    for (index, packed) in boxes.iter().enumerate() {
        on_event(&PlanEvent::box_emitted(index + 1, packed));
    }

    let plan = PackingPlan::new(*inventory, boxes);
    debug_assert!(plan.is_complete(), "plan does not cover the inventory");
    on_event(&PlanEvent::Finished {
        boxes: plan.box_count(),
    });
    plan
}

/// Replays the optimal picks into boxes, root choice first.
pub fn reconstruct(catalog: &TemplateCatalog, outcome: &Outcome) -> Vec<PackedBox> {
    outcome
        .picks()
        .filter_map(|index| catalog.get(index))
        .map(PackedBox::from_template)
        .collect()
}

/// Appends single-size partial boxes for whatever `remaining` still holds.
///
/// Sizes are drained in canonical order, each box taking
/// `min(capacity, remaining)` units.
pub fn drain_leftovers(remaining: UnitCounts, boxes: &mut Vec<PackedBox>) {
    for size in ItemSize::ALL {
        let mut left = remaining.get(size);
        while left > 0 {
            let take = left.min(size.capacity());
            debug!(%size, take, "draining partial box");
            boxes.push(PackedBox::partial(size, take));
            left -= take;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoxKind, BoxTemplate};
    use proptest::prelude::*;

    fn names(plan: &PackingPlan) -> Vec<&str> {
        plan.boxes.iter().map(|b| b.name.as_str()).collect()
    }

    fn assert_conserved(plan: &PackingPlan) {
        assert_eq!(plan.shipped_units(), plan.inventory.units());
        assert_eq!(
            (
                plan.summary.left_60,
                plan.summary.left_250,
                plan.summary.left_340,
                plan.summary.left_750
            ),
            (0, 0, 0, 0)
        );
        assert_eq!(plan.summary.boxes, plan.boxes.len());
    }

    #[test]
    fn zero_inventory_needs_no_boxes() {
        let plan = plan_inventory(&InventoryCounts::default());
        assert!(plan.boxes.is_empty());
        assert_eq!(plan.summary, Default::default());
    }

    #[test]
    fn exact_single_template_match() {
        let plan = plan_inventory(&InventoryCounts::new(10, 0, 0, 0));
        assert_eq!(names(&plan), vec!["10×60"]);
        assert_eq!(plan.boxes[0].units, UnitCounts::new(10, 0, 0, 0));
        assert_conserved(&plan);
    }

    #[test]
    fn pure_750_remainder_goes_into_partial_box() {
        let plan = plan_inventory(&InventoryCounts::new(0, 0, 0, 3));
        assert_eq!(names(&plan), vec!["2×750", "Partial box: 1×750"]);
        assert_eq!(plan.boxes[1].kind, BoxKind::Partial);
        assert_conserved(&plan);
    }

    #[test]
    fn mixed_exact_cover() {
        let plan = plan_inventory(&InventoryCounts::new(8, 0, 0, 1));
        assert_eq!(names(&plan), vec!["1×750 + 8×60"]);
        assert_eq!(plan.partial_box_count(), 0);
        assert_conserved(&plan);
    }

    #[test]
    fn slightly_over_capacity_terminates_with_partial() {
        let plan = plan_inventory(&InventoryCounts::new(11, 0, 0, 0));
        assert_eq!(names(&plan), vec!["10×60", "Partial box: 1×60"]);
        assert_conserved(&plan);
    }

    #[test]
    fn no_matching_template_drains_everything() {
        let plan = plan_inventory(&InventoryCounts::new(0, 3, 0, 0));
        assert_eq!(names(&plan), vec!["Partial box: 3×250"]);
        assert_conserved(&plan);
    }

    #[test]
    fn leftovers_drain_in_size_order() {
        let mut boxes = Vec::new();
        drain_leftovers(UnitCounts::new(12, 0, 9, 5), &mut boxes);
        let drained: Vec<_> = boxes.iter().map(|b| b.units).collect();
        assert_eq!(
            drained,
            vec![
                UnitCounts::new(10, 0, 0, 0),
                UnitCounts::new(2, 0, 0, 0),
                UnitCounts::new(0, 0, 8, 0),
                UnitCounts::new(0, 0, 1, 0),
                UnitCounts::new(0, 0, 0, 2),
                UnitCounts::new(0, 0, 0, 2),
                UnitCounts::new(0, 0, 0, 1),
            ]
        );
    }

    #[test]
    fn template_beats_partial_box_of_equal_cost() {
        let catalog = TemplateCatalog::generate(false);
        let mut optimizer = PlanOptimizer::new(&catalog, false);
        let outcome = optimizer.solve(UnitCounts::new(10, 0, 0, 0));
        assert_eq!(
            outcome.score,
            PlanScore {
                cost: 1,
                full_count: 1,
                tail_partial: 0
            }
        );
    }

    #[test]
    fn equal_cost_prefers_more_full_templates() {
        // {15×60}: "big" + partial(5) and "big" + "half" both cost 2 boxes.
        let catalog = TemplateCatalog::from_templates([
            BoxTemplate::new("big", UnitCounts::new(10, 0, 0, 0)),
            BoxTemplate::new("half", UnitCounts::new(5, 0, 0, 0)),
        ]);
        let plan = plan_with_catalog(&InventoryCounts::new(15, 0, 0, 0), &catalog, |_| {});

        assert_eq!(names(&plan), vec!["big", "half"]);
        assert_eq!(plan.partial_box_count(), 0);
        assert_conserved(&plan);
    }

    #[test]
    fn comparator_orders_cost_then_full_then_tail() {
        let base = PlanScore {
            cost: 3,
            full_count: 1,
            tail_partial: 2,
        };
        let cheaper = PlanScore { cost: 2, ..base };
        let fuller = PlanScore {
            full_count: 2,
            ..base
        };
        let smaller_tail = PlanScore {
            tail_partial: 1,
            ..base
        };

        assert!(cheaper.is_better_than(&fuller));
        assert!(fuller.is_better_than(&smaller_tail));
        assert!(smaller_tail.is_better_than(&base));
        assert!(!base.is_better_than(&base));
    }

    #[test]
    fn tail_partial_propagates_from_leaf() {
        let catalog = TemplateCatalog::generate(false);
        let mut optimizer = PlanOptimizer::new(&catalog, false);
        let outcome = optimizer.solve(UnitCounts::new(11, 0, 0, 0));
        assert_eq!(
            outcome.score,
            PlanScore {
                cost: 2,
                full_count: 1,
                tail_partial: 1
            }
        );
    }

    #[test]
    fn pure_750_gate_blocks_template_for_mixed_inventory() {
        let catalog = TemplateCatalog::from_templates([
            BoxTemplate::new("2×750 gated", UnitCounts::new(0, 0, 0, 2)).pure_750_only(),
            BoxTemplate::new("10×60", UnitCounts::new(10, 0, 0, 0)),
        ]);

        let mixed = plan_with_catalog(&InventoryCounts::new(10, 0, 0, 2), &catalog, |_| {});
        assert_eq!(names(&mixed), vec!["10×60", "Partial box: 2×750"]);

        let pure = plan_with_catalog(&InventoryCounts::new(0, 0, 0, 2), &catalog, |_| {});
        assert_eq!(names(&pure), vec!["2×750 gated"]);
    }

    #[test]
    fn memo_shares_outcomes_between_paths() {
        let catalog = TemplateCatalog::generate(false);
        let mut optimizer = PlanOptimizer::new(&catalog, false);
        let root = optimizer.solve(UnitCounts::new(16, 6, 6, 2));
        let states = optimizer.states_evaluated();

        let again = optimizer.solve(UnitCounts::new(16, 6, 6, 2));
        assert!(Rc::ptr_eq(&root, &again));
        assert_eq!(optimizer.states_evaluated(), states);
        assert!(states <= 17 * 7 * 7 * 3);
    }

    #[test]
    fn progress_reports_every_box_in_order() {
        let mut events = Vec::new();
        let plan = plan_inventory_with_progress(&InventoryCounts::new(0, 0, 0, 3), |evt| {
            events.push(evt.clone())
        });

        assert!(matches!(
            events.first(),
            Some(PlanEvent::CatalogReady {
                pure_750: true,
                ..
            })
        ));
        let emitted: Vec<_> = events
            .iter()
            .filter_map(|evt| match evt {
                PlanEvent::BoxEmitted { index, name, .. } => Some((*index, name.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            emitted,
            vec![
                (1, "2×750".to_string()),
                (2, "Partial box: 1×750".to_string())
            ]
        );
        assert!(matches!(
            events.last(),
            Some(PlanEvent::Finished { boxes: 2 })
        ));
        assert_eq!(plan.box_count(), 2);
    }

    #[test]
    fn larger_mixed_inventory_is_covered() {
        let inventory = InventoryCounts::new(23, 11, 7, 5);
        let plan = plan_inventory(&inventory);
        assert_conserved(&plan);
        assert!(plan.box_count() as u32 >= inventory.units().box_lower_bound());
        assert!(plan.box_count() as u32 <= inventory.units().drain_box_count());
    }

    #[test]
    fn mixed_sixty_template_beats_draining() {
        // Draining would need one 60 ml box and one 250 ml box.
        let plan = plan_inventory(&InventoryCounts::new(8, 2, 0, 0));
        assert_eq!(
            names(&plan),
            vec!["2×(250/340) + 8×60 → (2×250,0×340,8×60)"]
        );
        assert_conserved(&plan);
    }

    #[test]
    fn single_750_mix_fills_one_box() {
        let plan = plan_inventory(&InventoryCounts::new(0, 5, 0, 1));
        assert_eq!(names(&plan), vec!["1×750 + (5×250,0×340)"]);

        let plan = plan_inventory(&InventoryCounts::new(0, 2, 3, 1));
        assert_eq!(names(&plan), vec!["1×750 + (2×250,3×340)"]);
        assert_conserved(&plan);
    }

    #[test]
    fn two_750_mix_takes_small_extras() {
        let plan = plan_inventory(&InventoryCounts::new(1, 1, 0, 2));
        assert_eq!(names(&plan), vec!["2×750 + (1×60,1×250,0×340)"]);
        assert_conserved(&plan);
    }

    #[test]
    fn two_mixed_templates_halve_the_drain_cost() {
        // Draining alone: 2 (60) + 1 (250) + 1 (750) = 4 boxes.
        let inventory = InventoryCounts::new(16, 2, 0, 1);
        assert_eq!(inventory.units().drain_box_count(), 4);

        let plan = plan_inventory(&inventory);
        assert_eq!(
            names(&plan),
            vec![
                "1×750 + 8×60",
                "2×(250/340) + 8×60 → (2×250,0×340,8×60)"
            ]
        );
        assert_eq!(plan.partial_box_count(), 0);
        assert_conserved(&plan);
    }

    #[test]
    fn default_limit_keeps_search_states_bounded() {
        let limit = crate::config::PlannerConfig::default();
        let n = limit.max_units_per_size;
        let catalog = TemplateCatalog::generate(false);
        let mut optimizer = PlanOptimizer::new(&catalog, false);
        optimizer.solve(UnitCounts::new(n, n, n, n));

        let states = optimizer.states_evaluated() as u64;
        assert!(states <= limit.max_search_states());
        assert!(states < 200_000, "{states} states at the default limit");
    }

    fn small_inventory() -> impl Strategy<Value = InventoryCounts> {
        (0u32..=14, 0u32..=10, 0u32..=10, 0u32..=5)
            .prop_map(|(a, b, c, d)| InventoryCounts::new(a, b, c, d))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn plan_conserves_every_unit(inventory in small_inventory()) {
            let plan = plan_inventory(&inventory);
            prop_assert_eq!(plan.shipped_units(), inventory.units());
            prop_assert_eq!(plan.summary.left_60 + plan.summary.left_250
                + plan.summary.left_340 + plan.summary.left_750, 0);
        }

        #[test]
        fn plan_respects_bounds(inventory in small_inventory()) {
            let plan = plan_inventory(&inventory);
            let boxes = plan.box_count() as u32;
            prop_assert!(boxes >= inventory.units().box_lower_bound());
            prop_assert!(boxes <= inventory.units().drain_box_count());
        }

        #[test]
        fn plan_is_deterministic(inventory in small_inventory()) {
            prop_assert_eq!(plan_inventory(&inventory), plan_inventory(&inventory));
        }

        #[test]
        fn box_count_matches_search_cost(inventory in small_inventory()) {
            let catalog = TemplateCatalog::generate(inventory.is_pure_750());
            let mut optimizer = PlanOptimizer::new(&catalog, inventory.is_pure_750());
            let outcome = optimizer.solve(inventory.units());
            let plan = plan_with_catalog(&inventory, &catalog, |_| {});
            prop_assert_eq!(plan.box_count() as u32, outcome.score.cost);
        }
    }
}
