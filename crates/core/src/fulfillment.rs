//! FIFO allocation of stock to pending backorders.
//!
//! Creating a backorder debits stock immediately, so a stock counter can go
//! negative: `-3` means three units are promised to pending backorders and
//! none are on the shelf. Physical stock available to pending backorders is
//! therefore `stock + pending demand` for each key.
//!
//! [`plan`] walks pending backorders by ascending priority and hands out that
//! physical stock. Once a backorder cannot be covered, every key it touches is
//! blocked for the rest of the walk: no later backorder may take stock the
//! earlier one is waiting for, even if the later one is small enough to fit.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::types::{OrderId, StockKey, StockLine, merge_lines};

/// A pending backorder as seen by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub order_id: OrderId,
    /// Value drawn from the backorder priority sequence. Lower goes first.
    pub priority: i64,
    pub lines: Vec<StockLine>,
}

impl Candidate {
    /// Demand per key, merging repeated lines for the same item.
    #[must_use]
    pub fn demand(&self) -> BTreeMap<StockKey, i32> {
        merge_lines(&self.lines)
    }

    #[must_use]
    pub fn touches(&self, key: &StockKey) -> bool {
        self.lines.iter().any(|line| &line.key == key)
    }
}

/// Outcome of a planning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentPlan {
    /// Backorders that can be fulfilled now, in priority order.
    pub fulfilled: Vec<OrderId>,
    /// Backorders that must keep waiting, in priority order.
    pub waiting: Vec<OrderId>,
}

/// What a fulfillment request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillTarget {
    /// One specific backorder, and only if FIFO allows it now.
    Order(OrderId),
    /// Every backorder containing this item that FIFO allows now.
    Item(StockKey),
}

/// Backorders to commit for a [`FulfillTarget`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Backorders to move to `PROCESSING`, in priority order.
    pub fulfill: Vec<OrderId>,
    /// Pending backorders in scope of the target that stay pending.
    pub still_pending: usize,
}

impl FulfillmentPlan {
    #[must_use]
    pub fn can_fulfill(&self, order_id: OrderId) -> bool {
        self.fulfilled.contains(&order_id)
    }

    /// Narrow the plan to the backorders a request targets.
    ///
    /// Other backorders that happen to fit stay pending and keep their claim
    /// on stock for a later run.
    #[must_use]
    pub fn select(&self, candidates: &[Candidate], target: FulfillTarget) -> Selection {
        match target {
            FulfillTarget::Order(order_id) => {
                let known = candidates.iter().any(|c| c.order_id == order_id);
                let fulfill = if known && self.can_fulfill(order_id) {
                    vec![order_id]
                } else {
                    Vec::new()
                };
                Selection {
                    still_pending: candidates.len() - fulfill.len(),
                    fulfill,
                }
            }
            FulfillTarget::Item(key) => {
                let in_scope: HashSet<OrderId> = candidates
                    .iter()
                    .filter(|c| c.touches(&key))
                    .map(|c| c.order_id)
                    .collect();
                let fulfill: Vec<OrderId> = self
                    .fulfilled
                    .iter()
                    .copied()
                    .filter(|id| in_scope.contains(id))
                    .collect();
                Selection {
                    still_pending: in_scope.len() - fulfill.len(),
                    fulfill,
                }
            }
        }
    }
}

/// Allocate physical stock to `candidates` in priority order.
///
/// `stock` holds the current (possibly negative) counter for every key the
/// candidates reference; keys missing from the map count as zero.
/// `candidates` must contain every pending backorder on those keys, since the
/// pending demand is added back to reconstruct shelf stock.
#[must_use]
pub fn plan(candidates: &[Candidate], stock: &HashMap<StockKey, i32>) -> FulfillmentPlan {
    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    ordered.sort_by_key(|c| (c.priority, c.order_id));

    let mut on_hand: HashMap<StockKey, i32> = HashMap::new();
    for candidate in &ordered {
        for (key, quantity) in candidate.demand() {
            let entry = on_hand
                .entry(key)
                .or_insert_with(|| stock.get(&key).copied().unwrap_or(0));
            *entry += quantity;
        }
    }

    let mut blocked: HashSet<StockKey> = HashSet::new();
    let mut result = FulfillmentPlan::default();

    for candidate in ordered {
        let demand = candidate.demand();
        let is_blocked = demand.keys().any(|key| blocked.contains(key));
        let fits = !is_blocked
            && demand
                .iter()
                .all(|(key, quantity)| on_hand.get(key).copied().unwrap_or(0) >= *quantity);

        if fits {
            for (key, quantity) in &demand {
                if let Some(available) = on_hand.get_mut(key) {
                    *available -= quantity;
                }
            }
            result.fulfilled.push(candidate.order_id);
        } else {
            blocked.extend(demand.keys().copied());
            result.waiting.push(candidate.order_id);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProductId, VariantId};

    fn key(variant: i32) -> StockKey {
        StockKey::variant(ProductId::new(1), VariantId::new(variant))
    }

    fn candidate(id: i32, priority: i64, lines: &[(StockKey, i32)]) -> Candidate {
        Candidate {
            order_id: OrderId::new(id),
            priority,
            lines: lines
                .iter()
                .map(|(key, quantity)| StockLine::new(*key, *quantity))
                .collect(),
        }
    }

    #[test]
    fn test_lower_priority_number_is_served_first() {
        // Two backorders of 2 each were created against zero stock (-4),
        // then 3 units arrived.
        let stock = HashMap::from([(key(1), -1)]);
        let candidates = [
            candidate(20, 2, &[(key(1), 2)]),
            candidate(10, 1, &[(key(1), 2)]),
        ];

        let plan = plan(&candidates, &stock);
        assert_eq!(plan.fulfilled, vec![OrderId::new(10)]);
        assert_eq!(plan.waiting, vec![OrderId::new(20)]);
    }

    #[test]
    fn test_smaller_later_backorder_cannot_jump_the_queue() {
        // Priority 1 wants 3, priority 2 wants 1, only 2 on the shelf.
        let stock = HashMap::from([(key(1), -2)]);
        let candidates = [
            candidate(1, 1, &[(key(1), 3)]),
            candidate(2, 2, &[(key(1), 1)]),
        ];

        let plan = plan(&candidates, &stock);
        assert!(plan.fulfilled.is_empty());
        assert_eq!(plan.waiting, vec![OrderId::new(1), OrderId::new(2)]);
    }

    #[test]
    fn test_blocking_spreads_across_all_keys_of_a_waiting_order() {
        // Order 1 needs variants 1 and 2; variant 1 is short. Order 2 only
        // needs variant 2 but must not take the unit order 1 is waiting for.
        let stock = HashMap::from([(key(1), -2), (key(2), 0)]);
        let candidates = [
            candidate(1, 1, &[(key(1), 2), (key(2), 1)]),
            candidate(2, 2, &[(key(2), 1)]),
        ];

        let plan = plan(&candidates, &stock);
        assert!(plan.fulfilled.is_empty());
        assert!(!plan.can_fulfill(OrderId::new(2)));
    }

    #[test]
    fn test_unrelated_items_are_independent() {
        let stock = HashMap::from([(key(1), -2), (key(2), 1)]);
        let candidates = [
            candidate(1, 1, &[(key(1), 2)]),
            candidate(2, 2, &[(key(2), 1)]),
        ];

        let plan = plan(&candidates, &stock);
        assert_eq!(plan.fulfilled, vec![OrderId::new(2)]);
        assert_eq!(plan.waiting, vec![OrderId::new(1)]);
    }

    #[test]
    fn test_repeated_lines_are_merged() {
        let candidate = candidate(1, 1, &[(key(1), 1), (key(1), 2)]);
        assert_eq!(candidate.demand().get(&key(1)), Some(&3));

        // 3 promised, 2 arrived: stock went from -3 to -1.
        let plan = plan(&[candidate], &HashMap::from([(key(1), -1)]));
        assert!(plan.fulfilled.is_empty());
    }

    #[test]
    fn test_select_item_only_commits_backorders_for_that_item() {
        let stock = HashMap::from([(key(1), -1), (key(2), 1)]);
        let candidates = [
            candidate(1, 1, &[(key(2), 1)]),
            candidate(2, 2, &[(key(1), 2)]),
            candidate(3, 3, &[(key(1), 1)]),
        ];

        let plan = plan(&candidates, &stock);
        let selection = plan.select(&candidates, FulfillTarget::Item(key(1)));
        assert_eq!(selection.fulfill, vec![OrderId::new(2)]);
        assert_eq!(selection.still_pending, 1);
    }

    #[test]
    fn test_select_order_requires_fifo_clearance() {
        let stock = HashMap::from([(key(1), -2)]);
        let candidates = [
            candidate(1, 1, &[(key(1), 2)]),
            candidate(2, 2, &[(key(1), 2)]),
        ];

        let plan = plan(&candidates, &stock);
        assert_eq!(
            plan.select(&candidates, FulfillTarget::Order(OrderId::new(1)))
                .fulfill,
            vec![OrderId::new(1)]
        );
        let blocked = plan.select(&candidates, FulfillTarget::Order(OrderId::new(2)));
        assert!(blocked.fulfill.is_empty());
        assert_eq!(blocked.still_pending, 2);
    }

    #[test]
    fn test_everything_fits_after_large_restock() {
        let stock = HashMap::from([(key(1), 10)]);
        let candidates = [
            candidate(1, 1, &[(key(1), 2)]),
            candidate(2, 2, &[(key(1), 2)]),
            candidate(3, 3, &[(key(1), 2)]),
        ];

        let plan = plan(&candidates, &stock);
        assert_eq!(plan.fulfilled.len(), 3);
        assert!(plan.waiting.is_empty());
    }
}
