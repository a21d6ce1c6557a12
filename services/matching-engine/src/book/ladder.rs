//! Price ladder for one (symbol, side) pair
//!
//! An ordered map from price level to a FIFO queue of resting order ids.
//! Iteration yields match-priority order: ascending prices for asks,
//! descending for bids. Each resting order's (price, slot) handle is kept
//! in a side index so removal by id never scans a queue.

use std::collections::{BTreeMap, HashMap};

use types::ids::OrderId;
use types::money::Price;
use types::order::Side;

use super::queue::FifoQueue;

/// One side of a symbol's book
#[derive(Debug)]
pub struct Ladder {
    side: Side,
    levels: BTreeMap<Price, FifoQueue<OrderId>>,
    handles: HashMap<OrderId, (Price, usize)>,
}

impl Ladder {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            handles: HashMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Number of resting orders across all levels
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.handles.contains_key(order_id)
    }

    /// Rest an order at `price`, behind everything already at that level
    pub fn insert(&mut self, order_id: OrderId, price: Price) {
        debug_assert!(
            !self.handles.contains_key(&order_id),
            "order already resting"
        );
        let slot = self.levels.entry(price).or_default().push_back(order_id);
        self.handles.insert(order_id, (price, slot));
    }

    /// Remove a resting order by id; drops the level if it empties
    ///
    /// Returns false when the order is not in this ladder.
    pub fn remove(&mut self, order_id: &OrderId) -> bool {
        let Some((price, slot)) = self.handles.remove(order_id) else {
            return false;
        };
        let queue = self
            .levels
            .get_mut(&price)
            .expect("handle points at a live level");
        queue.remove(slot);
        if queue.is_empty() {
            self.levels.remove(&price);
        }
        true
    }

    /// Best price on this side, if any
    pub fn best_price(&self) -> Option<Price> {
        match self.side {
            Side::Ask => self.levels.keys().next().copied(),
            Side::Bid => self.levels.keys().next_back().copied(),
        }
    }

    /// The head order at the best price
    pub fn front_of_best(&self) -> Option<(Price, OrderId)> {
        let (price, queue) = match self.side {
            Side::Ask => self.levels.iter().next()?,
            Side::Bid => self.levels.iter().next_back()?,
        };
        queue.front().map(|order_id| (*price, *order_id))
    }

    /// Price levels in match-priority order
    pub fn levels_best_first(
        &self,
    ) -> Box<dyn Iterator<Item = (Price, &FifoQueue<OrderId>)> + '_> {
        let mapped = self.levels.iter().map(|(price, queue)| (*price, queue));
        match self.side {
            Side::Ask => Box::new(mapped),
            Side::Bid => Box::new(mapped.rev()),
        }
    }
}
