//! Order book infrastructure
//!
//! A `SymbolBook` holds the two price ladders (bids and asks) for one
//! symbol. Ladders are created lazily when the first order rests.

pub mod ladder;
pub mod queue;

pub use ladder::Ladder;
pub use queue::FifoQueue;

use types::order::Side;

/// Both sides of one symbol's book
#[derive(Debug)]
pub struct SymbolBook {
    bids: Ladder,
    asks: Ladder,
}

impl SymbolBook {
    pub fn new() -> Self {
        Self {
            bids: Ladder::new(Side::Bid),
            asks: Ladder::new(Side::Ask),
        }
    }

    pub fn side(&self, side: Side) -> &Ladder {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut Ladder {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }
}

impl Default for SymbolBook {
    fn default() -> Self {
        Self::new()
    }
}
