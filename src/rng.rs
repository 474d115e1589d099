//! Deterministic RNG streams.
//!
//! One master seed fans out into an independent `StdRng` per market and per
//! agent. Sub-seeds depend only on `(master_seed, stream, index)`, so agents
//! can be stepped in any order, or on different threads, and still reproduce
//! the same trace.

use rand::rngs::StdRng;
use rand::SeedableRng;

const MARKET_STREAM: u64 = 0x6d61_726b_6574; // "market"
const AGENT_STREAM: u64 = 0x6167_656e_74; // "agent"

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngStreams {
    master_seed: u64,
}

impl RngStreams {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn market(&self, market: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(MARKET_STREAM, market))
    }

    pub fn agent(&self, agent: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(AGENT_STREAM, agent))
    }

    pub fn sub_seed(&self, stream: u64, index: u64) -> u64 {
        let z = mix(self.master_seed ^ mix(stream));
        mix(z ^ index.wrapping_mul(0x9e37_79b9_7f4a_7c15))
    }
}

/// SplitMix64 finalizer.
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
