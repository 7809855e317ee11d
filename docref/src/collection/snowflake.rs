use crate::common::get_current_time_or_zero;
use log::{info, warn};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::Rng;

const NODE_ID_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_NODE_ID: u64 = (1 << NODE_ID_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const TIMESTAMP_LEFT_SHIFT: u64 = SEQUENCE_BITS + NODE_ID_BITS;
const EPOCH: u64 = 1288834974657;

struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

/// Snowflake-style 64 bit id generator: timestamp, node id and a per
/// millisecond sequence.
pub struct SnowflakeIdGenerator {
    node_id: u64,
    state: Mutex<GeneratorState>,
}

impl SnowflakeIdGenerator {
    pub fn new() -> Self {
        let mut node_id = OsRng.gen::<u64>() & MAX_NODE_ID;
        if node_id == 0 {
            warn!("Random node id was zero, picking another one");
            node_id = OsRng.gen_range(1..=MAX_NODE_ID);
        }
        info!("Initialized id generator with node id: {}", node_id);

        SnowflakeIdGenerator {
            node_id,
            state: Mutex::new(GeneratorState {
                last_timestamp: 0,
                sequence: 0,
            }),
        }
    }

    pub fn get_id(&self) -> u64 {
        let mut state = self.state.lock();
        let mut timestamp = (get_current_time_or_zero() as u64).max(EPOCH);

        if timestamp < state.last_timestamp {
            // clock moved backwards, keep issuing ids from the last timestamp
            timestamp = state.last_timestamp;
        }

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // sequence exhausted, borrow the next millisecond
                timestamp += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = timestamp;

        ((timestamp - EPOCH) << TIMESTAMP_LEFT_SHIFT)
            | (self.node_id << SEQUENCE_BITS)
            | state.sequence
    }
}
