//! Surrogate object identifiers.
//!
//! 12 bytes rendered as 24 lowercase hex chars:
//! 4 bytes seconds since epoch, 6 random bytes, 2 bytes process-wide counter.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::{Mutex, const_mutex};
use rand::Rng;

pub const OBJECT_ID_LEN: usize = 24;

struct GeneratorState {
    last_secs: u32,
    counter: u16,
}

static STATE: Mutex<GeneratorState> = const_mutex(GeneratorState {
    last_secs: 0,
    counter: 0,
});

pub struct ObjectIdGenerator;

impl ObjectIdGenerator {
    /// Mint a new object id. The time prefix never goes backwards within a process,
    /// even if the wall clock does.
    #[must_use]
    pub fn next() -> String {
        let now = u32::try_from(Utc::now().timestamp().max(0)).unwrap_or(u32::MAX);
        let random: u64 = rand::thread_rng().r#gen::<u64>() & 0xFFFF_FFFF_FFFF;

        let (secs, counter) = {
            let mut state = STATE.lock();
            state.last_secs = state.last_secs.max(now);
            state.counter = state.counter.wrapping_add(1);
            (state.last_secs, state.counter)
        };

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..10].copy_from_slice(&random.to_be_bytes()[2..8]);
        bytes[10..12].copy_from_slice(&counter.to_be_bytes());
        hex::encode(bytes)
    }

    /// Creation time encoded in an object id.
    #[must_use]
    pub fn timestamp(object_id: &str) -> Option<DateTime<Utc>> {
        if object_id.len() != OBJECT_ID_LEN || !object_id.is_ascii() {
            return None;
        }
        let prefix = hex::decode(&object_id[..8]).ok()?;
        let secs = u32::from_be_bytes(prefix.try_into().ok()?);
        Utc.timestamp_opt(i64::from(secs), 0).single()
    }
}
