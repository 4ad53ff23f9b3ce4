//! Client-side generation of realtime-database push keys.
//!
//! A key is 8 characters of millisecond timestamp followed by 12 random
//! characters, over an alphabet whose byte order matches its numeric order.
//! Keys therefore sort chronologically, and keys made in the same
//! millisecond by this generator keep sorting in creation order.

use std::sync::Mutex;

use chrono::Utc;
use rand::Rng;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const RANDOM_LEN: usize = 12;

#[derive(Default)]
struct PushState {
    last_ms: i64,
    last_random: [u8; RANDOM_LEN],
}

#[derive(Default)]
pub struct PushIdGenerator {
    state: Mutex<PushState>,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        self.generate(Utc::now().timestamp_millis())
    }

    pub fn generate(&self, now_ms: i64) -> String {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if now_ms == state.last_ms {
            // Same millisecond: bump the random part so order is kept.
            for i in (0..RANDOM_LEN).rev() {
                if state.last_random[i] == 63 {
                    state.last_random[i] = 0;
                } else {
                    state.last_random[i] += 1;
                    break;
                }
            }
        } else {
            let mut rng = rand::thread_rng();
            for slot in state.last_random.iter_mut() {
                *slot = rng.gen_range(0..64);
            }
            state.last_ms = now_ms;
        }

        let mut id = String::with_capacity(8 + RANDOM_LEN);
        let mut time_chars = [0u8; 8];
        let mut t = now_ms.max(0) as u64;
        for slot in time_chars.iter_mut().rev() {
            *slot = PUSH_CHARS[(t % 64) as usize];
            t /= 64;
        }
        id.extend(time_chars.iter().map(|&c| c as char));
        id.extend(state.last_random.iter().map(|&i| PUSH_CHARS[i as usize] as char));
        id
    }
}
