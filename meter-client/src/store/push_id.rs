use std::{
    sync::{Mutex, PoisonError},
    time::{SystemTime, UNIX_EPOCH},
};

use rand::Rng;

/// Alphabet in ascending ASCII order, so ids sort by creation time.
const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

#[derive(Default)]
struct State {
    last_ms: u64,
    last_random: [u8; RANDOM_CHARS],
}

/// Allocates 20-character, time-ordered child keys (8 timestamp characters
/// followed by 12 random ones). Keys minted in the same millisecond increment
/// the random part, so they still sort in allocation order.
#[derive(Default)]
pub struct PushIdGenerator {
    state: Mutex<State>,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        self.next_id_at(now_ms)
    }

    fn next_id_at(&self, now_ms: u64) -> String {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let duplicate = now_ms == state.last_ms;
        state.last_ms = now_ms;

        let mut out = [0u8; TIME_CHARS + RANDOM_CHARS];
        let mut t = now_ms;
        for slot in out[..TIME_CHARS].iter_mut().rev() {
            *slot = PUSH_CHARS[(t % 64) as usize];
            t /= 64;
        }

        if duplicate {
            // Increment the previous random part as a base-64 number.
            for digit in state.last_random.iter_mut().rev() {
                if *digit == 63 {
                    *digit = 0;
                } else {
                    *digit += 1;
                    break;
                }
            }
        } else {
            let mut rng = rand::thread_rng();
            for digit in state.last_random.iter_mut() {
                *digit = rng.gen_range(0..64);
            }
        }

        for (slot, digit) in out[TIME_CHARS..].iter_mut().zip(state.last_random.iter()) {
            *slot = PUSH_CHARS[*digit as usize];
        }

        out.iter().map(|b| char::from(*b)).collect()
    }
}
