//! In-memory replay protection for passive messages.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::CheckStatus;

pub const DEDUP_CAPACITY: usize = 1000;
pub const COOLDOWN_SECONDS: i64 = 60;

/// Recently seen message identities, oldest evicted first.
pub struct SeenMessages {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl Default for SeenMessages {
    fn default() -> Self {
        Self::with_capacity(DEDUP_CAPACITY)
    }
}

impl SeenMessages {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns false if `key` was already seen.
    pub fn insert(&mut self, key: &str) -> bool {
        if self.members.contains(key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.order.push_back(key.to_string());
        self.members.insert(key.to_string());
        true
    }

    /// Forgets `key` so a redelivery is processed again.
    pub fn remove(&mut self, key: &str) {
        if self.members.remove(key) {
            self.order.retain(|k| k != key);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Per (target, state) timestamp of the last accepted message, in the message's own clock.
#[derive(Default)]
pub struct Cooldowns {
    last_accepted: HashMap<(String, CheckStatus), i64>,
}

impl Cooldowns {
    /// Also true for messages older than the recorded one.
    pub fn is_suppressed(&self, target_id: &str, status: CheckStatus, message_ts: i64) -> bool {
        self.last_accepted
            .get(&(target_id.to_string(), status))
            .is_some_and(|last| message_ts - last < COOLDOWN_SECONDS)
    }

    pub fn record(&mut self, target_id: &str, status: CheckStatus, message_ts: i64) {
        self.last_accepted.insert((target_id.to_string(), status), message_ts);
    }

    pub fn forget_target(&mut self, target_id: &str) {
        self.last_accepted.retain(|(id, _), _| id != target_id);
    }
}
