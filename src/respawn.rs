use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

use crate::npc::{NpcId, RespawnTiming};

/// A dead NPC waiting to re-materialize. The deadline is fixed at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RespawnEntry {
    pub npc: NpcId,
    pub deadline: Instant,
}

/// Jittered delay: median plus a uniform offset within ±variance, never negative.
/// `None` when respawning is disabled for this NPC.
pub fn respawn_delay<R: Rng + ?Sized>(timing: RespawnTiming, rng: &mut R) -> Option<Duration> {
    if !timing.is_enabled() {
        return None;
    }
    let variance = timing.variance.as_millis() as i64;
    let offset = if variance > 0 {
        rng.gen_range(-variance..=variance)
    } else {
        0
    };
    let millis = (timing.median.as_millis() as i64 + offset).max(0);
    Some(Duration::from_millis(millis as u64))
}

#[derive(Debug, Default)]
pub struct RespawnQueue {
    entries: Vec<RespawnEntry>,
}

impl RespawnQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an NPC. Returns the deadline, or `None` if it never respawns.
    pub fn enqueue<R: Rng + ?Sized>(
        &mut self,
        npc: NpcId,
        timing: RespawnTiming,
        now: Instant,
        rng: &mut R,
    ) -> Option<Instant> {
        let delay = respawn_delay(timing, rng)?;
        let deadline = now + delay;
        self.entries.push(RespawnEntry { npc, deadline });
        Some(deadline)
    }

    /// Remove and return every entry whose deadline has passed, in queue order
    pub fn take_due(&mut self, now: Instant) -> Vec<RespawnEntry> {
        let (due, pending): (Vec<_>, Vec<_>) = self.entries.drain(..).partition(|e| e.deadline <= now);
        self.entries = pending;
        due
    }

    pub fn contains(&self, npc: NpcId) -> bool {
        self.entries.iter().any(|e| e.npc == npc)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn timing(median: u64, variance: u64) -> RespawnTiming {
        RespawnTiming {
            median: Duration::from_secs(median),
            variance: Duration::from_secs(variance),
        }
    }

    #[test]
    fn test_zero_median_never_queues() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut queue = RespawnQueue::new();
        assert!(queue.enqueue(NpcId::new(0), timing(0, 30), Instant::now(), &mut rng).is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_delay_stays_within_variance() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let delay = respawn_delay(timing(60, 10), &mut rng).unwrap();
            assert!(delay >= Duration::from_secs(50));
            assert!(delay <= Duration::from_secs(70));
        }
        assert_eq!(respawn_delay(timing(60, 0), &mut rng), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_delay_never_negative() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..200 {
            assert!(respawn_delay(timing(1, 30), &mut rng).is_some());
        }
    }

    #[test]
    fn test_take_due_only_returns_elapsed_entries() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut queue = RespawnQueue::new();
        let now = Instant::now();
        queue.enqueue(NpcId::new(1), timing(10, 0), now, &mut rng);
        queue.enqueue(NpcId::new(2), timing(60, 0), now, &mut rng);

        assert!(queue.take_due(now).is_empty());
        let due = queue.take_due(now + Duration::from_secs(10));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].npc, NpcId::new(1));
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(NpcId::new(2)));
    }

    #[test]
    fn test_empty_sweep_is_noop() {
        let mut queue = RespawnQueue::new();
        assert!(queue.take_due(Instant::now()).is_empty());
        assert!(queue.is_empty());
    }
}
