use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// A pending request for a slot in a full class, ordered by arrival.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub class_id: Uuid,
    pub added_at: DateTime<Utc>,
}

/// Per-class FIFO queues of waiting users. Ordering key is enqueue time;
/// vector position breaks ties between entries added in the same instant.
pub struct WaitlistQueue {
    entries: Mutex<HashMap<Uuid, Vec<WaitlistEntry>>>,
    max_size: usize,
}

impl WaitlistQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size,
        }
    }

    pub fn enqueue(
        &self,
        user_id: Uuid,
        class_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, WaitlistError> {
        let mut entries = self.entries.lock().unwrap();
        let queue = entries.entry(class_id).or_default();

        if queue.len() >= self.max_size {
            return Err(WaitlistError::WaitlistFull { max: self.max_size });
        }

        let entry = WaitlistEntry {
            id: Uuid::new_v4(),
            user_id,
            class_id,
            added_at: now,
        };
        queue.push(entry.clone());
        info!(
            "User {} waitlisted for class {} at position {}",
            user_id,
            class_id,
            queue.len()
        );
        Ok(entry)
    }

    /// Removes and returns the earliest entry for the class.
    pub fn dequeue_oldest(&self, class_id: &Uuid) -> Option<WaitlistEntry> {
        let mut entries = self.entries.lock().unwrap();
        let queue = entries.get_mut(class_id)?;
        if queue.is_empty() {
            return None;
        }
        Some(queue.remove(0))
    }

    /// 1-based rank of the user's earliest entry, `None` when absent.
    pub fn position(&self, user_id: &Uuid, class_id: &Uuid) -> Option<usize> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(class_id)?
            .iter()
            .position(|e| e.user_id == *user_id)
            .map(|idx| idx + 1)
    }

    /// User-initiated abandonment; drops the user's earliest entry.
    pub fn remove(&self, user_id: &Uuid, class_id: &Uuid) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let Some(queue) = entries.get_mut(class_id) else {
            return false;
        };
        match queue.iter().position(|e| e.user_id == *user_id) {
            Some(idx) => {
                queue.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Removes and returns every entry enqueued before `cutoff`, across all
    /// classes, for the caller to act on.
    pub fn expire_older_than(&self, cutoff: DateTime<Utc>) -> Vec<WaitlistEntry> {
        let mut entries = self.entries.lock().unwrap();
        let mut expired = Vec::new();
        for queue in entries.values_mut() {
            let mut kept = Vec::with_capacity(queue.len());
            for entry in queue.drain(..) {
                if entry.added_at < cutoff {
                    expired.push(entry);
                } else {
                    kept.push(entry);
                }
            }
            *queue = kept;
        }
        expired
    }

    pub fn size_for(&self, class_id: &Uuid) -> usize {
        let entries = self.entries.lock().unwrap();
        entries.get(class_id).map(|q| q.len()).unwrap_or(0)
    }

    pub fn entries_for(&self, class_id: &Uuid) -> Vec<WaitlistEntry> {
        let entries = self.entries.lock().unwrap();
        entries.get(class_id).cloned().unwrap_or_default()
    }

    /// Removes and returns the whole queue for a class.
    pub fn clear_class(&self, class_id: &Uuid) -> Vec<WaitlistEntry> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(class_id).unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WaitlistError {
    #[error("Waitlist is full (max {max})")]
    WaitlistFull { max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = WaitlistQueue::new(10);
        let class_id = Uuid::new_v4();
        let now = Utc::now();

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        queue.enqueue(a, class_id, now).unwrap();
        queue.enqueue(b, class_id, now + Duration::seconds(1)).unwrap();
        queue.enqueue(c, class_id, now + Duration::seconds(2)).unwrap();

        assert_eq!(queue.position(&a, &class_id), Some(1));
        assert_eq!(queue.position(&b, &class_id), Some(2));
        assert_eq!(queue.position(&c, &class_id), Some(3));

        let snapshot = queue.entries_for(&class_id);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].user_id, a);

        assert_eq!(queue.dequeue_oldest(&class_id).unwrap().user_id, a);
        assert_eq!(queue.dequeue_oldest(&class_id).unwrap().user_id, b);
        assert_eq!(queue.position(&c, &class_id), Some(1));
        assert_eq!(queue.dequeue_oldest(&class_id).unwrap().user_id, c);
        assert!(queue.dequeue_oldest(&class_id).is_none());
    }

    #[test]
    fn test_bounded_admission() {
        let queue = WaitlistQueue::new(2);
        let class_id = Uuid::new_v4();
        let now = Utc::now();

        queue.enqueue(Uuid::new_v4(), class_id, now).unwrap();
        queue.enqueue(Uuid::new_v4(), class_id, now).unwrap();

        let err = queue.enqueue(Uuid::new_v4(), class_id, now).unwrap_err();
        assert!(matches!(err, WaitlistError::WaitlistFull { max: 2 }));
        assert_eq!(queue.size_for(&class_id), 2);
    }

    #[test]
    fn test_position_for_absent_user() {
        let queue = WaitlistQueue::new(10);
        let class_id = Uuid::new_v4();

        assert_eq!(queue.position(&Uuid::new_v4(), &class_id), None);
    }

    #[test]
    fn test_expire_older_than_cutoff() {
        let queue = WaitlistQueue::new(10);
        let class_a = Uuid::new_v4();
        let class_b = Uuid::new_v4();
        let now = Utc::now();

        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        queue.enqueue(stale, class_a, now - Duration::days(3)).unwrap();
        queue.enqueue(fresh, class_a, now - Duration::hours(1)).unwrap();
        queue.enqueue(Uuid::new_v4(), class_b, now - Duration::days(5)).unwrap();

        let expired = queue.expire_older_than(now - Duration::days(2));
        assert_eq!(expired.len(), 2);
        assert!(expired.iter().any(|e| e.user_id == stale));

        assert_eq!(queue.size_for(&class_a), 1);
        assert_eq!(queue.position(&fresh, &class_a), Some(1));
        assert_eq!(queue.size_for(&class_b), 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let queue = WaitlistQueue::new(10);
        let class_id = Uuid::new_v4();
        let now = Utc::now();

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        queue.enqueue(a, class_id, now).unwrap();
        queue.enqueue(b, class_id, now).unwrap();

        assert!(queue.remove(&a, &class_id));
        assert!(!queue.remove(&a, &class_id));
        assert_eq!(queue.position(&b, &class_id), Some(1));

        let drained = queue.clear_class(&class_id);
        assert_eq!(drained.len(), 1);
        assert_eq!(queue.size_for(&class_id), 0);
    }
}
