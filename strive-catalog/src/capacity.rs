use crate::session::ClassSession;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Owns every class's slot counters. The invariant `0 <= booked <= total`
/// holds after any committed operation; callers serialize mutations for a
/// given class through that class's lock — the store itself does not check
/// lock ownership.
pub struct CapacityStore {
    sessions: Mutex<HashMap<Uuid, ClassSession>>,
}

impl CapacityStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, session: ClassSession) {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.insert(session.id, session);
    }

    pub fn get(&self, class_id: &Uuid) -> Option<ClassSession> {
        let sessions = self.sessions.lock().unwrap();
        sessions.get(class_id).cloned()
    }

    pub fn list(&self) -> Vec<ClassSession> {
        let sessions = self.sessions.lock().unwrap();
        sessions.values().cloned().collect()
    }

    /// `false` for unknown classes, matching lookup-then-check callers.
    pub fn has_available_slots(&self, class_id: &Uuid) -> bool {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(class_id)
            .map(|cls| cls.booked_slots < cls.total_slots)
            .unwrap_or(false)
    }

    pub fn is_full(&self, class_id: &Uuid) -> bool {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(class_id)
            .map(|cls| cls.booked_slots >= cls.total_slots)
            .unwrap_or(false)
    }

    /// Takes one slot. Refuses to push `booked` past `total` so the
    /// invariant survives even a misbehaving caller.
    pub fn increment_booked(&self, class_id: &Uuid) -> Result<i32, CapacityError> {
        let mut sessions = self.sessions.lock().unwrap();
        let cls = sessions
            .get_mut(class_id)
            .ok_or_else(|| CapacityError::NotFound(class_id.to_string()))?;

        if cls.booked_slots >= cls.total_slots {
            return Err(CapacityError::CapacityExceeded {
                booked: cls.booked_slots,
                total: cls.total_slots,
            });
        }

        cls.booked_slots += 1;
        Ok(cls.booked_slots)
    }

    /// Returns one slot, flooring at zero.
    pub fn decrement_booked(&self, class_id: &Uuid) -> Result<i32, CapacityError> {
        let mut sessions = self.sessions.lock().unwrap();
        let cls = sessions
            .get_mut(class_id)
            .ok_or_else(|| CapacityError::NotFound(class_id.to_string()))?;

        cls.booked_slots = (cls.booked_slots - 1).max(0);
        Ok(cls.booked_slots)
    }

    /// Grows (or shrinks) `total_slots` by `extra_slots`. The new total must
    /// still cover current bookings.
    pub fn increase_capacity(&self, class_id: &Uuid, extra_slots: i32) -> Result<i32, CapacityError> {
        let mut sessions = self.sessions.lock().unwrap();
        let cls = sessions
            .get_mut(class_id)
            .ok_or_else(|| CapacityError::NotFound(class_id.to_string()))?;

        let new_total = cls.total_slots + extra_slots;
        if new_total < cls.booked_slots {
            return Err(CapacityError::InvalidCapacity {
                requested: new_total,
                booked: cls.booked_slots,
            });
        }

        cls.total_slots = new_total;
        Ok(cls.total_slots)
    }

    /// Ids of sessions whose end time has passed; feeds the class-end sweep.
    pub fn ended_before(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .values()
            .filter(|cls| cls.end_time < now)
            .map(|cls| cls.id)
            .collect()
    }

    pub fn remove(&self, class_id: &Uuid) -> Option<ClassSession> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.remove(class_id)
    }
}

impl Default for CapacityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CapacityError {
    #[error("Class not found: {0}")]
    NotFound(String),

    #[error("Class is at capacity: booked {booked}, total {total}")]
    CapacityExceeded { booked: i32, total: i32 },

    #[error("Capacity of {requested} would under-cut {booked} current bookings")]
    InvalidCapacity { requested: i32, booked: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(total_slots: i32) -> ClassSession {
        let start = Utc::now() + Duration::hours(24);
        ClassSession::new(
            "Morning Yoga".to_string(),
            "SG".to_string(),
            5,
            total_slots,
            start,
            start + Duration::hours(1),
        )
    }

    #[test]
    fn test_slot_accounting() {
        let store = CapacityStore::new();
        let cls = session(2);
        let class_id = cls.id;
        store.insert(cls);

        assert!(store.has_available_slots(&class_id));
        assert_eq!(store.increment_booked(&class_id).unwrap(), 1);
        assert_eq!(store.increment_booked(&class_id).unwrap(), 2);
        assert!(store.is_full(&class_id));

        // A third increment must not break the invariant
        assert!(matches!(
            store.increment_booked(&class_id),
            Err(CapacityError::CapacityExceeded { .. })
        ));

        assert_eq!(store.decrement_booked(&class_id).unwrap(), 1);
        assert!(store.has_available_slots(&class_id));
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let store = CapacityStore::new();
        let cls = session(3);
        let class_id = cls.id;
        store.insert(cls);

        assert_eq!(store.decrement_booked(&class_id).unwrap(), 0);
        assert_eq!(store.get(&class_id).unwrap().booked_slots, 0);
    }

    #[test]
    fn test_increase_capacity_respects_bookings() {
        let store = CapacityStore::new();
        let mut cls = session(10);
        cls.booked_slots = 8;
        let class_id = cls.id;
        store.insert(cls);

        assert_eq!(store.increase_capacity(&class_id, 1).unwrap(), 11);

        // Shrinking below current bookings is rejected with no mutation
        let result = store.increase_capacity(&class_id, -4);
        assert!(matches!(result, Err(CapacityError::InvalidCapacity { .. })));
        assert_eq!(store.get(&class_id).unwrap().total_slots, 11);

        // Shrinking down to exactly the booked count is allowed
        assert_eq!(store.increase_capacity(&class_id, -3).unwrap(), 8);
        assert!(store.is_full(&class_id));
    }

    #[test]
    fn test_unknown_class() {
        let store = CapacityStore::new();
        let missing = Uuid::new_v4();

        assert!(!store.has_available_slots(&missing));
        assert!(!store.is_full(&missing));
        assert!(matches!(
            store.increment_booked(&missing),
            Err(CapacityError::NotFound(_))
        ));
        assert!(store.remove(&missing).is_none());
    }

    #[test]
    fn test_remove_class() {
        let store = CapacityStore::new();
        let cls = session(4);
        let class_id = cls.id;
        store.insert(cls);

        assert!(store.remove(&class_id).is_some());
        assert!(store.get(&class_id).is_none());
    }

    #[test]
    fn test_ended_before() {
        let store = CapacityStore::new();
        let now = Utc::now();

        let mut past = session(5);
        past.start_time = now - Duration::hours(3);
        past.end_time = now - Duration::hours(2);
        let past_id = past.id;
        store.insert(past);

        let upcoming = session(5);
        store.insert(upcoming);

        let ended = store.ended_before(now);
        assert_eq!(ended, vec![past_id]);
    }
}
