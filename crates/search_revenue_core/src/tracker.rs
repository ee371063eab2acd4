//! Per-visitor last search touch.

use std::collections::HashMap;

use crate::referrer::SearchTouch;

/// Visitor identity: network address plus user agent, both trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VisitorKey {
    ip: String,
    user_agent: String,
}

impl VisitorKey {
    pub fn new(ip: &str, user_agent: &str) -> Self {
        Self {
            ip: ip.trim().to_string(),
            user_agent: user_agent.trim().to_string(),
        }
    }
}

/// Most recent external search touch per visitor for one scan.
///
/// Grows with the number of distinct visitors and is never evicted; rows are
/// assumed to arrive in time order, so the last write is the latest touch.
#[derive(Debug, Default)]
pub struct LastTouchTracker {
    touches: HashMap<VisitorKey, SearchTouch>,
}

impl LastTouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, visitor: &VisitorKey, touch: SearchTouch) {
        if let Some(current) = self.touches.get_mut(visitor) {
            *current = touch;
        } else {
            self.touches.insert(visitor.clone(), touch);
        }
    }

    pub fn lookup(&self, visitor: &VisitorKey) -> Option<&SearchTouch> {
        self.touches.get(visitor)
    }

    pub fn visitor_count(&self) -> usize {
        self.touches.len()
    }
}
