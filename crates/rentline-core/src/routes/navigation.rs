use std::sync::Mutex;

use tracing::debug;

/// Moves the user between views.
///
/// `push` adds a history entry; `replace` rewrites the current one without
/// reloading, which is how consumed query parameters are dropped.
pub trait Navigator: Send + Sync {
    fn push(&self, location: &str);
    fn replace(&self, location: &str);
    fn current(&self) -> String;
}

/// In-process navigation history.
#[derive(Debug)]
pub struct History {
    entries: Mutex<Vec<String>>,
}

impl History {
    pub fn new(start: &str) -> Self {
        Self {
            entries: Mutex::new(vec![start.to_string()]),
        }
    }

    /// Every location visited, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// How many times `location` was pushed or replaced in.
    pub fn visits(&self, location: &str) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .skip(1)
            .filter(|entry| entry.as_str() == location)
            .count()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for History {
    fn push(&self, location: &str) {
        debug!(location, "Navigate");
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(location.to_string());
    }

    fn replace(&self, location: &str) {
        debug!(location, "Replace location");
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.last_mut() {
            Some(last) => *last = location.to_string(),
            None => entries.push(location.to_string()),
        }
    }

    fn current(&self) -> String {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
            .unwrap_or_else(|| "/".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_replace() {
        let history = History::new("/home?token=xyz");
        history.replace("/home");
        assert_eq!(history.current(), "/home");
        assert_eq!(history.entries(), vec!["/home".to_string()]);

        history.push("/wishlist");
        history.push("/home");
        assert_eq!(history.current(), "/home");
        assert_eq!(history.visits("/home"), 1);
    }
}
