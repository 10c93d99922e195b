use chrono::Local;

const MAX_ENTRIES: usize = 200;

/// Bounded in-app activity log, shown in the side pane. Entries are
/// timestamped on insertion; the oldest entries are dropped past the cap.
#[derive(Debug, Default)]
pub struct LogView {
    pub entries: Vec<String>,
}

impl LogView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: String) {
        self.entries
            .push(format!("{} {}", Local::now().format("%H:%M:%S"), entry));
        if self.entries.len() > MAX_ENTRIES {
            let excess = self.entries.len() - MAX_ENTRIES;
            self.entries.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_capped() {
        let mut logs = LogView::new();
        for i in 0..(MAX_ENTRIES + 25) {
            logs.add(format!("entry {}", i));
        }
        assert_eq!(logs.entries.len(), MAX_ENTRIES);
        assert!(logs.entries.last().unwrap().contains("entry 224"));
        assert!(logs.entries.first().unwrap().contains("entry 25"));
    }
}
