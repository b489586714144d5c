use std::collections::BTreeMap;

use crate::models::{FlatMessage, Sender, branch_title};

/// Months with fewer distinct branch titles than this are skipped
pub const MIN_TITLES_PER_MONTH: usize = 2;

/// Messages of one (chat, branch) pair as seen at a month boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchGroup {
    pub chat_name: String,
    pub branch_id: String,
    pub title: String,
    /// Human-authored texts, in timestamp order
    pub human_texts: Vec<String>,
    pub message_count: usize,
}

/// Messages bucketed by calendar month, sorted by timestamp so that every
/// cumulative window is a prefix
#[derive(Debug, Clone)]
pub struct MonthBuckets {
    months: Vec<String>,
    ends: Vec<usize>,
    messages: Vec<FlatMessage>,
}

impl MonthBuckets {
    pub fn new(mut messages: Vec<FlatMessage>) -> Self {
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        // Sorted by timestamp, so each month is one contiguous run
        let mut months = Vec::new();
        let mut ends = Vec::new();
        let mut current: Option<(i32, u32)> = None;
        for (i, message) in messages.iter().enumerate() {
            let key = message.year_month();
            if current != Some(key) {
                if current.is_some() {
                    ends.push(i);
                }
                months.push(message.month_key());
                current = Some(key);
            }
        }
        if current.is_some() {
            ends.push(messages.len());
        }

        Self { months, ends, messages }
    }

    /// Month keys (`YYYY-MM`), ascending
    pub fn months(&self) -> &[String] {
        &self.months
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Cumulative window for the `index`-th month: every message up to and
    /// including that month
    pub fn window(&self, index: usize) -> Option<MonthWindow<'_>> {
        let month = self.months.get(index)?;
        let end = self.ends[index];
        Some(MonthWindow { month, messages: &self.messages[..end] })
    }

    pub fn windows(&self) -> impl Iterator<Item = MonthWindow<'_>> {
        (0..self.len()).filter_map(|i| self.window(i))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonthWindow<'a> {
    pub month: &'a str,
    pub messages: &'a [FlatMessage],
}

impl MonthWindow<'_> {
    /// One group per distinct (chat_name, branch_id), sorted by that key
    pub fn groups(&self) -> Vec<BranchGroup> {
        let mut grouped: BTreeMap<(&str, &str), BranchGroup> = BTreeMap::new();
        for message in self.messages {
            let key = (message.chat_name.as_str(), message.branch_id.as_str());
            let group = grouped.entry(key).or_insert_with(|| BranchGroup {
                chat_name: message.chat_name.clone(),
                branch_id: message.branch_id.clone(),
                title: branch_title(&message.chat_name, &message.branch_id),
                human_texts: Vec::new(),
                message_count: 0,
            });
            group.message_count += 1;
            if message.sender == Sender::Human && !message.text.is_empty() {
                group.human_texts.push(message.text.clone());
            }
        }
        grouped.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn message(chat: &str, branch: &str, id: &str, month: u32, sender: Sender) -> FlatMessage {
        FlatMessage {
            chat_name: chat.to_string(),
            chat_id: format!("{}-id", chat),
            message_id: id.to_string(),
            parent_message_id: None,
            branch_id: branch.to_string(),
            sender,
            timestamp: Utc.with_ymd_and_hms(2024, month, 15, 12, 0, 0).unwrap(),
            text: format!("text {}", id),
        }
    }

    #[test]
    fn test_windows_are_cumulative_and_ascending() {
        let buckets = MonthBuckets::new(vec![
            message("B", "0", "3", 3, Sender::Human),
            message("A", "0", "1", 1, Sender::Human),
            message("A", "0.1", "2", 1, Sender::Assistant),
        ]);

        assert_eq!(buckets.months(), &["2024-01".to_string(), "2024-03".to_string()]);
        let sizes: Vec<usize> = buckets.windows().map(|w| w.messages.len()).collect();
        assert_eq!(sizes, vec![2, 3]);
        assert!(buckets.window(2).is_none());
    }

    #[test]
    fn test_groups_sorted_with_titles_and_human_texts() {
        let buckets = MonthBuckets::new(vec![
            message("Zeta", "0", "1", 2, Sender::Human),
            message("Alpha", "0.1", "2", 2, Sender::Human),
            message("Alpha", "0", "3", 2, Sender::Assistant),
            message("Alpha", "0", "4", 2, Sender::Human),
        ]);
        let window = buckets.window(0).unwrap();
        let groups = window.groups();

        let titles: Vec<&str> = groups.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha (Branch 0)", "Alpha (Branch 0.1)", "Zeta (Branch 0)"]);
        assert_eq!(groups[0].message_count, 2);
        assert_eq!(groups[0].human_texts, vec!["text 4"]);
    }

    #[test]
    fn test_months_order_chronologically_past_year_9999() {
        let mut late = message("Far", "0", "late", 1, Sender::Human);
        late.timestamp = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let mut early = message("Far", "0", "early", 1, Sender::Human);
        early.timestamp = Utc.with_ymd_and_hms(9999, 12, 31, 0, 0, 0).unwrap();

        let buckets = MonthBuckets::new(vec![late, early, message("Near", "0", "now", 3, Sender::Human)]);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets.months()[0], "2024-03");
        assert_eq!(buckets.months()[1], "9999-12");

        let sizes: Vec<usize> = buckets.windows().map(|w| w.messages.len()).collect();
        assert_eq!(sizes, vec![1, 2, 3]);
        assert_eq!(buckets.window(2).unwrap().messages[2].message_id, "late");
    }

    #[test]
    fn test_empty_input() {
        let buckets = MonthBuckets::new(Vec::new());
        assert!(buckets.is_empty());
        assert_eq!(buckets.windows().count(), 0);
    }
}
