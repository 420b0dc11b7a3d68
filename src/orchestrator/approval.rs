//! Tri-state tool-approval cache (spec C5).
//!
//! A lookup can be: explicitly approved, explicitly denied, or undefined
//! (never asked). Precedence is specific-tool approval over category
//! approval over undefined; a denial at either granularity is cached the
//! same way an approval is, so a user isn't re-prompted for something they
//! already said no to.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    Approved,
    Denied,
}

/// Entry counts at each granularity, as returned by [`ApprovalCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApprovalStats {
    pub specific: usize,
    pub category: usize,
}

#[derive(Debug, Default)]
pub struct ApprovalCache {
    by_tool: HashMap<String, Approval>,
    by_category: HashMap<String, Approval>,
}

impl ApprovalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tool(&mut self, tool: impl Into<String>, approval: Approval) {
        self.by_tool.insert(tool.into(), approval);
    }

    pub fn set_category(&mut self, category: impl Into<String>, approval: Approval) {
        self.by_category.insert(category.into(), approval);
    }

    /// Resolves an approval decision: tool-specific entry wins, then
    /// category entry, then `None` (caller must prompt).
    pub fn lookup(&self, tool: &str, category: &str) -> Option<Approval> {
        self.by_tool.get(tool).or_else(|| self.by_category.get(category)).copied()
    }

    /// Resets the cache to empty, as if nothing had ever been approved or
    /// denied this session.
    pub fn clear(&mut self) {
        self.by_tool.clear();
        self.by_category.clear();
    }

    /// Entry counts at each granularity, for observability.
    pub fn stats(&self) -> ApprovalStats {
        ApprovalStats { specific: self.by_tool.len(), category: self.by_category.len() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_lookup_returns_none() {
        let cache = ApprovalCache::new();
        assert_eq!(cache.lookup("bash", "shell"), None);
    }

    #[test]
    fn tool_specific_approval_wins_over_category() {
        let mut cache = ApprovalCache::new();
        cache.set_category("shell", Approval::Denied);
        cache.set_tool("bash", Approval::Approved);
        assert_eq!(cache.lookup("bash", "shell"), Some(Approval::Approved));
    }

    #[test]
    fn category_approval_applies_when_tool_is_undefined() {
        let mut cache = ApprovalCache::new();
        cache.set_category("shell", Approval::Approved);
        assert_eq!(cache.lookup("bash", "shell"), Some(Approval::Approved));
    }

    #[test]
    fn denials_are_cached_symmetrically_with_approvals() {
        let mut cache = ApprovalCache::new();
        cache.set_tool("write_file", Approval::Denied);
        assert_eq!(cache.lookup("write_file", "filesystem"), Some(Approval::Denied));
    }

    #[test]
    fn stats_reports_entry_counts_per_granularity() {
        let mut cache = ApprovalCache::new();
        cache.set_tool("bash", Approval::Approved);
        cache.set_tool("write_file", Approval::Denied);
        cache.set_category("filesystem", Approval::Approved);
        let stats = cache.stats();
        assert_eq!(stats.specific, 2);
        assert_eq!(stats.category, 1);
    }

    #[test]
    fn clear_makes_approvals_undefined_again_regardless_of_later_category_changes() {
        let mut cache = ApprovalCache::new();
        cache.set_tool("bash", Approval::Approved);
        cache.clear();
        assert_eq!(cache.lookup("bash", "shell"), None);
        assert_eq!(cache.stats(), ApprovalStats::default());

        cache.set_category("shell", Approval::Denied);
        assert_eq!(cache.lookup("bash", "shell"), Some(Approval::Denied));
    }
}
