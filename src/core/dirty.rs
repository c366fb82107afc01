use std::collections::{BTreeMap, BTreeSet};

use crate::models::SectionId;

/// 待保存分区集合。只记录成员关系，按编辑意图而非值比较。
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    dirty: BTreeSet<SectionId>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self, id: SectionId) {
        self.dirty.insert(id);
    }

    pub fn clear(&mut self) {
        self.dirty.clear();
    }

    pub fn is_dirty(&self, id: SectionId) -> bool {
        self.dirty.contains(&id)
    }

    pub fn any(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dirty.len()
    }

    pub fn ids(&self) -> Vec<SectionId> {
        self.dirty.iter().copied().collect()
    }
}

/// 列表型分区里被改动过的条目标识，按首次改动顺序
#[derive(Debug, Clone, Default)]
pub struct ChangedSubsetTracker {
    changed: BTreeMap<SectionId, Vec<String>>,
}

impl ChangedSubsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: SectionId, identity: &str) {
        let items = self.changed.entry(id).or_default();
        if !items.iter().any(|i| i == identity) {
            items.push(identity.to_string());
        }
    }

    pub fn changed(&self, id: SectionId) -> &[String] {
        self.changed.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: SectionId, identity: &str) -> bool {
        self.changed(id).iter().any(|i| i == identity)
    }

    pub fn clear(&mut self) {
        self.changed.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.changed.values().all(Vec::is_empty)
    }
}
