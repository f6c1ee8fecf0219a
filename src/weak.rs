use std::collections::HashMap;

use crate::page::{Dom, NodeId};

/// Side table keyed by node identity that never keeps a node alive.
///
/// Entries are keyed by arena slot and remember the full generational id, so a recycled slot
/// never reads back the data of the node that used to live there.
#[derive(Debug)]
pub(crate) struct NodeWeakMap<V> {
    entries: HashMap<usize, (NodeId, V)>,
}

impl<V> NodeWeakMap<V> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub(crate) fn get(&self, dom: &Dom, node: NodeId) -> Option<&V> {
        match self.entries.get(&node.index()) {
            Some((key, value)) if *key == node && dom.is_alive(node) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, dom: &Dom, node: NodeId) -> Option<&mut V> {
        match self.entries.get_mut(&node.index()) {
            Some((key, value)) if *key == node && dom.is_alive(node) => Some(value),
            _ => None,
        }
    }

    /// Existing live entry for `node`, or a fresh one. A stale entry in the same slot is
    /// replaced.
    pub(crate) fn get_or_insert_with(
        &mut self,
        node: NodeId,
        default: impl FnOnce() -> V,
    ) -> &mut V {
        let index = node.index();
        if self.entries.get(&index).is_some_and(|(key, _)| *key != node) {
            // Slot was recycled; the previous occupant is gone.
            self.entries.remove(&index);
        }
        &mut self.entries.entry(index).or_insert_with(|| (node, default())).1
    }

    /// Drops entries whose node has been disposed. Returns how many were dropped.
    pub(crate) fn prune(&mut self, dom: &Dom) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (node, _)| dom.is_alive(*node));
        before - self.entries.len()
    }

    /// Empties the map, splitting entries into live ones and the ids of stale ones.
    pub(crate) fn drain_live(&mut self, dom: &Dom) -> (Vec<(NodeId, V)>, Vec<NodeId>) {
        let mut live = Vec::new();
        let mut stale = Vec::new();
        for (_, (node, value)) in self.entries.drain() {
            if dom.is_alive(node) {
                live.push((node, value));
            } else {
                stale.push(node);
            }
        }
        live.sort_by_key(|(node, _)| *node);
        (live, stale)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for NodeWeakMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Page, Result};

    #[test]
    fn disposed_nodes_read_as_absent_and_are_pruned() -> Result<()> {
        let mut page = Page::from_html("<div id='a'></div><div id='b'></div>")?;
        let a = page.select("#a")?;
        let b = page.select("#b")?;

        let mut map = NodeWeakMap::new();
        *map.get_or_insert_with(a, || 0) += 1;
        *map.get_or_insert_with(a, || 0) += 1;
        map.get_or_insert_with(b, || 10);
        assert_eq!(map.get(page.dom(), a), Some(&2));

        page.dispose(a)?;
        assert_eq!(map.get(page.dom(), a), None);

        // The freed slot is reused by the next element; it must start fresh.
        let c = page.create_element("span");
        assert_eq!(*map.get_or_insert_with(c, || 7), 7);
        assert_eq!(map.get(page.dom(), a), None);

        page.dispose(c)?;
        assert_eq!(map.prune(page.dom()), 1);
        assert_eq!(map.len(), 1);
        Ok(())
    }

    #[test]
    fn drain_splits_live_and_stale() -> Result<()> {
        let mut page = Page::from_html("<p id='a'></p><p id='b'></p>")?;
        let a = page.select("#a")?;
        let b = page.select("#b")?;
        let mut map = NodeWeakMap::new();
        map.get_or_insert_with(a, || "a");
        map.get_or_insert_with(b, || "b");
        page.dispose(b)?;

        let (live, stale) = map.drain_live(page.dom());
        assert_eq!(live, vec![(a, "a")]);
        assert_eq!(stale, vec![b]);
        assert!(map.is_empty());
        Ok(())
    }
}
