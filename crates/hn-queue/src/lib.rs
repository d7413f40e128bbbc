//! Sighting queue / needed-items manager.
//!
//! Tracks which item IDs are known to exist upstream but have not yet been
//! captured, and feeds them to the worker pool. See [`run_needed_items_manager`]
//! for the cooperative task that owns this state.

use hn_model::{ItemID, ItemSighting};
use std::collections::HashSet;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// In-memory state of the needed-items manager.
///
/// A hash set over potentially millions of integers; the interval-list
/// alternative described in the design notes was not built (see DESIGN.md).
#[derive(Debug, Default)]
pub struct NeededItems {
    needed: HashSet<ItemID>,
    max_known_id: ItemID,
}

impl NeededItems {
    pub fn new() -> Self {
        NeededItems {
            needed: HashSet::new(),
            max_known_id: 0,
        }
    }

    /// Rebuild state with `max_known_id` already advanced, without populating
    /// `needed` — used by rehydration, which intentionally does not create
    /// a gap for IDs the store has no record of yet.
    pub fn max_known_id(&self) -> ItemID {
        self.max_known_id
    }

    pub fn size(&self) -> usize {
        self.needed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.needed.is_empty()
    }

    pub fn contains(&self, id: ItemID) -> bool {
        self.needed.contains(&id)
    }

    /// Apply a sighting: extend the dense horizon if `id` sets a new high
    /// watermark, then drop `id` from `needed` if it has been captured.
    pub fn notify_seen(&mut self, sighting: ItemSighting) {
        if sighting.id > self.max_known_id {
            for i in (self.max_known_id + 1)..=sighting.id {
                self.needed.insert(i);
            }
            self.max_known_id = sighting.id;
        }
        if sighting.present {
            self.needed.remove(&sighting.id);
        }
    }

    /// Return an arbitrary element of `needed`. Tie-breaks are unspecified.
    ///
    /// # Panics
    /// Panics if `needed` is empty; callers must check [`NeededItems::is_empty`] first.
    pub fn next(&self) -> ItemID {
        *self
            .needed
            .iter()
            .next()
            .expect("next() called on empty needed set")
    }

    pub fn remove(&mut self, id: ItemID) {
        self.needed.remove(&id);
    }
}

/// Drive the needed-items manager to quiescence, multiplexing incoming
/// sightings against handing an ID off to the worker pool.
///
/// When `needed` is empty the task blocks on `sighting_rx` alone. When it is
/// non-empty, a new sighting and a successful handoff race; the handoff only
/// completes once a worker has capacity, so discovery never stalls behind a
/// saturated pool.
pub async fn run_needed_items_manager(
    mut sighting_rx: mpsc::Receiver<ItemSighting>,
    work_tx: mpsc::Sender<ItemID>,
    mut shutdown: watch::Receiver<bool>,
) -> NeededItems {
    let mut state = NeededItems::new();

    loop {
        if state.is_empty() {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() { break; }
                }
                sighting = sighting_rx.recv() => {
                    match sighting {
                        Some(s) => apply_sighting(&mut state, s),
                        None => break,
                    }
                }
            }
        } else {
            let candidate = state.next();
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() { break; }
                }
                sighting = sighting_rx.recv() => {
                    match sighting {
                        Some(s) => apply_sighting(&mut state, s),
                        None => break,
                    }
                }
                permit = work_tx.reserve() => {
                    match permit {
                        Ok(permit) => {
                            permit.send(candidate);
                            state.remove(candidate);
                            hn_metrics::set_items_needed(state.size());
                            debug!(item_id = candidate, "handed off to worker pool");
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    }

    info!(needed = state.size(), max_known_id = state.max_known_id, "needed-items manager exiting");
    state
}

fn apply_sighting(state: &mut NeededItems, sighting: ItemSighting) {
    hn_metrics::inc_items_seen();
    state.notify_seen(sighting);
    hn_metrics::set_items_needed(state.size());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_cold_start_fills_gap_to_id() {
        let mut n = NeededItems::new();
        n.notify_seen(ItemSighting::seen(5));
        assert_eq!(n.size(), 5);
        assert_eq!(n.max_known_id(), 5);
        for i in 1..=5 {
            assert!(n.contains(i));
        }
    }

    #[test]
    fn s2_gap_fill_after_rehydrate() {
        let mut n = NeededItems::new();
        // Rehydration: present=true sightings for ids 2 and 4, no max_known_id advance.
        n.notify_seen(ItemSighting::captured(2));
        n.notify_seen(ItemSighting::captured(4));
        assert_eq!(n.max_known_id(), 0);
        assert_eq!(n.size(), 0);

        n.notify_seen(ItemSighting::seen(5));
        assert_eq!(n.max_known_id(), 5);
        let mut ids: Vec<_> = (1..=5).filter(|&i| n.contains(i)).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn s4_updates_fan_in_extends_horizon() {
        let mut n = NeededItems::new();
        n.notify_seen(ItemSighting::seen(9));
        for id in [10, 11, 12] {
            n.notify_seen(ItemSighting::seen(id));
        }
        assert_eq!(n.max_known_id(), 12);
        assert!(n.contains(10) && n.contains(11) && n.contains(12));
    }

    #[test]
    fn present_true_cannot_increase_needed_count() {
        let mut n = NeededItems::new();
        n.notify_seen(ItemSighting::seen(3));
        let before = n.size();
        n.notify_seen(ItemSighting::captured(3));
        assert!(n.size() < before);
        n.notify_seen(ItemSighting::captured(999));
        assert_eq!(n.max_known_id(), 3, "present=true above max_known_id must not advance it");
    }

    #[test]
    fn present_false_at_or_below_max_known_id_is_a_no_op_on_size() {
        let mut n = NeededItems::new();
        n.notify_seen(ItemSighting::seen(5));
        n.notify_seen(ItemSighting::captured(3));
        let size_before = n.size();
        let max_before = n.max_known_id();
        n.notify_seen(ItemSighting::seen(2));
        assert_eq!(n.size(), size_before);
        assert_eq!(n.max_known_id(), max_before);
    }

    #[tokio::test]
    async fn manager_hands_off_needed_ids_and_absorbs_sightings_under_backpressure() {
        let (sighting_tx, sighting_rx) = mpsc::channel(4);
        let (work_tx, mut work_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_needed_items_manager(sighting_rx, work_tx, shutdown_rx));

        sighting_tx.send(ItemSighting::seen(3)).await.unwrap();

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(work_rx.recv().await.unwrap());
        }
        received.sort_unstable();
        assert_eq!(received, vec![1, 2, 3]);

        drop(sighting_tx);
        shutdown_tx.send(true).unwrap();
        let final_state = handle.await.unwrap();
        assert!(final_state.is_empty());
    }
}
