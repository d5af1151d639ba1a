use std::collections::HashMap;
use std::hash::Hash;

use super::rule::ThresholdRule;
use super::state::{EntityState, Transition};

/// State removed by [`TransitionDetector::sweep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction<K> {
    pub key: K,
    /// The entity was inside when evicted; the caller owes observers an EXIT.
    pub was_inside: bool,
}

/// Single-writer transition detector for one track type.
///
/// Each call to [`observe`](Self::observe) compares the predicate against the
/// stored `inside` flag and flips it on change. There is no dead-band: one
/// sample across the threshold is enough to flip.
#[derive(Debug)]
pub struct TransitionDetector<K> {
    states: HashMap<K, EntityState<K>>,
    cycle: u64,
}

impl<K> Default for TransitionDetector<K> {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
            cycle: 0,
        }
    }
}

impl<K> TransitionDetector<K>
where
    K: Eq + Hash + Ord + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the cycle counter. Call once per polling cycle, before any
    /// observation of that cycle.
    pub fn begin_cycle(&mut self) -> u64 {
        self.cycle += 1;
        self.cycle
    }

    pub fn current_cycle(&self) -> u64 {
        self.cycle
    }

    pub fn observe(&mut self, key: &K, value: f64, rule: ThresholdRule) -> Option<Transition> {
        let cycle = self.cycle;
        let state = self
            .states
            .entry(key.clone())
            .or_insert_with(|| EntityState {
                key: key.clone(),
                inside: false,
                last_seen_cycle: cycle,
            });
        state.last_seen_cycle = cycle;

        let now_inside = rule.is_inside(value);
        if now_inside == state.inside {
            return None;
        }

        state.inside = now_inside;
        Some(if now_inside {
            Transition::Enter
        } else {
            Transition::Exit
        })
    }

    /// Evicts every entity missing from the last `max_missed_cycles`
    /// consecutive cycles. Evictions come back sorted by key.
    pub fn sweep(&mut self, max_missed_cycles: u64) -> Vec<Eviction<K>> {
        let max_missed = max_missed_cycles.max(1);
        let cycle = self.cycle;

        let mut stale: Vec<K> = self
            .states
            .values()
            .filter(|s| cycle.saturating_sub(s.last_seen_cycle) >= max_missed)
            .map(|s| s.key.clone())
            .collect();
        stale.sort();

        stale
            .into_iter()
            .filter_map(|key| self.states.remove(&key))
            .map(|state| Eviction {
                key: state.key,
                was_inside: state.inside,
            })
            .collect()
    }

    pub fn state(&self, key: &K) -> Option<&EntityState<K>> {
        self.states.get(key)
    }

    pub fn is_inside(&self, key: &K) -> bool {
        self.states.get(key).is_some_and(|s| s.inside)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn inside_count(&self) -> usize {
        self.states.values().filter(|s| s.inside).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RADIUS: ThresholdRule = ThresholdRule::WithinRadius { radius_km: 10.0 };
    const ELEVATION: ThresholdRule = ThresholdRule::AboveElevation {
        min_elevation_deg: 15.0,
    };

    #[test]
    fn first_inside_observation_enters() {
        let mut detector = TransitionDetector::new();
        detector.begin_cycle();
        assert_eq!(detector.observe(&"abc123".to_string(), 8.0, RADIUS), Some(Transition::Enter));
        assert!(detector.is_inside(&"abc123".to_string()));
    }

    #[test]
    fn first_outside_observation_is_silent_but_tracked() {
        let mut detector = TransitionDetector::new();
        detector.begin_cycle();
        assert_eq!(detector.observe(&1u32, 10.0, ELEVATION), None);
        let state = detector.state(&1).unwrap();
        assert!(!state.inside);
        assert_eq!(state.last_seen_cycle, 1);
    }

    #[test]
    fn unchanged_predicate_is_idempotent() {
        let mut detector = TransitionDetector::new();
        detector.begin_cycle();
        assert_eq!(detector.observe(&7u32, 30.0, ELEVATION), Some(Transition::Enter));
        for _ in 0..5 {
            detector.begin_cycle();
            assert_eq!(detector.observe(&7u32, 31.0, ELEVATION), None);
        }
        assert_eq!(detector.state(&7).unwrap().last_seen_cycle, 6);
    }

    #[test]
    fn kinds_alternate_for_every_sequence() {
        // Every inside/outside sequence of length 10.
        for mask in 0u32..1024 {
            let mut detector = TransitionDetector::new();
            let mut transitions = Vec::new();
            for bit in 0..10 {
                detector.begin_cycle();
                let value = if mask & (1 << bit) != 0 { 1.0 } else { 20.0 };
                if let Some(t) = detector.observe(&0u32, value, RADIUS) {
                    transitions.push(t);
                }
            }

            for (i, t) in transitions.iter().enumerate() {
                let expected = if i % 2 == 0 {
                    Transition::Enter
                } else {
                    Transition::Exit
                };
                assert_eq!(*t, expected, "mask {mask:#b}");
            }
            let enters = transitions.iter().filter(|t| **t == Transition::Enter).count();
            let exits = transitions.len() - enters;
            assert!(enters == exits || enters == exits + 1);
            assert_eq!(enters > exits, detector.is_inside(&0));
        }
    }

    #[test]
    fn sweep_evicts_after_k_missed_cycles() {
        let mut detector = TransitionDetector::new();
        detector.begin_cycle();
        detector.observe(&1u32, 5.0, ELEVATION);

        detector.begin_cycle();
        detector.begin_cycle();
        assert!(detector.sweep(3).is_empty());

        detector.begin_cycle();
        let evicted = detector.sweep(3);
        assert_eq!(
            evicted,
            vec![Eviction {
                key: 1,
                was_inside: false
            }]
        );
        assert!(detector.is_empty());
    }

    #[test]
    fn sweep_flags_inside_entities() {
        let mut detector = TransitionDetector::new();
        detector.begin_cycle();
        detector.observe(&"b".to_string(), 1.0, RADIUS);
        detector.observe(&"a".to_string(), 50.0, RADIUS);
        detector.begin_cycle();

        let evicted = detector.sweep(1);
        assert_eq!(evicted.len(), 2);
        assert_eq!(evicted[0].key, "a");
        assert!(!evicted[0].was_inside);
        assert_eq!(evicted[1].key, "b");
        assert!(evicted[1].was_inside);
    }

    #[test]
    fn seen_entities_survive_sweep() {
        let mut detector = TransitionDetector::new();
        for _ in 0..10 {
            detector.begin_cycle();
            detector.observe(&3u32, 40.0, ELEVATION);
            assert!(detector.sweep(1).is_empty());
        }
        assert_eq!(detector.len(), 1);
        assert_eq!(detector.inside_count(), 1);
    }

    #[test]
    fn reappearing_after_eviction_starts_outside() {
        let mut detector = TransitionDetector::new();
        detector.begin_cycle();
        assert_eq!(detector.observe(&9u32, 1.0, RADIUS), Some(Transition::Enter));
        detector.begin_cycle();
        let evicted = detector.sweep(1);
        assert!(evicted[0].was_inside);

        detector.begin_cycle();
        assert_eq!(detector.observe(&9u32, 1.0, RADIUS), Some(Transition::Enter));
    }
}
