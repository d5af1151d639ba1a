use serde::Serialize;

/// Tracking state of one entity, owned by a [`super::TransitionDetector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityState<K> {
    pub key: K,
    pub inside: bool,
    pub last_seen_cycle: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transition {
    Enter,
    Exit,
}
