use std::collections::BTreeMap;

/// Per-map counters.
///
/// Names are dotted (`reconcile.enter`, `arcs.omitted`). Sorted maps keep
/// snapshots stable for logs and test assertions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, i64>,
}

pub const RECONCILE_ENTER: &str = "reconcile.enter";
pub const RECONCILE_UPDATE: &str = "reconcile.update";
pub const RECONCILE_EXIT: &str = "reconcile.exit";
pub const RECONCILE_DUPLICATE: &str = "reconcile.duplicate";
pub const ARCS_OMITTED: &str = "arcs.omitted";
pub const BUBBLES_OMITTED: &str = "bubbles.omitted";

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn inc_counter(&mut self, name: impl Into<String>, by: u64) {
        if by == 0 {
            return;
        }
        *self.counters.entry(name.into()).or_insert(0) += by;
    }

    pub fn gauge(&self, name: &str) -> Option<i64> {
        self.gauges.get(name).copied()
    }

    pub fn set_gauge(&mut self, name: impl Into<String>, value: i64) {
        self.gauges.insert(name.into(), value);
    }

    /// Records one reconcile pass and the resulting live element count for
    /// `layer` (gauge `live.<layer>`).
    pub fn record_reconcile(
        &mut self,
        layer: &str,
        entered: usize,
        updated: usize,
        exited: usize,
        live: usize,
    ) {
        self.inc_counter(RECONCILE_ENTER, entered as u64);
        self.inc_counter(RECONCILE_UPDATE, updated as u64);
        self.inc_counter(RECONCILE_EXIT, exited as u64);
        self.set_gauge(format!("live.{layer}"), live as i64);
    }

    /// Stable, sorted `(name, value)` view of every counter.
    pub fn counters(&self) -> Vec<(String, u64)> {
        self.counters.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Metrics, RECONCILE_ENTER, RECONCILE_EXIT, RECONCILE_UPDATE};

    #[test]
    fn counters_accumulate() {
        let mut m = Metrics::new();
        m.inc_counter("a", 1);
        m.inc_counter("a", 2);
        assert_eq!(m.counter("a"), 3);
        assert_eq!(m.counter("missing"), 0);
    }

    #[test]
    fn reconcile_pass_updates_counters_and_gauge() {
        let mut m = Metrics::new();
        m.record_reconcile("bubbles", 2, 0, 0, 2);
        m.record_reconcile("bubbles", 1, 1, 1, 2);
        assert_eq!(m.counter(RECONCILE_ENTER), 3);
        assert_eq!(m.counter(RECONCILE_UPDATE), 1);
        assert_eq!(m.counter(RECONCILE_EXIT), 1);
        assert_eq!(m.gauge("live.bubbles"), Some(2));
    }

    #[test]
    fn counter_view_is_sorted_and_skips_zero_increments() {
        let mut m = Metrics::new();
        m.inc_counter("b", 1);
        m.inc_counter("a", 1);
        m.inc_counter("c", 0);
        assert_eq!(
            m.counters(),
            vec![("a".to_string(), 1), ("b".to_string(), 1)]
        );
    }
}
