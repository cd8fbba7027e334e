//! Keyed enter/update/exit reconciliation of retained elements.
//!
//! Ordering contract:
//! - Surviving elements keep their relative order; entering elements are
//!   appended in batch order.
//! - `live_keys()` excludes elements that are animating out.

use std::collections::{HashMap, HashSet};

use foundation::time::Time;
use serde_json::Value;

use crate::element::{Lifecycle, Shape, VisualElement, VisualState, merge_datum};
use crate::transition::{OnEnd, Transition, TransitionSpec};

/// One keyed datum and the state it should be drawn in.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub key: String,
    pub class: String,
    pub datum: Value,
    pub target: VisualState,
    /// Starting state for entering elements. `None` appears at `target`.
    pub enter_from: Option<VisualState>,
}

impl Binding {
    pub fn new(key: impl Into<String>, class: impl Into<String>, datum: Value, target: VisualState) -> Self {
        Self {
            key: key.into(),
            class: class.into(),
            datum,
            target,
            enter_from: None,
        }
    }

    pub fn entering_from(mut self, state: VisualState) -> Self {
        self.enter_from = Some(state);
        self
    }
}

/// Terminal state applied to exiting elements.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExitEffect {
    /// Removed without animation.
    Remove,
    /// Circles collapse to radius 0.
    Shrink,
    /// Opacity animates to 0.
    FadeOut,
}

impl ExitEffect {
    fn terminal(self, from: &VisualState) -> VisualState {
        let mut out = from.clone();
        match self {
            ExitEffect::Remove => {}
            ExitEffect::Shrink => {
                if let Shape::Circle { r, .. } = &mut out.shape {
                    *r = 0.0;
                }
            }
            ExitEffect::FadeOut => out.style.opacity = Some(0.0),
        }
        out
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ReconcileTiming {
    pub enter: TransitionSpec,
    pub update: TransitionSpec,
    pub exit: TransitionSpec,
    pub exit_effect: ExitEffect,
}

impl ReconcileTiming {
    pub const INSTANT: ReconcileTiming = ReconcileTiming {
        enter: TransitionSpec::INSTANT,
        update: TransitionSpec::INSTANT,
        exit: TransitionSpec::INSTANT,
        exit_effect: ExitEffect::Remove,
    };
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub entered: Vec<String>,
    pub updated: Vec<String>,
    pub exited: Vec<String>,
    pub duplicates: Vec<String>,
}

/// Keyed element collection for one layer. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementSet {
    elements: Vec<VisualElement>,
    index: HashMap<String, usize>,
}

impl ElementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &VisualElement> {
        self.elements.iter()
    }

    pub fn get(&self, key: &str) -> Option<&VisualElement> {
        self.index.get(key).map(|&i| &self.elements[i])
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut VisualElement> {
        let i = *self.index.get(key)?;
        self.elements.get_mut(i)
    }

    /// Keys of elements that are not exiting, in draw order.
    pub fn live_keys(&self) -> Vec<&str> {
        self.elements
            .iter()
            .filter(|e| e.is_live())
            .map(|e| e.key.as_str())
            .collect()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.index.clear();
    }

    fn reindex(&mut self) {
        self.index = self
            .elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.key.clone(), i))
            .collect();
    }

    fn displayed(element: &VisualElement, now: Time) -> VisualState {
        element
            .transition
            .as_ref()
            .map(|t| t.sample(now))
            .unwrap_or_else(|| element.state.clone())
    }

    fn animate(element: &mut VisualElement, to: VisualState, now: Time, spec: TransitionSpec, on_end: OnEnd) {
        let from = Self::displayed(element, now);
        if spec.is_instant() {
            element.state = to;
            element.transition = None;
            return;
        }
        element.state = from.clone();
        element.transition = Some(Transition::new(from, to, now, spec, on_end));
    }

    /// Binds `bindings` to the set.
    ///
    /// Afterwards `live_keys()` equals the batch keys (first occurrence wins
    /// for duplicates). Exiting elements lose their datum immediately and are
    /// removed once their exit animation ends.
    pub fn reconcile(&mut self, bindings: Vec<Binding>, now: Time, timing: &ReconcileTiming) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut seen: HashSet<String> = HashSet::with_capacity(bindings.len());

        for b in bindings {
            if !seen.insert(b.key.clone()) {
                tracing::warn!(key = %b.key, "duplicate key in batch; keeping first occurrence");
                report.duplicates.push(b.key);
                continue;
            }
            match self.index.get(&b.key).copied() {
                Some(i) => {
                    let element = &mut self.elements[i];
                    element.class = b.class;
                    if element.is_live() {
                        merge_datum(&mut element.datum, b.datum);
                        element.lifecycle = Lifecycle::Updating;
                        Self::animate(element, b.target, now, timing.update, OnEnd::Keep);
                        report.updated.push(b.key);
                    } else {
                        // Revived while animating out: enter from where it is now.
                        element.datum = b.datum;
                        element.lifecycle = Lifecycle::Entering;
                        Self::animate(element, b.target, now, timing.enter, OnEnd::Keep);
                        report.entered.push(b.key);
                    }
                }
                None => {
                    let start = b.enter_from.clone().unwrap_or_else(|| b.target.clone());
                    let mut element = VisualElement::new(b.key.clone(), b.class, start, b.datum);
                    if b.enter_from.is_some() {
                        Self::animate(&mut element, b.target, now, timing.enter, OnEnd::Keep);
                    }
                    self.index.insert(b.key.clone(), self.elements.len());
                    self.elements.push(element);
                    report.entered.push(b.key);
                }
            }
        }

        let mut removed_now = false;
        for element in &mut self.elements {
            if seen.contains(&element.key) || !element.is_live() {
                continue;
            }
            element.datum = Value::Null;
            element.lifecycle = Lifecycle::Exiting;
            report.exited.push(element.key.clone());
            if timing.exit_effect == ExitEffect::Remove || timing.exit.is_instant() {
                element.transition = None;
                removed_now = true;
                continue;
            }
            let from = Self::displayed(element, now);
            let to = timing.exit_effect.terminal(&from);
            element.state = from.clone();
            element.transition = Some(Transition::new(from, to, now, timing.exit, OnEnd::Remove));
        }
        if removed_now {
            let exited: HashSet<&str> = report.exited.iter().map(|k| k.as_str()).collect();
            self.elements
                .retain(|e| e.transition.is_some() || e.is_live() || !exited.contains(e.key.as_str()));
            self.reindex();
        }

        tracing::debug!(
            entered = report.entered.len(),
            updated = report.updated.len(),
            exited = report.exited.len(),
            "reconciled element set"
        );
        report
    }

    /// Merges `patch` into the datum of an existing live element and
    /// retargets it. Never enters or exits anything.
    pub fn patch(&mut self, key: &str, patch: Value, target: VisualState, now: Time, spec: TransitionSpec) -> bool {
        let Some(element) = self.get_mut(key) else {
            return false;
        };
        if !element.is_live() {
            return false;
        }
        merge_datum(&mut element.datum, patch);
        element.lifecycle = Lifecycle::Updating;
        Self::animate(element, target, now, spec, OnEnd::Keep);
        true
    }

    /// Retargets an element without touching its datum.
    pub fn retarget(&mut self, key: &str, target: VisualState, now: Time, spec: TransitionSpec) -> bool {
        let Some(element) = self.get_mut(key) else {
            return false;
        };
        Self::animate(element, target, now, spec, OnEnd::Keep);
        true
    }

    pub fn set_datum(&mut self, key: &str, datum: Value) -> bool {
        match self.get_mut(key) {
            Some(element) => {
                element.datum = datum;
                true
            }
            None => false,
        }
    }

    /// Steps every transition to `now`, dropping finished exits. Returns the
    /// number of transitions still running.
    pub fn advance(&mut self, now: Time) -> usize {
        let mut running = 0;
        let mut removed = false;
        for element in &mut self.elements {
            let Some(tr) = &element.transition else {
                continue;
            };
            if tr.is_done(now) {
                element.state = tr.to.clone();
                if tr.on_end == OnEnd::Remove {
                    removed = true;
                }
                element.transition = None;
            } else {
                element.state = tr.sample(now);
                running += 1;
            }
        }
        if removed {
            self.elements
                .retain(|e| e.is_live() || e.transition.is_some());
            self.reindex();
        }
        running
    }

    /// Completes `key`'s transition immediately.
    pub fn finish(&mut self, key: &str) {
        let Some(i) = self.index.get(key).copied() else {
            return;
        };
        let Some(tr) = self.elements[i].transition.take() else {
            return;
        };
        self.elements[i].state = tr.to;
        if tr.on_end == OnEnd::Remove {
            self.elements.remove(i);
            self.reindex();
        }
    }

    /// Completes every transition, removing exits.
    pub fn finish_all(&mut self) {
        for element in &mut self.elements {
            if let Some(tr) = element.transition.take() {
                element.state = tr.to;
            }
        }
        self.elements.retain(|e| e.is_live());
        self.reindex();
    }

    pub fn has_running_transitions(&self) -> bool {
        self.elements.iter().any(|e| e.transition.is_some())
    }

    /// Moves `key` to the end of the draw order.
    pub fn raise_to_front(&mut self, key: &str) -> bool {
        let Some(i) = self.index.get(key).copied() else {
            return false;
        };
        let element = self.elements.remove(i);
        self.elements.push(element);
        self.reindex();
        true
    }
}
