use std::collections::HashMap;
use std::hash::Hash;

use crate::style::Style;

/// Attributes captured on pointer-enter and written back on pointer-leave.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavedStyle {
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: Option<f64>,
    pub stroke_opacity: Option<f64>,
    pub fill_opacity: Option<f64>,
}

impl SavedStyle {
    pub fn capture(style: &Style) -> Self {
        Self {
            fill: style.fill.clone(),
            stroke: style.stroke.clone(),
            stroke_width: style.stroke_width,
            stroke_opacity: style.stroke_opacity,
            fill_opacity: style.fill_opacity,
        }
    }

    pub fn restore_into(&self, style: &mut Style) {
        style.fill = self.fill.clone();
        style.stroke = self.stroke.clone();
        style.stroke_width = self.stroke_width;
        style.stroke_opacity = self.stroke_opacity;
        style.fill_opacity = self.fill_opacity;
    }
}

/// Highlight attributes; unset fields leave the element's value alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Highlight {
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: Option<f64>,
    pub stroke_opacity: Option<f64>,
    pub fill_opacity: Option<f64>,
}

impl Highlight {
    pub fn apply_to(&self, style: &mut Style) {
        if let Some(v) = &self.fill {
            style.fill = Some(v.clone());
        }
        if let Some(v) = &self.stroke {
            style.stroke = Some(v.clone());
        }
        if let Some(v) = self.stroke_width {
            style.stroke_width = Some(v);
        }
        if let Some(v) = self.stroke_opacity {
            style.stroke_opacity = Some(v);
        }
        if let Some(v) = self.fill_opacity {
            style.fill_opacity = Some(v);
        }
    }
}

/// Side table of pre-hover styles, one entry per hovered element.
#[derive(Debug, Clone)]
pub struct HoverTracker<K> {
    saved: HashMap<K, SavedStyle>,
}

impl<K> Default for HoverTracker<K> {
    fn default() -> Self {
        Self {
            saved: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> HoverTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots `style` and applies `highlight`. An element that already
    /// holds a snapshot keeps it and is not re-highlighted; returns `false`.
    pub fn enter(&mut self, key: K, style: &mut Style, highlight: &Highlight) -> bool {
        if self.saved.contains_key(&key) {
            return false;
        }
        self.saved.insert(key, SavedStyle::capture(style));
        highlight.apply_to(style);
        true
    }

    /// Restores the snapshot for `key` and discards it.
    pub fn leave(&mut self, key: &K, style: &mut Style) -> bool {
        match self.saved.remove(key) {
            Some(saved) => {
                saved.restore_into(style);
                true
            }
            None => false,
        }
    }

    pub fn is_hovered(&self, key: &K) -> bool {
        self.saved.contains_key(key)
    }

    pub fn saved(&self, key: &K) -> Option<&SavedStyle> {
        self.saved.get(key)
    }

    /// Lets data updates land in the snapshot of a hovered element so the
    /// restore on leave shows the new value.
    pub fn saved_mut(&mut self, key: &K) -> Option<&mut SavedStyle> {
        self.saved.get_mut(key)
    }

    /// Replaces the snapshot of a hovered element after its data changed
    /// underneath the highlight. Returns `false` when `key` is not hovered.
    pub fn recapture(&mut self, key: &K, style: &Style) -> bool {
        match self.saved.get_mut(key) {
            Some(saved) => {
                *saved = SavedStyle::capture(style);
                true
            }
            None => false,
        }
    }

    /// Drops snapshots without restoring, e.g. when a layer is rebuilt.
    pub fn forget_where(&mut self, mut pred: impl FnMut(&K) -> bool) {
        self.saved.retain(|k, _| !pred(k));
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}
