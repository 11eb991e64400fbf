use super::page_state::*;
use crate::prelude::*;

/// Authoritative owner of the [`PageState`].
///
/// Every write goes through this type. Writes never mutate a previously
/// returned `PageState`; they swap in a new one.
#[derive(Clone, Debug)]
pub struct ControlStore {
    ranges: HashMap<PanelIndex, ControlRange>,
    state: PageState,
}

impl ControlStore {
    /// Creates a store with every known panel initialized and empty.
    pub fn new(
        layout: impl IntoIterator<Item = (PanelIndex, ControlRange)>,
    ) -> Self {
        let ranges: HashMap<_, _> = layout.into_iter().collect();
        let state = PageState::with_panels(ranges.keys().copied());
        Self { ranges, state }
    }

    pub fn range(&self, panel: PanelIndex) -> ControlRange {
        self.ranges.get(&panel).copied().unwrap_or_default()
    }

    pub fn get(
        &self,
        panel: PanelIndex,
        control: ControlIndex,
    ) -> ControlValue {
        self.state.get(panel, control)
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn snapshot(&self) -> PageState {
        self.state.clone()
    }

    /// Computes the state that results from setting one control, without
    /// committing it.
    pub fn next_state(
        &self,
        panel: PanelIndex,
        control: ControlIndex,
        value: f64,
    ) -> PageState {
        let range = self.range(panel);
        let constrained = range.constrain(value);

        if constrained as f64 != value {
            trace!(
                "constrained panel {} control {} from {} to {}",
                panel, control, value, constrained
            );
        }

        if !self.ranges.contains_key(&panel) {
            warn!("setting control {} on unknown panel {}", control, panel);
        }

        self.state.with_value(panel, control, constrained)
    }

    pub fn commit(&mut self, next: PageState) {
        self.state = next;
    }

    pub fn set(
        &mut self,
        panel: PanelIndex,
        control: ControlIndex,
        value: f64,
    ) -> PageState {
        let next = self.next_state(panel, control, value);
        self.commit(next.clone());
        next
    }

    /// Swaps in a whole new state. Known panels missing from `next` are
    /// restored empty and out-of-range values are clamped.
    pub fn replace(&mut self, mut next: PageState) {
        for (&panel, range) in &self.ranges {
            let Some(state) = next.panel(panel) else {
                debug!("snapshot missing panel {}; using defaults", panel);
                next.insert_panel(panel, PanelState::default());
                continue;
            };

            if state.values.values().all(|value| range.contains(*value)) {
                continue;
            }

            let clamped = PanelState {
                values: state
                    .values
                    .iter()
                    .map(|(&control, &value)| {
                        (control, range.constrain(value as f64))
                    })
                    .collect(),
            };
            next.insert_panel(panel, clamped);
        }

        self.state = next;
    }
}
