use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::prelude::*;

pub type PanelIndex = u32;
pub type ControlIndex = u32;
pub type ControlValue = i32;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct ControlRange {
    pub min: ControlValue,
    pub max: ControlValue,
}

impl ControlRange {
    pub const fn new(min: ControlValue, max: ControlValue) -> Self {
        Self { min, max }
    }

    /// Rounds to the nearest integer and clamps into `[min, max]`.
    pub fn constrain(&self, value: f64) -> ControlValue {
        constrain::round_clamp(value, self.min, self.max)
    }

    pub fn contains(&self, value: ControlValue) -> bool {
        value >= self.min.min(self.max) && value <= self.max.max(self.min)
    }
}

impl Default for ControlRange {
    fn default() -> Self {
        Self::new(0, 100)
    }
}

/// Values of one panel. Controls without an entry read as 0.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct PanelState {
    #[serde(default, with = "values_format")]
    pub values: BTreeMap<ControlIndex, ControlValue>,
}

impl PanelState {
    pub fn get(&self, control: ControlIndex) -> ControlValue {
        self.values.get(&control).copied().unwrap_or_default()
    }
}

/// The complete synchronized unit: every panel's values.
///
/// Updates are persistent. [`PageState::with_value`] copies only the touched
/// panel and shares every other panel's allocation with the previous state.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct PageState {
    panels: BTreeMap<PanelIndex, Arc<PanelState>>,
}

impl PageState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_panels(panels: impl IntoIterator<Item = PanelIndex>) -> Self {
        Self {
            panels: panels
                .into_iter()
                .map(|index| (index, Arc::new(PanelState::default())))
                .collect(),
        }
    }

    pub fn get(
        &self,
        panel: PanelIndex,
        control: ControlIndex,
    ) -> ControlValue {
        self.panels
            .get(&panel)
            .map(|state| state.get(control))
            .unwrap_or_default()
    }

    pub fn panel(&self, panel: PanelIndex) -> Option<&Arc<PanelState>> {
        self.panels.get(&panel)
    }

    pub fn contains_panel(&self, panel: PanelIndex) -> bool {
        self.panels.contains_key(&panel)
    }

    pub fn panels(
        &self,
    ) -> impl Iterator<Item = (PanelIndex, &Arc<PanelState>)> {
        self.panels.iter().map(|(index, state)| (*index, state))
    }

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    pub fn with_value(
        &self,
        panel: PanelIndex,
        control: ControlIndex,
        value: ControlValue,
    ) -> PageState {
        let mut panels = self.panels.clone();
        let mut next = panels
            .get(&panel)
            .map(|state| PanelState::clone(state))
            .unwrap_or_default();
        next.values.insert(control, value);
        panels.insert(panel, Arc::new(next));
        Self { panels }
    }

    pub(crate) fn insert_panel(
        &mut self,
        panel: PanelIndex,
        state: PanelState,
    ) {
        self.panels.insert(panel, Arc::new(state));
    }
}

impl<const N: usize> From<[(PanelIndex, PanelState); N]> for PageState {
    fn from(panels: [(PanelIndex, PanelState); N]) -> Self {
        Self {
            panels: panels
                .into_iter()
                .map(|(index, state)| (index, Arc::new(state)))
                .collect(),
        }
    }
}

impl<const N: usize> From<[(ControlIndex, ControlValue); N]> for PanelState {
    fn from(values: [(ControlIndex, ControlValue); N]) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

/// Values go out as integers. Inbound numbers may be fractional (peers are
/// not required to round), so they are rounded on the way in.
mod values_format {
    use std::collections::BTreeMap;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{ControlIndex, ControlValue};

    pub fn serialize<S>(
        values: &BTreeMap<ControlIndex, ControlValue>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        values.serialize(serializer)
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<ControlIndex, ControlValue>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<ControlIndex, f64>::deserialize(deserializer)?;

        raw.into_iter()
            .map(|(index, value)| {
                let rounded = value.round();
                if !rounded.is_finite()
                    || rounded < ControlValue::MIN as f64
                    || rounded > ControlValue::MAX as f64
                {
                    return Err(D::Error::custom(format!(
                        "control {} value {} is not representable",
                        index, value
                    )));
                }
                Ok((index, rounded as ControlValue))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_panels() -> PageState {
        PageState::from([
            (0, PanelState::from([(1, 50)])),
            (1, PanelState::from([(2, 75)])),
        ])
    }

    #[test]
    fn missing_entries_read_as_zero() {
        let state = two_panels();
        assert_eq!(state.get(0, 1), 50);
        assert_eq!(state.get(0, 7), 0);
        assert_eq!(state.get(9, 0), 0);
    }

    #[test]
    fn with_value_changes_exactly_one_leaf() {
        let before = two_panels();
        let after = before.with_value(0, 3, 42);

        assert_eq!(after.get(0, 3), 42);
        assert_eq!(after.get(0, 1), 50);
        assert_eq!(after.get(1, 2), 75);

        // The previous state is untouched.
        assert_eq!(before.get(0, 3), 0);

        // Untouched panels share their allocation.
        assert!(Arc::ptr_eq(
            before.panel(1).unwrap(),
            after.panel(1).unwrap()
        ));
        assert!(!Arc::ptr_eq(
            before.panel(0).unwrap(),
            after.panel(0).unwrap()
        ));
    }

    #[test]
    fn wire_shape_uses_stringified_integer_keys() {
        let json = serde_json::to_string(&two_panels()).unwrap();
        assert_eq!(
            json,
            r#"{"0":{"values":{"1":50}},"1":{"values":{"2":75}}}"#
        );

        let parsed: PageState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, two_panels());
    }

    #[test]
    fn inbound_fractions_are_rounded() {
        let parsed: PageState =
            serde_json::from_str(r#"{"0":{"values":{"4":12.6}}}"#).unwrap();
        assert_eq!(parsed.get(0, 4), 13);
    }

    #[test]
    fn panel_without_values_is_empty() {
        let parsed: PageState = serde_json::from_str(r#"{"1":{}}"#).unwrap();
        assert!(parsed.contains_panel(1));
        assert_eq!(parsed.get(1, 0), 0);
    }

    #[test]
    fn non_integer_keys_are_rejected() {
        assert!(
            serde_json::from_str::<PageState>(r#"{"a":{"values":{}}}"#)
                .is_err()
        );
        assert!(
            serde_json::from_str::<PageState>(r#"{"0":{"values":{"x":1}}}"#)
                .is_err()
        );
    }

    #[test]
    fn range_constrains_raw_values() {
        let range = ControlRange::default();
        assert_eq!(range.constrain(50.4), 50);
        assert_eq!(range.constrain(-10.0), 0);
        assert_eq!(range.constrain(1000.0), 100);
        assert!(range.contains(100));
        assert!(!range.contains(101));
    }
}
