//! Read-only view models derived from [`PageState`] and the current step.
//!
//! Nothing here owns state. A [`Projector`] only remembers the items it
//! produced last time so that unchanged items come back as the same `Arc`,
//! letting a view layer skip redrawing them.

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use super::PageCommand;
use crate::config::{PageConfig, PanelConfig};
use crate::state::{
    ControlIndex, ControlRange, ControlValue, PageState, PanelIndex,
};

pub const PANEL_WIDTH: u32 = 368;
pub const PANEL_HEIGHT: u32 = 368;
pub const DESKTOP_GAP: u32 = 20;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ControlTarget {
    pub panel: PanelIndex,
    pub control: ControlIndex,
}

impl ControlTarget {
    pub const fn new(panel: PanelIndex, control: ControlIndex) -> Self {
        Self { panel, control }
    }
}

/// Change handler handed to a view for one control.
///
/// Calling it posts the raw value to the page inbox; the page applies it on
/// its next pass. Handles are created once per control and reused across
/// projections, and compare equal by target.
#[derive(Clone)]
pub struct ChangeCallback {
    target: ControlTarget,
    inbox: Sender<PageCommand>,
}

impl ChangeCallback {
    pub fn new(target: ControlTarget, inbox: Sender<PageCommand>) -> Self {
        Self { target, inbox }
    }

    pub fn target(&self) -> ControlTarget {
        self.target
    }

    /// Returns `false` if the page is gone.
    pub fn call(&self, value: f64) -> bool {
        self.inbox
            .send(PageCommand::ControlChange {
                target: self.target,
                value,
            })
            .is_ok()
    }
}

impl PartialEq for ChangeCallback {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl fmt::Debug for ChangeCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeCallback")
            .field("target", &self.target)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PanelContentType {
    Grid,
    Row,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KnobProps {
    pub value: ControlValue,
    pub range: ControlRange,
    pub on_change: ChangeCallback,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LedProps {
    pub is_on: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GridItem {
    pub id: String,
    pub knob: KnobProps,
    pub led: LedProps,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SliderProps {
    pub value: ControlValue,
    pub range: ControlRange,
    pub on_change: ChangeCallback,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowItem {
    pub id: String,
    pub slider: SliderProps,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GridPanelProps {
    pub columns: u32,
    pub rows: u32,
    pub width: u32,
    pub height: u32,
    pub items: Vec<Arc<GridItem>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowPanelProps {
    pub width: u32,
    pub items: Vec<Arc<RowItem>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PanelProps {
    Grid(GridPanelProps),
    Row(RowPanelProps),
}

impl PanelProps {
    pub fn content_type(&self) -> PanelContentType {
        match self {
            Self::Grid(_) => PanelContentType::Grid,
            Self::Row(_) => PanelContentType::Row,
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Grid(grid) => grid.width,
            Self::Row(row) => row.width,
        }
    }

    pub fn as_grid(&self) -> Option<&GridPanelProps> {
        match self {
            Self::Grid(grid) => Some(grid),
            Self::Row(_) => None,
        }
    }

    pub fn as_row(&self) -> Option<&RowPanelProps> {
        match self {
            Self::Row(row) => Some(row),
            Self::Grid(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DesktopProps {
    pub columns: u32,
    pub rows: u32,
    pub gap: u32,
    pub panels: Vec<PanelProps>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageProps {
    pub desktop: DesktopProps,
}

impl PageProps {
    pub fn sequencer(&self) -> Option<&GridPanelProps> {
        self.desktop.panels.iter().find_map(PanelProps::as_grid)
    }

    pub fn sliders(&self) -> Option<&RowPanelProps> {
        self.desktop.panels.iter().find_map(PanelProps::as_row)
    }
}

/// Smallest near-square grid that fits `count` cells, e.g. 16 => 4x4.
pub fn grid_dimensions(count: usize) -> (u32, u32) {
    if count == 0 {
        return (0, 0);
    }
    let mut columns = 1;
    while columns * columns < count {
        columns += 1;
    }
    let rows = count.div_ceil(columns);
    (columns as u32, rows as u32)
}

pub struct Projector {
    sequencer: PanelConfig,
    sliders: PanelConfig,
    knob_callbacks: Vec<ChangeCallback>,
    slider_callbacks: Vec<ChangeCallback>,
    grid_items: Vec<Arc<GridItem>>,
    row_items: Vec<Arc<RowItem>>,
}

impl Projector {
    pub fn new(config: &PageConfig, inbox: Sender<PageCommand>) -> Self {
        Self {
            knob_callbacks: callbacks(&config.sequencer, &inbox),
            slider_callbacks: callbacks(&config.sliders, &inbox),
            sequencer: config.sequencer.clone(),
            sliders: config.sliders.clone(),
            grid_items: Vec::new(),
            row_items: Vec::new(),
        }
    }

    pub fn project(
        &mut self,
        state: &PageState,
        current_step: usize,
    ) -> PageProps {
        PageProps {
            desktop: DesktopProps {
                columns: 1,
                rows: 1,
                gap: DESKTOP_GAP,
                panels: vec![
                    PanelProps::Grid(
                        self.project_sequencer(state, current_step),
                    ),
                    PanelProps::Row(self.project_sliders(state)),
                ],
            },
        }
    }

    pub fn project_sequencer(
        &mut self,
        state: &PageState,
        current_step: usize,
    ) -> GridPanelProps {
        let panel = self.sequencer.index;
        let range = self.sequencer.range;
        let (columns, rows) = grid_dimensions(self.sequencer.count);

        let items = (0..self.sequencer.count)
            .map(|index| {
                let item = GridItem {
                    id: format!("control-{}", index),
                    knob: KnobProps {
                        value: state.get(panel, index as ControlIndex),
                        range,
                        on_change: self.knob_callbacks[index].clone(),
                    },
                    led: LedProps {
                        is_on: current_step == index,
                    },
                };
                memoize(&mut self.grid_items, index, item)
            })
            .collect();

        GridPanelProps {
            columns,
            rows,
            width: PANEL_WIDTH,
            height: PANEL_HEIGHT,
            items,
        }
    }

    pub fn project_sliders(&mut self, state: &PageState) -> RowPanelProps {
        let panel = self.sliders.index;
        let range = self.sliders.range;

        let items = (0..self.sliders.count)
            .map(|index| {
                let item = RowItem {
                    id: format!("control-{}", index),
                    slider: SliderProps {
                        value: state.get(panel, index as ControlIndex),
                        range,
                        on_change: self.slider_callbacks[index].clone(),
                    },
                };
                memoize(&mut self.row_items, index, item)
            })
            .collect();

        RowPanelProps {
            width: PANEL_WIDTH,
            items,
        }
    }
}

fn callbacks(
    panel: &PanelConfig,
    inbox: &Sender<PageCommand>,
) -> Vec<ChangeCallback> {
    (0..panel.count)
        .map(|index| {
            ChangeCallback::new(
                ControlTarget::new(panel.index, index as ControlIndex),
                inbox.clone(),
            )
        })
        .collect()
}

fn memoize<T: PartialEq>(
    cache: &mut Vec<Arc<T>>,
    index: usize,
    next: T,
) -> Arc<T> {
    match cache.get(index) {
        Some(previous) if **previous == next => previous.clone(),
        Some(_) => {
            let item = Arc::new(next);
            cache[index] = item.clone();
            item
        }
        None => {
            let item = Arc::new(next);
            cache.push(item.clone());
            item
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::state::PanelState;

    fn projector() -> (Projector, mpsc::Receiver<PageCommand>) {
        let (tx, rx) = mpsc::channel();
        (Projector::new(&PageConfig::default(), tx), rx)
    }

    #[test]
    fn grid_dimensions_are_near_square() {
        assert_eq!(grid_dimensions(16), (4, 4));
        assert_eq!(grid_dimensions(4), (2, 2));
        assert_eq!(grid_dimensions(5), (3, 2));
        assert_eq!(grid_dimensions(1), (1, 1));
    }

    #[test]
    fn empty_state_projects_zeroes() {
        let (mut projector, _rx) = projector();
        let props = projector.project(&PageState::with_panels([0, 1]), 0);

        let sequencer = props.sequencer().unwrap();
        assert_eq!((sequencer.columns, sequencer.rows), (4, 4));
        assert_eq!(sequencer.items.len(), 16);
        assert!(sequencer.items.iter().all(|item| item.knob.value == 0));

        let sliders = props.sliders().unwrap();
        assert_eq!(sliders.items.len(), 4);
        assert!(sliders.items.iter().all(|item| item.slider.value == 0));
    }

    #[test]
    fn only_the_current_step_is_lit() {
        let (mut projector, _rx) = projector();
        let grid = projector.project_sequencer(&PageState::new(), 5);

        for (index, item) in grid.items.iter().enumerate() {
            assert_eq!(item.led.is_on, index == 5, "led {}", index);
        }
    }

    #[test]
    fn slider_panel_width_is_fixed() {
        let (mut projector, _rx) = projector();
        let state =
            PageState::from([(1, PanelState::from([(0, 99), (3, 12)]))]);
        assert_eq!(projector.project_sliders(&state).width, PANEL_WIDTH);
        assert_eq!(projector.project_sliders(&PageState::new()).width, 368);
    }

    #[test]
    fn unchanged_items_keep_their_identity() {
        let (mut projector, _rx) = projector();
        let before = projector.project_sequencer(&PageState::new(), 0);
        let state = PageState::from([(0, PanelState::from([(7, 40)]))]);
        let after = projector.project_sequencer(&state, 1);

        // Step moved 0 -> 1 and control 7 changed; everything else is shared.
        for index in 0..16 {
            let same = Arc::ptr_eq(&before.items[index], &after.items[index]);
            assert_eq!(same, ![0, 1, 7].contains(&index), "item {}", index);
        }
    }

    #[test]
    fn callbacks_post_control_changes() {
        let (mut projector, rx) = projector();
        let props = projector.project(&PageState::new(), 0);

        assert!(props.sequencer().unwrap().items[2].knob.on_change.call(12.5));
        assert!(props.sliders().unwrap().items[3].slider.on_change.call(80.0));

        assert_eq!(
            rx.try_recv().unwrap(),
            PageCommand::ControlChange {
                target: ControlTarget::new(0, 2),
                value: 12.5
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            PageCommand::ControlChange {
                target: ControlTarget::new(1, 3),
                value: 80.0
            }
        );
    }
}
