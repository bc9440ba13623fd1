//! Pane layout planning and materialization.
//!
//! A window's panes are laid out purely by count. [`plan`] turns the count
//! into split steps; [`materialize`] runs them against a multiplexer. Slot
//! `i` of the result is the pane for the `i`th configured pane, so reading
//! order matches declaration order:
//!
//! | panes | arrangement                                   |
//! |-------|-----------------------------------------------|
//! | 1     | no split                                      |
//! | 2     | side by side, evened out                      |
//! | 3     | left pane, right side split top and bottom    |
//! | 4     | 2×2 grid, top-left to bottom-right            |
//! | 5+    | repeated splits, re-tiled after each          |

use crate::mux::{Multiplexer, PaneId, Split, TmuxLayout, WindowId};
use std::path::Path;

/// Split slot `from` to create the next slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitStep {
    pub from: usize,
    pub split: Split,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    pub steps: Vec<SplitStep>,
    /// Layout applied after all splits.
    pub finish: Option<TmuxLayout>,
    /// Re-tile after every split so later splits have room.
    pub retile: bool,
}

impl LayoutPlan {
    pub fn pane_count(&self) -> usize {
        self.steps.len() + 1
    }

    /// Slots in the order tmux lists the window's panes.
    ///
    /// tmux inserts a split pane right after its source in the pane list,
    /// and layout changes never reorder it.
    pub fn list_order(&self) -> Vec<usize> {
        let mut order = vec![0];
        for (i, step) in self.steps.iter().enumerate() {
            let at = order
                .iter()
                .position(|&slot| slot == step.from)
                .map_or(order.len(), |p| p + 1);
            order.insert(at, i + 1);
        }
        order
    }

    /// Position in tmux's pane list of each slot.
    pub fn slot_positions(&self) -> Vec<usize> {
        let order = self.list_order();
        let mut positions = vec![0; order.len()];
        for (position, slot) in order.into_iter().enumerate() {
            positions[slot] = position;
        }
        positions
    }
}

const fn step(from: usize, split: Split) -> SplitStep {
    SplitStep { from, split }
}

/// Plan the splits for a window with `count` panes.
///
/// A count of zero plans the same as one; the window always has its
/// initial pane.
pub fn plan(count: usize) -> LayoutPlan {
    match count {
        0 | 1 => LayoutPlan {
            steps: Vec::new(),
            finish: None,
            retile: false,
        },
        2 => LayoutPlan {
            steps: vec![step(0, Split::Right)],
            finish: Some(TmuxLayout::EvenHorizontal),
            retile: false,
        },
        3 => LayoutPlan {
            steps: vec![step(0, Split::Right), step(1, Split::Below)],
            finish: None,
            retile: false,
        },
        4 => LayoutPlan {
            steps: vec![
                step(0, Split::Right),
                step(0, Split::Below),
                step(1, Split::Below),
            ],
            finish: Some(TmuxLayout::Tiled),
            retile: false,
        },
        n => LayoutPlan {
            steps: (1..n).map(|slot| step(slot - 1, Split::Below)).collect(),
            finish: Some(TmuxLayout::Tiled),
            retile: true,
        },
    }
}

/// Panes created for one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    /// One entry per planned slot; `None` where the split failed.
    pub slots: Vec<Option<PaneId>>,
}

impl Materialized {
    pub fn requested(&self) -> usize {
        self.slots.len()
    }

    pub fn created(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn pane(&self, index: usize) -> Option<&PaneId> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn first(&self) -> Option<&PaneId> {
        self.slots.iter().flatten().next()
    }
}

/// Run `plan` in `window`, rooting new panes at `dir`.
///
/// Failed splits are logged and leave their slot empty; a split from an
/// empty slot is skipped. Layout failures are logged and ignored.
pub fn materialize(
    mux: &dyn Multiplexer,
    window: &WindowId,
    dir: &Path,
    plan: &LayoutPlan,
) -> Materialized {
    let mut slots: Vec<Option<PaneId>> = Vec::with_capacity(plan.pane_count());
    match mux.list_panes(window) {
        Ok(panes) => slots.push(panes.into_iter().next()),
        Err(e) => {
            log::warn!("window {}: cannot list panes: {}", window, e);
            slots.push(None);
        }
    }

    for step in &plan.steps {
        let created = match slots.get(step.from).cloned().flatten() {
            Some(source) => match mux.split_pane(&source, step.split, dir) {
                Ok(pane) => Some(pane),
                Err(e) => {
                    log::warn!("window {}: split of {} failed: {}", window, source, e);
                    None
                }
            },
            None => None,
        };
        let split = created.is_some();
        slots.push(created);
        if split && plan.retile {
            if let Err(e) = mux.select_layout(window, TmuxLayout::Tiled) {
                log::warn!("window {}: re-tiling failed: {}", window, e);
            }
        }
    }

    if let Some(layout) = plan.finish {
        if let Err(e) = mux.select_layout(window, layout) {
            log::warn!("window {}: layout {} failed: {}", window, layout.as_str(), e);
        }
    }
    Materialized { slots }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryMux;

    #[test]
    fn test_single_pane_needs_nothing() {
        assert_eq!(plan(1), plan(0));
        assert!(plan(1).steps.is_empty());
        assert_eq!(plan(1).finish, None);
    }

    #[test]
    fn test_two_panes_even_split() {
        let p = plan(2);
        assert_eq!(p.steps, vec![step(0, Split::Right)]);
        assert_eq!(p.finish, Some(TmuxLayout::EvenHorizontal));
    }

    #[test]
    fn test_three_panes_split_right_side() {
        let p = plan(3);
        assert_eq!(p.steps, vec![step(0, Split::Right), step(1, Split::Below)]);
        assert_eq!(p.finish, None);
    }

    #[test]
    fn test_four_panes_grid() {
        let p = plan(4);
        assert_eq!(p.pane_count(), 4);
        assert_eq!(p.finish, Some(TmuxLayout::Tiled));
        assert!(!p.retile);
    }

    #[test]
    fn test_many_panes_tiled() {
        let p = plan(6);
        assert_eq!(p.pane_count(), 6);
        assert!(p.retile);
        assert!(p.steps.iter().enumerate().all(|(i, s)| s.from == i));
        assert_eq!(p.finish, Some(TmuxLayout::Tiled));
    }

    #[test]
    fn test_four_panes_reading_order() {
        let mux = MemoryMux::new();
        let window = mux.new_session("demo", Path::new("/w"), Some("main")).unwrap();
        let built = materialize(&mux, &window, Path::new("/w"), &plan(4));
        assert_eq!(built.created(), 4);

        // tmux orders panes top-left, bottom-left, top-right, bottom-right
        // for this split sequence; slots follow declaration order instead.
        let order = mux.list_panes(&window).unwrap();
        assert_eq!(order[0], *built.pane(0).unwrap());
        assert_eq!(order[1], *built.pane(2).unwrap());
        assert_eq!(order[2], *built.pane(1).unwrap());
        assert_eq!(order[3], *built.pane(3).unwrap());
        assert_eq!(mux.session("demo").unwrap().windows[0].layout, Some(TmuxLayout::Tiled));
    }

    #[test]
    fn test_list_order() {
        assert_eq!(plan(1).list_order(), vec![0]);
        assert_eq!(plan(3).list_order(), vec![0, 1, 2]);
        assert_eq!(plan(4).list_order(), vec![0, 2, 1, 3]);
        assert_eq!(plan(4).slot_positions(), vec![0, 2, 1, 3]);
        assert_eq!(plan(5).list_order(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_partial_failure_reports_counts() {
        let mux = MemoryMux::new();
        let window = mux.new_session("demo", Path::new("/w"), Some("main")).unwrap();
        mux.fail_splits_after(2);
        let built = materialize(&mux, &window, Path::new("/w"), &plan(4));
        assert_eq!(built.requested(), 4);
        assert_eq!(built.created(), 3);
        assert_eq!(built.pane(3), None);
        assert!(built.first().is_some());
    }

    #[test]
    fn test_failed_source_skips_dependent_split() {
        let mux = MemoryMux::new();
        let window = mux.new_session("demo", Path::new("/w"), Some("main")).unwrap();
        mux.fail_splits_after(0);
        let built = materialize(&mux, &window, Path::new("/w"), &plan(3));
        assert_eq!(built.created(), 1);
        // Only the first split was attempted; slot 1 never existed.
        let splits = mux.commands().iter().filter(|c| c.starts_with("split-window")).count();
        assert_eq!(splits, 1);
    }
}
