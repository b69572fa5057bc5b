use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::AssetId;

/// Press must stay down this long to arm selection mode.
pub const LONG_PRESS: Duration = Duration::from_millis(500);

/// Movement beyond this radius while pressing cedes the gesture to the
/// grid's own scroll.
pub const JITTER_RADIUS: f32 = 8.0;

/// Fixed geometry of the thumbnail grid, in content coordinates (origin at
/// the top-left of the scrollable content, y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub cell: f32,
    pub spacing: f32,
    pub padding: f32,
    pub columns: usize,
}

impl GridGeometry {
    pub fn stride(&self) -> f32 {
        self.cell + self.spacing
    }

    /// Map a raw content position to a flat cell index. Positions left of /
    /// above the padding, inside an inter-cell gap, or right of the last
    /// column are misses, not errors.
    pub fn hit_test(&self, pos: (f32, f32)) -> Option<usize> {
        if self.columns == 0 {
            return None;
        }
        let x = pos.0 - self.padding;
        let y = pos.1 - self.padding;
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let stride = self.stride();
        let col = (x / stride) as usize;
        if col >= self.columns || x - col as f32 * stride > self.cell {
            return None;
        }
        let row = (y / stride) as usize;
        if y - row as f32 * stride > self.cell {
            return None;
        }
        Some(row * self.columns + col)
    }

    pub fn cell_min(&self, index: usize) -> (f32, f32) {
        let row = index / self.columns.max(1);
        let col = index % self.columns.max(1);
        (
            self.padding + col as f32 * self.stride(),
            self.padding + row as f32 * self.stride(),
        )
    }

    pub fn cell_center(&self, index: usize) -> (f32, f32) {
        let (x, y) = self.cell_min(index);
        (x + self.cell / 2.0, y + self.cell / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragIntent {
    Add,
    Remove,
}

/// Per-gesture record: the cell the drag started on, the direction derived
/// from it, and the cells already toggled this session (revisits are no-ops).
#[derive(Debug, Clone)]
struct DragSession {
    #[allow(dead_code)]
    anchor: AssetId,
    intent: DragIntent,
    processed: HashSet<AssetId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    OpenDetail(AssetId),
    SelectionChanged,
    FeedbackTick,
    ExitedSelectionMode,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    /// A touch is down and still a long-press candidate.
    Pressing { at: (f32, f32), since: Instant },
    Dragging,
}

/// Gesture state machine for grid multi-select.
///
/// Plain data and explicit transitions, driven by the host with raw pointer
/// positions every frame; no UI event-loop types leak in here. The asset
/// sequence is passed fresh on every call because filtering can change it
/// between touch events; a hit index is resolved against whatever sequence
/// is current at that instant.
///
/// "Armed" (selection mode active, no drag running) is not a stored state:
/// it holds exactly when `in_selection_mode()` and no touch is down.
pub struct SelectionSession {
    phase: Phase,
    explicit_mode: bool,
    selected: HashSet<AssetId>,
    drag: Option<DragSession>,
}

impl Default for SelectionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionSession {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            explicit_mode: false,
            selected: HashSet::new(),
            drag: None,
        }
    }

    pub fn selected(&self) -> &HashSet<AssetId> {
        &self.selected
    }

    pub fn selected_ids(&self) -> Vec<AssetId> {
        self.selected.iter().cloned().collect()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    pub fn in_selection_mode(&self) -> bool {
        self.explicit_mode || !self.selected.is_empty()
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == Phase::Dragging
    }

    /// Touch went down at `pos`. While armed this immediately opens a drag
    /// session on the pressed cell, with intent re-derived from that cell's
    /// current membership; otherwise it starts a long-press candidate.
    pub fn on_press(
        &mut self,
        pos: (f32, f32),
        now: Instant,
        geom: &GridGeometry,
        assets: &[AssetId],
    ) -> Vec<SelectionEvent> {
        if self.phase != Phase::Idle {
            return Vec::new();
        }

        if self.in_selection_mode() {
            let Some(id) = geom.hit_test(pos).and_then(|i| assets.get(i)) else {
                return Vec::new();
            };
            let id = id.clone();
            let intent = if self.selected.contains(&id) {
                DragIntent::Remove
            } else {
                DragIntent::Add
            };
            let mut processed = HashSet::new();
            processed.insert(id.clone());
            let events = self.apply_intent(intent, &id);
            self.drag = Some(DragSession { anchor: id, intent, processed });
            self.phase = Phase::Dragging;
            events
        } else {
            self.phase = Phase::Pressing { at: pos, since: now };
            Vec::new()
        }
    }

    /// Pointer is down and at `pos`. Call every frame while pressed; the
    /// long-press threshold fires from here.
    pub fn on_move(
        &mut self,
        pos: (f32, f32),
        now: Instant,
        geom: &GridGeometry,
        assets: &[AssetId],
    ) -> Vec<SelectionEvent> {
        match self.phase {
            Phase::Idle => Vec::new(),
            Phase::Pressing { at, since } => {
                if dist(pos, at) > JITTER_RADIUS {
                    // Moved too far too soon: this is a scroll, not a hold.
                    self.phase = Phase::Idle;
                    return Vec::new();
                }
                if now.duration_since(since) < LONG_PRESS {
                    return Vec::new();
                }
                // Long-press fired: arm selection mode on the pressed cell.
                match geom.hit_test(at).and_then(|i| assets.get(i)) {
                    Some(id) => {
                        let id = id.clone();
                        let mut events = vec![SelectionEvent::FeedbackTick];
                        if self.selected.insert(id.clone()) {
                            events.push(SelectionEvent::SelectionChanged);
                        }
                        let mut processed = HashSet::new();
                        processed.insert(id.clone());
                        self.drag = Some(DragSession {
                            anchor: id,
                            intent: DragIntent::Add,
                            processed,
                        });
                        self.phase = Phase::Dragging;
                        events
                    }
                    None => {
                        // Held on empty space: nothing to arm.
                        self.phase = Phase::Idle;
                        Vec::new()
                    }
                }
            }
            Phase::Dragging => {
                let Some(id) = geom.hit_test(pos).and_then(|i| assets.get(i)) else {
                    return Vec::new();
                };
                let id = id.clone();
                let Some(drag) = &mut self.drag else {
                    return Vec::new();
                };
                if drag.processed.contains(&id) {
                    return Vec::new();
                }
                drag.processed.insert(id.clone());
                let intent = drag.intent;
                self.apply_intent(intent, &id)
            }
        }
    }

    /// Touch lifted. A short still press resolves as a tap.
    pub fn on_release(
        &mut self,
        geom: &GridGeometry,
        assets: &[AssetId],
    ) -> Vec<SelectionEvent> {
        match self.phase {
            Phase::Idle => Vec::new(),
            Phase::Pressing { at, .. } => {
                self.phase = Phase::Idle;
                // Only reachable outside selection mode, so a tap opens the
                // detail view for the tapped cell.
                match geom.hit_test(at).and_then(|i| assets.get(i)) {
                    Some(id) => vec![SelectionEvent::OpenDetail(id.clone())],
                    None => Vec::new(),
                }
            }
            Phase::Dragging => {
                self.drag = None;
                self.phase = Phase::Idle;
                if !self.in_selection_mode() {
                    vec![SelectionEvent::ExitedSelectionMode]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Host-initiated cancel: clears everything and leaves selection mode,
    /// regardless of current state.
    pub fn cancel(&mut self) -> Vec<SelectionEvent> {
        let had_selection = !self.selected.is_empty();
        let was_active = self.in_selection_mode();
        self.selected.clear();
        self.drag = None;
        self.phase = Phase::Idle;
        self.explicit_mode = false;
        let mut events = Vec::new();
        if had_selection {
            events.push(SelectionEvent::SelectionChanged);
        }
        if was_active {
            events.push(SelectionEvent::ExitedSelectionMode);
        }
        events
    }

    /// Toggle explicit selection mode (the host's "Select" button). While
    /// on, taps toggle membership and releases never auto-exit.
    pub fn set_explicit_mode(&mut self, on: bool) -> Vec<SelectionEvent> {
        self.explicit_mode = on;
        if !on && self.selected.is_empty() {
            vec![SelectionEvent::ExitedSelectionMode]
        } else {
            Vec::new()
        }
    }

    /// Drop selected ids that no longer exist (e.g. after deletion).
    pub fn retain_existing(&mut self, existing: &HashSet<AssetId>) -> Vec<SelectionEvent> {
        let before = self.selected.len();
        self.selected.retain(|id| existing.contains(id));
        let mut events = Vec::new();
        if self.selected.len() != before {
            events.push(SelectionEvent::SelectionChanged);
        }
        if before > 0 && self.selected.is_empty() && !self.explicit_mode {
            events.push(SelectionEvent::ExitedSelectionMode);
        }
        events
    }

    fn apply_intent(&mut self, intent: DragIntent, id: &AssetId) -> Vec<SelectionEvent> {
        let changed = match intent {
            DragIntent::Add => self.selected.insert(id.clone()),
            DragIntent::Remove => self.selected.remove(id),
        };
        if changed {
            vec![SelectionEvent::SelectionChanged, SelectionEvent::FeedbackTick]
        } else {
            Vec::new()
        }
    }
}

fn dist(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom() -> GridGeometry {
        GridGeometry { cell: 100.0, spacing: 10.0, padding: 5.0, columns: 4 }
    }

    fn assets(n: usize) -> Vec<AssetId> {
        (0..n).map(|i| format!("asset-{i}")).collect()
    }

    fn hold_until_armed(
        s: &mut SelectionSession,
        idx: usize,
        t0: Instant,
        g: &GridGeometry,
        a: &[AssetId],
    ) -> Vec<SelectionEvent> {
        let pos = g.cell_center(idx);
        let mut events = s.on_press(pos, t0, g, a);
        events.extend(s.on_move(pos, t0 + LONG_PRESS + Duration::from_millis(10), g, a));
        events
    }

    #[test]
    fn test_hit_test_geometry() {
        let g = geom();
        // Center of cell (0,0)
        assert_eq!(g.hit_test((55.0, 55.0)), Some(0));
        // Second column, first row
        assert_eq!(g.hit_test(g.cell_center(1)), Some(1));
        // Second row wraps by column count
        assert_eq!(g.hit_test(g.cell_center(4)), Some(4));
        // Inside the padding strip
        assert_eq!(g.hit_test((2.0, 50.0)), None);
        // Negative after padding subtraction
        assert_eq!(g.hit_test((-20.0, 50.0)), None);
        // In the gap between columns 0 and 1
        assert_eq!(g.hit_test((5.0 + 105.0, 55.0)), None);
        // Right of the last column
        let past_last = 5.0 + 4.0 * 110.0 + 50.0;
        assert_eq!(g.hit_test((past_last, 55.0)), None);
    }

    #[test]
    fn test_tap_opens_detail() {
        let g = geom();
        let a = assets(8);
        let mut s = SelectionSession::new();
        let t0 = Instant::now();

        let pos = g.cell_center(3);
        assert!(s.on_press(pos, t0, &g, &a).is_empty());
        // Released before the long-press threshold
        let events = s.on_release(&g, &a);
        assert_eq!(events, vec![SelectionEvent::OpenDetail("asset-3".to_string())]);
        assert!(s.selected().is_empty());
        assert!(!s.in_selection_mode());
    }

    #[test]
    fn test_long_press_arms_and_selects_anchor() {
        let g = geom();
        let a = assets(8);
        let mut s = SelectionSession::new();
        let t0 = Instant::now();

        let events = hold_until_armed(&mut s, 2, t0, &g, &a);
        assert!(events.contains(&SelectionEvent::FeedbackTick));
        assert!(events.contains(&SelectionEvent::SelectionChanged));
        assert!(s.is_dragging());
        assert!(s.is_selected("asset-2"));

        s.on_release(&g, &a);
        assert!(!s.is_dragging());
        assert!(s.in_selection_mode(), "non-empty set keeps selection mode armed");
    }

    #[test]
    fn test_jitter_cedes_to_scroll() {
        let g = geom();
        let a = assets(8);
        let mut s = SelectionSession::new();
        let t0 = Instant::now();

        let pos = g.cell_center(2);
        s.on_press(pos, t0, &g, &a);
        // Big movement before the threshold: this is a scroll fling
        s.on_move((pos.0, pos.1 + 40.0), t0 + Duration::from_millis(100), &g, &a);
        assert!(!s.is_dragging());
        // Even holding past the threshold now does nothing
        let events = s.on_move((pos.0, pos.1 + 40.0), t0 + LONG_PRESS * 2, &g, &a);
        assert!(events.is_empty());
        assert!(s.on_release(&g, &a).is_empty());
    }

    #[test]
    fn test_drag_across_cells_with_revisits() {
        // Drag path 5,6,7,6,5 from unselected 5 must end with {5,6,7}
        let g = geom();
        let a = assets(20);
        let mut s = SelectionSession::new();
        let t0 = Instant::now();

        hold_until_armed(&mut s, 5, t0, &g, &a);
        let t = t0 + LONG_PRESS + Duration::from_millis(50);
        let mut toggles = 0;
        for idx in [6, 7, 6, 5] {
            let events = s.on_move(g.cell_center(idx), t, &g, &a);
            toggles += events
                .iter()
                .filter(|e| **e == SelectionEvent::SelectionChanged)
                .count();
        }
        // 6 and 7 toggled once each; revisits of 6 and 5 are no-ops
        assert_eq!(toggles, 2);
        let expected: HashSet<AssetId> =
            ["asset-5", "asset-6", "asset-7"].iter().map(|s| s.to_string()).collect();
        assert_eq!(*s.selected(), expected);
    }

    #[test]
    fn test_add_intent_leaves_preselected_untouched() {
        let g = geom();
        let a = assets(20);
        let mut s = SelectionSession::new();
        let t0 = Instant::now();

        // Pre-select 6 via a first gesture
        hold_until_armed(&mut s, 6, t0, &g, &a);
        s.on_release(&g, &a);

        // New press on unselected 5 derives Add intent
        let t1 = t0 + Duration::from_secs(2);
        s.on_press(g.cell_center(5), t1, &g, &a);
        assert!(s.is_dragging());
        for idx in [6, 7] {
            s.on_move(g.cell_center(idx), t1, &g, &a);
        }
        // 6 was already selected: visited but untouched
        assert!(s.is_selected("asset-5"));
        assert!(s.is_selected("asset-6"));
        assert!(s.is_selected("asset-7"));
        assert_eq!(s.count(), 3);
    }

    #[test]
    fn test_remove_intent_symmetric() {
        let g = geom();
        let a = assets(20);
        let mut s = SelectionSession::new();
        let t0 = Instant::now();

        hold_until_armed(&mut s, 5, t0, &g, &a);
        let t = t0 + LONG_PRESS + Duration::from_millis(50);
        for idx in [6, 7, 8] {
            s.on_move(g.cell_center(idx), t, &g, &a);
        }
        s.on_release(&g, &a);
        assert_eq!(s.count(), 4);

        // New press on selected 6 derives Remove intent
        let t1 = t0 + Duration::from_secs(2);
        s.on_press(g.cell_center(6), t1, &g, &a);
        s.on_move(g.cell_center(7), t1, &g, &a);
        s.on_release(&g, &a);

        assert!(!s.is_selected("asset-6"));
        assert!(!s.is_selected("asset-7"));
        assert!(s.is_selected("asset-5"));
        assert!(s.is_selected("asset-8"));
    }

    #[test]
    fn test_emptying_removal_exits_selection_mode() {
        let g = geom();
        let a = assets(8);
        let mut s = SelectionSession::new();
        let t0 = Instant::now();

        hold_until_armed(&mut s, 1, t0, &g, &a);
        s.on_release(&g, &a);
        assert!(s.in_selection_mode());

        // Tap the only selected cell: Remove intent empties the set
        let t1 = t0 + Duration::from_secs(2);
        s.on_press(g.cell_center(1), t1, &g, &a);
        let events = s.on_release(&g, &a);
        assert!(s.selected().is_empty());
        assert!(events.contains(&SelectionEvent::ExitedSelectionMode));
        assert!(!s.in_selection_mode());
    }

    #[test]
    fn test_explicit_mode_tap_toggles_and_survives_empty() {
        let g = geom();
        let a = assets(8);
        let mut s = SelectionSession::new();
        let t0 = Instant::now();

        s.set_explicit_mode(true);
        assert!(s.in_selection_mode());

        // Tap toggles membership directly, no long press needed
        s.on_press(g.cell_center(0), t0, &g, &a);
        let events = s.on_release(&g, &a);
        assert!(s.is_selected("asset-0"));
        assert!(!events.contains(&SelectionEvent::ExitedSelectionMode));

        // Toggle it back off: still in explicit mode
        s.on_press(g.cell_center(0), t0, &g, &a);
        s.on_release(&g, &a);
        assert!(s.selected().is_empty());
        assert!(s.in_selection_mode());

        let events = s.set_explicit_mode(false);
        assert!(events.contains(&SelectionEvent::ExitedSelectionMode));
    }

    #[test]
    fn test_filter_shrink_mid_drag_is_harmless() {
        let g = geom();
        let full = assets(20);
        let mut s = SelectionSession::new();
        let t0 = Instant::now();

        hold_until_armed(&mut s, 5, t0, &g, &full);
        let t = t0 + LONG_PRESS + Duration::from_millis(50);

        // Sequence shrinks below the anchor's index mid-drag
        let shrunk = assets(3);
        // Cell 10 is out of range for the new sequence: silent miss
        assert!(s.on_move(g.cell_center(10), t, &g, &shrunk).is_empty());
        assert!(s.is_dragging(), "session survives the shrink");
        // Cells still in range keep toggling against the fresh sequence
        s.on_move(g.cell_center(2), t, &g, &shrunk);
        assert!(s.is_selected("asset-2"));
    }

    #[test]
    fn test_cancel_from_any_state() {
        let g = geom();
        let a = assets(8);
        let mut s = SelectionSession::new();
        let t0 = Instant::now();

        hold_until_armed(&mut s, 1, t0, &g, &a);
        let events = s.cancel();
        assert!(events.contains(&SelectionEvent::ExitedSelectionMode));
        assert!(s.selected().is_empty());
        assert!(!s.is_dragging());
        assert!(!s.in_selection_mode());
    }

    #[test]
    fn test_retain_existing_after_deletion() {
        let g = geom();
        let a = assets(8);
        let mut s = SelectionSession::new();
        let t0 = Instant::now();

        hold_until_armed(&mut s, 0, t0, &g, &a);
        let t = t0 + LONG_PRESS + Duration::from_millis(50);
        s.on_move(g.cell_center(1), t, &g, &a);
        s.on_release(&g, &a);
        assert_eq!(s.count(), 2);

        let existing: HashSet<AssetId> = ["asset-1"].iter().map(|s| s.to_string()).collect();
        s.retain_existing(&existing);
        assert_eq!(s.count(), 1);
        assert!(s.is_selected("asset-1"));

        let events = s.retain_existing(&HashSet::new());
        assert!(events.contains(&SelectionEvent::ExitedSelectionMode));
    }
}
