use std::time::{Duration, Instant};

/// Quiet period after the last raw scroll update before the strip is
/// considered settled.
pub const SETTLE_QUIET: Duration = Duration::from_millis(200);

/// Duration of the corrective snap-to-center animation. The programmatic
/// motion flag stays up for exactly this long.
pub const SNAP_ANIM: Duration = Duration::from_millis(250);

/// Horizontal geometry of a filmstrip: square item side, inter-item
/// spacing, and the viewport width the strip is centered in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripGeometry {
    pub item: f32,
    pub spacing: f32,
    pub viewport: f32,
}

impl StripGeometry {
    pub fn stride(&self) -> f32 {
        self.item + self.spacing
    }

    /// Leading/trailing content padding that puts item 0 dead center at
    /// scroll offset 0.
    pub fn edge_padding(&self) -> f32 {
        ((self.viewport - self.item) / 2.0).max(0.0)
    }

    /// Scroll offset at which `index` is centered.
    pub fn offset_for(&self, index: usize) -> f32 {
        index as f32 * self.stride()
    }

    /// Nearest centered index for a scroll offset, clamped to `[0, len)`.
    /// Rounding is half-up in both directions of travel: an offset exactly
    /// between two items resolves to the higher index.
    pub fn index_for_offset(&self, offset: f32, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let raw = offset / self.stride();
        let idx = (raw + 0.5).floor();
        if idx <= 0.0 { 0 } else { (idx as usize).min(len - 1) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StripEvent {
    IndexChanged(usize),
    FeedbackTick,
}

/// Instruction back to the host view layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StripCommand {
    AnimateTo { index: usize, offset: f32 },
}

/// Keeps one authoritative current index consistent between user-driven
/// continuous scrolling and programmatic index changes, without the two
/// feedback paths fighting each other.
///
/// Two independent flags: programmatic motion in flight (a deadline; raw
/// scroll updates are ignored wholesale while it is pending, which is what
/// stops the synchronizer reacting to its own corrective animation) and
/// user-scrolling (raw updates seen, not yet settled). Timers are
/// single-shot deadlines polled by the host each frame.
pub struct IndexSynchronizer {
    current: usize,
    user_scrolling: bool,
    settle_deadline: Option<Instant>,
    programmatic_until: Option<Instant>,
}

impl IndexSynchronizer {
    pub fn new(index: usize) -> Self {
        Self {
            current: index,
            user_scrolling: false,
            settle_deadline: None,
            programmatic_until: None,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn is_user_scrolling(&self) -> bool {
        self.user_scrolling
    }

    /// True while a settle timer is armed; the host keeps repainting so the
    /// deadline is observed promptly.
    pub fn settle_pending(&self) -> bool {
        self.settle_deadline.is_some()
    }

    pub fn is_programmatic_in_flight(&self, now: Instant) -> bool {
        self.programmatic_until.is_some_and(|until| now < until)
    }

    /// Raw scroll-position update from the view. Ignored entirely while a
    /// programmatic animation is in flight.
    pub fn on_scroll(
        &mut self,
        offset: f32,
        len: usize,
        geom: &StripGeometry,
        now: Instant,
    ) -> Vec<StripEvent> {
        if len == 0 || self.is_programmatic_in_flight(now) {
            return Vec::new();
        }
        self.user_scrolling = true;
        self.settle_deadline = Some(now + SETTLE_QUIET);

        let index = geom.index_for_offset(offset, len);
        if index != self.current {
            self.current = index;
            vec![StripEvent::IndexChanged(index), StripEvent::FeedbackTick]
        } else {
            Vec::new()
        }
    }

    /// Frame tick: fires the settle snap once the quiet period elapses with
    /// no further updates.
    pub fn tick(&mut self, geom: &StripGeometry, now: Instant) -> Option<StripCommand> {
        let deadline = self.settle_deadline?;
        if now < deadline {
            return None;
        }
        self.settle_deadline = None;
        if !self.user_scrolling {
            return None;
        }
        self.user_scrolling = false;
        self.programmatic_until = Some(now + SNAP_ANIM);
        Some(StripCommand::AnimateTo {
            index: self.current,
            offset: geom.offset_for(self.current),
        })
    }

    /// Host-driven jump (filmstrip tap, detail-view swipe, keyboard). Only
    /// actioned when the target differs from the last known index; uses the
    /// same in-flight discipline as the settle snap so the two can never
    /// animate simultaneously.
    pub fn request_index(
        &mut self,
        index: usize,
        len: usize,
        geom: &StripGeometry,
        now: Instant,
    ) -> Option<StripCommand> {
        if len == 0 {
            return None;
        }
        let index = index.min(len - 1);
        if index == self.current {
            return None;
        }
        self.current = index;
        self.user_scrolling = false;
        self.settle_deadline = None;
        self.programmatic_until = Some(now + SNAP_ANIM);
        Some(StripCommand::AnimateTo {
            index,
            offset: geom.offset_for(index),
        })
    }

    /// A new touch landed on the strip. Cancels any pending settle and
    /// cedes control to the user; a stale programmatic deadline is left to
    /// lapse on its own without re-triggering a snap, since the new touch
    /// will produce its own updates and its own settle cycle.
    pub fn on_touch_down(&mut self) {
        self.settle_deadline = None;
        self.user_scrolling = true;
    }

    /// Clamp after the filtered sequence changed length.
    pub fn sync_len(&mut self, len: usize) {
        if len > 0 && self.current >= len {
            self.current = len - 1;
        }
    }
}
