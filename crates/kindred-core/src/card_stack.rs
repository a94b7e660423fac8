use crate::profile::Profile;
use crate::profile::ProfileId;
use crate::swipe::SwipeDirection;

pub const PREVIEW_DEPTH: usize = 2;
const LAYER_SCALE_STEP: f64 = 0.05;
const LAYER_OFFSET_STEP: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPhase {
    Idle(usize),
    Exiting {
        index: usize,
        direction: SwipeDirection,
    },
    Finished,
}

impl StackPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle(_) => "idle",
            Self::Exiting { .. } => "exiting",
            Self::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Swipe right: whisper to the candidate.
    Accept,
    /// Swipe left: skip without side effects.
    Ignore,
}

impl From<SwipeDirection> for OutcomeKind {
    fn from(direction: SwipeDirection) -> Self {
        match direction {
            SwipeDirection::Right => Self::Accept,
            SwipeDirection::Left => Self::Ignore,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwipeOutcome {
    pub index: usize,
    pub direction: SwipeDirection,
    pub kind: OutcomeKind,
    pub profile: Profile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardLayer<'a> {
    pub depth: usize,
    pub scale: f64,
    pub offset_y: f64,
    pub profile: &'a Profile,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StackError {
    #[error("card {index} is still leaving the stack")]
    ExitInProgress { index: usize },
    #[error("the stack has no cards left")]
    Exhausted,
}

/// One-at-a-time presentation of candidate profiles.
///
/// A commit moves the top card into `Exiting` and hands the outcome back
/// immediately; the owner calls [`CardStack::finish_exit`] once the exit
/// timer elapses.
#[derive(Debug, Clone)]
pub struct CardStack {
    profiles: Vec<Profile>,
    phase: StackPhase,
    expanded: bool,
    exhausted_notified: bool,
}

impl CardStack {
    pub fn new(profiles: Vec<Profile>) -> Self {
        Self {
            profiles,
            phase: StackPhase::Idle(0),
            expanded: false,
            exhausted_notified: false,
        }
    }

    pub fn phase(&self) -> StackPhase {
        self.phase
    }

    pub fn index(&self) -> usize {
        match self.phase {
            StackPhase::Idle(index) | StackPhase::Exiting { index, .. } => index,
            StackPhase::Finished => self.profiles.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn current(&self) -> Option<&Profile> {
        match self.phase {
            StackPhase::Idle(index) | StackPhase::Exiting { index, .. } => {
                self.profiles.get(index)
            }
            StackPhase::Finished => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase == StackPhase::Finished
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn toggle_expanded(&mut self) -> bool {
        if matches!(self.phase, StackPhase::Idle(_)) && self.current().is_some() {
            self.expanded = !self.expanded;
        }
        self.expanded
    }

    /// The top card plus up to [`PREVIEW_DEPTH`] cards behind it.
    pub fn layers(&self) -> Vec<CardLayer<'_>> {
        let start = self.index();
        self.profiles
            .iter()
            .skip(start)
            .take(PREVIEW_DEPTH + 1)
            .enumerate()
            .map(|(depth, profile)| CardLayer {
                depth,
                scale: 1.0 - LAYER_SCALE_STEP * depth as f64,
                offset_y: LAYER_OFFSET_STEP * depth as f64,
                profile,
            })
            .collect()
    }

    pub fn commit(&mut self, direction: SwipeDirection) -> Result<SwipeOutcome, StackError> {
        let index = match self.phase {
            StackPhase::Idle(index) => index,
            StackPhase::Exiting { index, .. } => return Err(StackError::ExitInProgress { index }),
            StackPhase::Finished => return Err(StackError::Exhausted),
        };
        let profile = self.profiles.get(index).ok_or(StackError::Exhausted)?.clone();
        self.phase = StackPhase::Exiting { index, direction };
        Ok(SwipeOutcome {
            index,
            direction,
            kind: direction.into(),
            profile,
        })
    }

    /// Completes a pending exit. Returns false when nothing was exiting.
    pub fn finish_exit(&mut self) -> bool {
        let StackPhase::Exiting { index, .. } = self.phase else {
            return false;
        };
        self.phase = StackPhase::Idle(index + 1);
        self.expanded = false;
        true
    }

    /// True exactly once, the first time the stack is observed past its
    /// last card.
    pub fn poll_exhausted(&mut self) -> bool {
        match self.phase {
            StackPhase::Idle(index) if index >= self.profiles.len() => {
                self.phase = StackPhase::Finished;
            }
            StackPhase::Finished => {}
            _ => return false,
        }
        if self.exhausted_notified {
            return false;
        }
        self.exhausted_notified = true;
        true
    }

    pub fn set_receives_left(&mut self, id: &ProfileId, receives_left: u32) {
        if let Some(profile) = self.profiles.iter_mut().find(|p| &p.id == id) {
            profile.receives_left = receives_left;
        }
    }
}
