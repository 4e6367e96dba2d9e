//! Local tracking of the 5-4-3-2-1 grounding sequence
//!
//! The model decides what to say at each step; this module only follows
//! along so the page can show progress and the logs can tell where a
//! session stopped. It is a pure transition function in the same shape as
//! the rest of the turn handling: given the current step and what just
//! happened, produce the next step.

use serde::Serialize;

/// Position in the grounding exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundingStep {
    /// The assistant has not spoken yet
    #[default]
    NotStarted,
    /// STEP 0: greeting and a deep breath
    Greeting,
    /// STEP 1: five things you can see
    Sight,
    /// STEP 2: four things you can touch
    Touch,
    /// STEP 3: three things you can hear
    Hearing,
    /// STEP 4: two things you can smell
    Smell,
    /// STEP 5: one thing you can taste
    Taste,
    /// FINE: how do you feel now
    Fine,
}

/// What happened in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// The user wrote something
    UserTurn,
    /// The assistant replied; `answered` is true when the previous turn was
    /// the user's, i.e. the pending question has been answered.
    AssistantTurn { answered: bool },
}

impl GroundingStep {
    pub const ALL: [GroundingStep; 8] = [
        GroundingStep::NotStarted,
        GroundingStep::Greeting,
        GroundingStep::Sight,
        GroundingStep::Touch,
        GroundingStep::Hearing,
        GroundingStep::Smell,
        GroundingStep::Taste,
        GroundingStep::Fine,
    ];

    /// The step after this one; `Fine` is terminal
    pub fn next(self) -> Self {
        match self {
            GroundingStep::NotStarted => GroundingStep::Greeting,
            GroundingStep::Greeting => GroundingStep::Sight,
            GroundingStep::Sight => GroundingStep::Touch,
            GroundingStep::Touch => GroundingStep::Hearing,
            GroundingStep::Hearing => GroundingStep::Smell,
            GroundingStep::Smell => GroundingStep::Taste,
            GroundingStep::Taste | GroundingStep::Fine => GroundingStep::Fine,
        }
    }

    /// Label used in the system prompt (`STEP 0` .. `STEP 5`, `FINE`)
    pub fn label(self) -> Option<&'static str> {
        match self {
            GroundingStep::NotStarted => None,
            GroundingStep::Greeting => Some("STEP 0"),
            GroundingStep::Sight => Some("STEP 1"),
            GroundingStep::Touch => Some("STEP 2"),
            GroundingStep::Hearing => Some("STEP 3"),
            GroundingStep::Smell => Some("STEP 4"),
            GroundingStep::Taste => Some("STEP 5"),
            GroundingStep::Fine => Some("FINE"),
        }
    }

    /// How many things the user is asked to name at this step
    pub fn things_to_name(self) -> Option<u8> {
        match self {
            GroundingStep::Sight => Some(5),
            GroundingStep::Touch => Some(4),
            GroundingStep::Hearing => Some(3),
            GroundingStep::Smell => Some(2),
            GroundingStep::Taste => Some(1),
            _ => None,
        }
    }

    pub fn is_complete(self) -> bool {
        self == GroundingStep::Fine
    }
}

/// Pure transition function.
///
/// The first assistant turn is always the greeting. After that, a step is
/// left only when the assistant speaks right after the user answered; two
/// assistant turns in a row, or any user turn, leave the step unchanged.
pub fn transition(step: GroundingStep, event: TurnEvent) -> GroundingStep {
    match (step, event) {
        (_, TurnEvent::UserTurn) => step,
        (GroundingStep::NotStarted, TurnEvent::AssistantTurn { .. }) => GroundingStep::Greeting,
        (_, TurnEvent::AssistantTurn { answered: true }) => step.next(),
        (_, TurnEvent::AssistantTurn { answered: false }) => step,
    }
}
