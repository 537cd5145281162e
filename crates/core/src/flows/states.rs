use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::appointment::{Slot, SlotTime};
use crate::domain::catalog::{CoffeeKind, CoffeeOrder, CupSize, Procedure, Sugar};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    ProcedureBooking,
    CoffeeOrder,
    AdminContact,
}

/// Current step of one user's dialog together with the selections made so far.
///
/// Each variant carries exactly the selections earlier steps must have
/// produced, so a later step can never observe a half-built draft.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogState {
    #[default]
    Idle,
    AwaitingProcedureSelection,
    AwaitingDateSelection {
        procedure: Procedure,
    },
    AwaitingTimeSelection {
        procedure: Procedure,
        date: NaiveDate,
    },
    WaitingForQuestion,
    AwaitingCoffeeType,
    AwaitingCoffeeSize {
        kind: CoffeeKind,
    },
    AwaitingSugar {
        kind: CoffeeKind,
        size: CupSize,
    },
}

impl DialogState {
    pub fn step(&self) -> StepKind {
        match self {
            Self::Idle => StepKind::Idle,
            Self::AwaitingProcedureSelection => StepKind::AwaitingProcedureSelection,
            Self::AwaitingDateSelection { .. } => StepKind::AwaitingDateSelection,
            Self::AwaitingTimeSelection { .. } => StepKind::AwaitingTimeSelection,
            Self::WaitingForQuestion => StepKind::WaitingForQuestion,
            Self::AwaitingCoffeeType => StepKind::AwaitingCoffeeType,
            Self::AwaitingCoffeeSize { .. } => StepKind::AwaitingCoffeeSize,
            Self::AwaitingSugar { .. } => StepKind::AwaitingSugar,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Payload-free tag of a [`DialogState`], used in errors and log fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    Idle,
    AwaitingProcedureSelection,
    AwaitingDateSelection,
    AwaitingTimeSelection,
    WaitingForQuestion,
    AwaitingCoffeeType,
    AwaitingCoffeeSize,
    AwaitingSugar,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingProcedureSelection => "awaiting_procedure_selection",
            Self::AwaitingDateSelection => "awaiting_date_selection",
            Self::AwaitingTimeSelection => "awaiting_time_selection",
            Self::WaitingForQuestion => "waiting_for_question",
            Self::AwaitingCoffeeType => "awaiting_coffee_type",
            Self::AwaitingCoffeeSize => "awaiting_coffee_size",
            Self::AwaitingSugar => "awaiting_sugar",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    BookingRequested,
    ProcedureChosen(Procedure),
    DateChosen(NaiveDate),
    TimeChosen(SlotTime),
    CoffeeRequested,
    CoffeeChosen(CoffeeKind),
    SizeChosen(CupSize),
    SugarChosen(Sugar),
    QuestionRequested,
    QuestionSubmitted(String),
}

impl FlowEvent {
    pub fn flow_type(&self) -> FlowType {
        match self {
            Self::BookingRequested
            | Self::ProcedureChosen(_)
            | Self::DateChosen(_)
            | Self::TimeChosen(_) => FlowType::ProcedureBooking,
            Self::CoffeeRequested
            | Self::CoffeeChosen(_)
            | Self::SizeChosen(_)
            | Self::SugarChosen(_) => FlowType::CoffeeOrder,
            Self::QuestionRequested | Self::QuestionSubmitted(_) => FlowType::AdminContact,
        }
    }
}

/// Side effects the dialog controller must carry out for a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    PromptProcedure,
    ConfirmProcedure(Procedure),
    PromptDate,
    ConfirmDate(NaiveDate),
    PromptTime { procedure: Procedure, date: NaiveDate },
    ReserveSlot(Slot),
    PromptCoffeeType,
    ConfirmCoffeeType(CoffeeKind),
    PromptCupSize,
    ConfirmCupSize(CupSize),
    PromptSugar,
    PlaceCoffeeOrder(CoffeeOrder),
    ScheduleFollowUp,
    PromptQuestion,
    ForwardQuestion(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: DialogState,
    pub to: DialogState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}
