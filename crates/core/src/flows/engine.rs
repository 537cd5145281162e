use thiserror::Error;

use crate::domain::appointment::Slot;
use crate::domain::catalog::CoffeeOrder;
use crate::flows::states::{DialogState, FlowAction, FlowEvent, FlowType, StepKind, TransitionOutcome};

pub trait FlowDefinition {
    fn flow_type(&self) -> FlowType;
    fn initial_state(&self) -> DialogState;
    fn transition(
        &self,
        current: &DialogState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct ProcedureBookingFlow;

impl FlowDefinition for ProcedureBookingFlow {
    fn flow_type(&self) -> FlowType {
        FlowType::ProcedureBooking
    }

    fn initial_state(&self) -> DialogState {
        DialogState::AwaitingProcedureSelection
    }

    fn transition(
        &self,
        current: &DialogState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_booking(current, event)
    }
}

#[derive(Clone, Debug, Default)]
pub struct CoffeeOrderFlow;

impl FlowDefinition for CoffeeOrderFlow {
    fn flow_type(&self) -> FlowType {
        FlowType::CoffeeOrder
    }

    fn initial_state(&self) -> DialogState {
        DialogState::AwaitingCoffeeType
    }

    fn transition(
        &self,
        current: &DialogState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_coffee(current, event)
    }
}

#[derive(Clone, Debug, Default)]
pub struct AdminContactFlow;

impl FlowDefinition for AdminContactFlow {
    fn flow_type(&self) -> FlowType {
        FlowType::AdminContact
    }

    fn initial_state(&self) -> DialogState {
        DialogState::WaitingForQuestion
    }

    fn transition(
        &self,
        current: &DialogState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_admin_contact(current, event)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow.flow_type()
    }

    pub fn initial_state(&self) -> DialogState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &DialogState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        if event.flow_type() != self.flow.flow_type() {
            return Err(FlowTransitionError::InvalidTransition {
                step: current.step(),
                event: event.clone(),
            });
        }
        self.flow.transition(current, event)
    }
}

/// The three dialog flows behind one entry point that routes each event to
/// the flow it belongs to.
pub struct DialogFlows {
    booking: FlowEngine<ProcedureBookingFlow>,
    coffee: FlowEngine<CoffeeOrderFlow>,
    admin_contact: FlowEngine<AdminContactFlow>,
}

impl Default for DialogFlows {
    fn default() -> Self {
        Self {
            booking: FlowEngine::new(ProcedureBookingFlow),
            coffee: FlowEngine::new(CoffeeOrderFlow),
            admin_contact: FlowEngine::new(AdminContactFlow),
        }
    }
}

impl DialogFlows {
    pub fn apply(
        &self,
        current: &DialogState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        match event.flow_type() {
            FlowType::ProcedureBooking => self.booking.apply(current, event),
            FlowType::CoffeeOrder => self.coffee.apply(current, event),
            FlowType::AdminContact => self.admin_contact.apply(current, event),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("{event:?} arrived at step {step:?} without a prior {missing} selection")]
    MissingSelection { step: StepKind, event: FlowEvent, missing: &'static str },
    #[error("invalid transition from {step:?} using event {event:?}")]
    InvalidTransition { step: StepKind, event: FlowEvent },
}

fn transition_booking(
    current: &DialogState,
    event: &FlowEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use DialogState::{AwaitingDateSelection, AwaitingProcedureSelection, AwaitingTimeSelection, Idle};
    use FlowAction::{ConfirmDate, ConfirmProcedure, PromptDate, PromptProcedure, PromptTime, ReserveSlot};

    let (to, actions) = match (current, event) {
        (_, FlowEvent::BookingRequested) => (AwaitingProcedureSelection, vec![PromptProcedure]),
        // The procedure is the first selection, so a stale procedure button restarts the flow.
        (_, FlowEvent::ProcedureChosen(procedure)) => (
            AwaitingDateSelection { procedure: *procedure },
            vec![ConfirmProcedure(*procedure), PromptDate],
        ),
        (AwaitingDateSelection { procedure }, FlowEvent::DateChosen(date))
        | (AwaitingTimeSelection { procedure, .. }, FlowEvent::DateChosen(date)) => (
            AwaitingTimeSelection { procedure: *procedure, date: *date },
            vec![ConfirmDate(*date), PromptTime { procedure: *procedure, date: *date }],
        ),
        (_, FlowEvent::DateChosen(_)) => {
            return Err(missing(current, event, "procedure"));
        }
        (AwaitingTimeSelection { procedure, date }, FlowEvent::TimeChosen(time)) => (
            Idle,
            vec![ReserveSlot(Slot { procedure: *procedure, date: *date, time: *time })],
        ),
        (AwaitingDateSelection { .. }, FlowEvent::TimeChosen(_)) => {
            return Err(missing(current, event, "date"));
        }
        (_, FlowEvent::TimeChosen(_)) => {
            return Err(missing(current, event, "procedure"));
        }
        _ => return Err(invalid(current, event)),
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
}

fn transition_coffee(
    current: &DialogState,
    event: &FlowEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use DialogState::{AwaitingCoffeeSize, AwaitingCoffeeType, AwaitingSugar, Idle};
    use FlowAction::{
        ConfirmCoffeeType, ConfirmCupSize, PlaceCoffeeOrder, PromptCoffeeType, PromptCupSize,
        PromptSugar, ScheduleFollowUp,
    };

    let (to, actions) = match (current, event) {
        (_, FlowEvent::CoffeeRequested) => (AwaitingCoffeeType, vec![PromptCoffeeType]),
        (_, FlowEvent::CoffeeChosen(kind)) => {
            (AwaitingCoffeeSize { kind: *kind }, vec![ConfirmCoffeeType(*kind), PromptCupSize])
        }
        (AwaitingCoffeeSize { kind }, FlowEvent::SizeChosen(size))
        | (AwaitingSugar { kind, .. }, FlowEvent::SizeChosen(size)) => (
            AwaitingSugar { kind: *kind, size: *size },
            vec![ConfirmCupSize(*size), PromptSugar],
        ),
        (_, FlowEvent::SizeChosen(_)) => {
            return Err(missing(current, event, "coffee type"));
        }
        (AwaitingSugar { kind, size }, FlowEvent::SugarChosen(sugar)) => (
            Idle,
            vec![
                PlaceCoffeeOrder(CoffeeOrder { kind: *kind, size: *size, sugar: *sugar }),
                ScheduleFollowUp,
            ],
        ),
        (AwaitingCoffeeSize { .. }, FlowEvent::SugarChosen(_)) => {
            return Err(missing(current, event, "coffee size"));
        }
        (_, FlowEvent::SugarChosen(_)) => {
            return Err(missing(current, event, "coffee type"));
        }
        _ => return Err(invalid(current, event)),
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
}

fn transition_admin_contact(
    current: &DialogState,
    event: &FlowEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    let (to, actions) = match (current, event) {
        (_, FlowEvent::QuestionRequested) => {
            (DialogState::WaitingForQuestion, vec![FlowAction::PromptQuestion])
        }
        (DialogState::WaitingForQuestion, FlowEvent::QuestionSubmitted(text)) => {
            (DialogState::Idle, vec![FlowAction::ForwardQuestion(text.clone())])
        }
        _ => return Err(invalid(current, event)),
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
}

fn missing(current: &DialogState, event: &FlowEvent, field: &'static str) -> FlowTransitionError {
    FlowTransitionError::MissingSelection { step: current.step(), event: event.clone(), missing: field }
}

fn invalid(current: &DialogState, event: &FlowEvent) -> FlowTransitionError {
    FlowTransitionError::InvalidTransition { step: current.step(), event: event.clone() }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::appointment::{Slot, SlotTime};
    use crate::domain::catalog::{CoffeeKind, CoffeeOrder, CupSize, Procedure, Sugar};
    use crate::flows::engine::{
        CoffeeOrderFlow, DialogFlows, FlowDefinition, FlowEngine, FlowTransitionError,
        ProcedureBookingFlow,
    };
    use crate::flows::states::{DialogState, FlowAction, FlowEvent, FlowType, StepKind};

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
    }

    fn ten_am() -> SlotTime {
        SlotTime::new(10, 0).expect("valid time")
    }

    #[test]
    fn booking_flow_happy_path_ends_with_reservation() {
        let engine = FlowEngine::new(ProcedureBookingFlow);
        let mut state = DialogState::Idle;

        state = engine.apply(&state, &FlowEvent::BookingRequested).expect("idle -> procedure").to;
        assert_eq!(state, engine.initial_state());

        state = engine
            .apply(&state, &FlowEvent::ProcedureChosen(Procedure::Massage))
            .expect("procedure -> date")
            .to;
        assert_eq!(state, DialogState::AwaitingDateSelection { procedure: Procedure::Massage });

        state = engine
            .apply(&state, &FlowEvent::DateChosen(june_first()))
            .expect("date -> time")
            .to;
        assert_eq!(state.step(), StepKind::AwaitingTimeSelection);

        let outcome =
            engine.apply(&state, &FlowEvent::TimeChosen(ten_am())).expect("time -> idle");
        assert_eq!(outcome.to, DialogState::Idle);
        assert_eq!(
            outcome.actions,
            vec![FlowAction::ReserveSlot(Slot {
                procedure: Procedure::Massage,
                date: june_first(),
                time: ten_am(),
            })]
        );
    }

    #[test]
    fn time_without_date_is_a_missing_selection() {
        let engine = FlowEngine::new(ProcedureBookingFlow);
        let error = engine
            .apply(
                &DialogState::AwaitingDateSelection { procedure: Procedure::Btl },
                &FlowEvent::TimeChosen(ten_am()),
            )
            .expect_err("date was never chosen");

        assert!(matches!(
            error,
            FlowTransitionError::MissingSelection {
                step: StepKind::AwaitingDateSelection,
                missing: "date",
                ..
            }
        ));
    }

    #[test]
    fn stale_time_callback_after_restart_is_rejected() {
        let engine = FlowEngine::new(ProcedureBookingFlow);
        let error = engine
            .apply(&DialogState::Idle, &FlowEvent::TimeChosen(ten_am()))
            .expect_err("no booking in progress");

        assert!(matches!(error, FlowTransitionError::MissingSelection { missing: "procedure", .. }));
    }

    #[test]
    fn date_can_be_changed_at_time_step() {
        let engine = FlowEngine::new(ProcedureBookingFlow);
        let next_day = NaiveDate::from_ymd_opt(2024, 6, 2).expect("valid date");
        let outcome = engine
            .apply(
                &DialogState::AwaitingTimeSelection {
                    procedure: Procedure::Cleaning,
                    date: june_first(),
                },
                &FlowEvent::DateChosen(next_day),
            )
            .expect("re-pick date");

        assert_eq!(
            outcome.to,
            DialogState::AwaitingTimeSelection { procedure: Procedure::Cleaning, date: next_day }
        );
    }

    #[test]
    fn coffee_flow_happy_path_places_order_and_schedules_follow_up() {
        let engine = FlowEngine::new(CoffeeOrderFlow);
        let mut state =
            engine.apply(&DialogState::Idle, &FlowEvent::CoffeeRequested).expect("start").to;
        state = engine
            .apply(&state, &FlowEvent::CoffeeChosen(CoffeeKind::Latte))
            .expect("type -> size")
            .to;
        state =
            engine.apply(&state, &FlowEvent::SizeChosen(CupSize::Large)).expect("size -> sugar").to;
        let outcome =
            engine.apply(&state, &FlowEvent::SugarChosen(Sugar::Without)).expect("sugar -> idle");

        assert_eq!(outcome.to, DialogState::Idle);
        assert_eq!(
            outcome.actions,
            vec![
                FlowAction::PlaceCoffeeOrder(CoffeeOrder {
                    kind: CoffeeKind::Latte,
                    size: CupSize::Large,
                    sugar: Sugar::Without,
                }),
                FlowAction::ScheduleFollowUp,
            ]
        );
        assert_eq!(engine.flow_type(), FlowType::CoffeeOrder);
        assert_eq!(CoffeeOrderFlow.initial_state(), DialogState::AwaitingCoffeeType);
    }

    #[test]
    fn sugar_without_size_is_a_missing_selection() {
        let engine = FlowEngine::new(CoffeeOrderFlow);
        let error = engine
            .apply(
                &DialogState::AwaitingCoffeeSize { kind: CoffeeKind::Espresso },
                &FlowEvent::SugarChosen(Sugar::With),
            )
            .expect_err("size was never chosen");

        assert!(matches!(error, FlowTransitionError::MissingSelection { missing: "coffee size", .. }));
    }

    #[test]
    fn engine_rejects_events_of_other_flows() {
        let engine = FlowEngine::new(ProcedureBookingFlow);
        let error = engine
            .apply(&DialogState::Idle, &FlowEvent::CoffeeRequested)
            .expect_err("coffee event is not a booking event");

        assert!(matches!(error, FlowTransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn question_is_forwarded_only_when_waiting_for_it() {
        let flows = DialogFlows::default();
        let waiting = flows
            .apply(&DialogState::Idle, &FlowEvent::QuestionRequested)
            .expect("enter question step")
            .to;
        let outcome = flows
            .apply(&waiting, &FlowEvent::QuestionSubmitted("Чи є вільні місця?".to_owned()))
            .expect("forward question");

        assert_eq!(outcome.to, DialogState::Idle);
        assert_eq!(outcome.actions, vec![FlowAction::ForwardQuestion("Чи є вільні місця?".to_owned())]);

        let error = flows
            .apply(&DialogState::Idle, &FlowEvent::QuestionSubmitted("hello".to_owned()))
            .expect_err("free text outside the question step");
        assert!(matches!(error, FlowTransitionError::InvalidTransition { step: StepKind::Idle, .. }));
    }

    #[test]
    fn replay_is_deterministic_for_same_event_sequence() {
        let flows = DialogFlows::default();
        let events = [
            FlowEvent::BookingRequested,
            FlowEvent::ProcedureChosen(Procedure::Endosphere),
            FlowEvent::DateChosen(june_first()),
            FlowEvent::TimeChosen(ten_am()),
        ];

        let run = |flows: &DialogFlows| {
            let mut state = DialogState::Idle;
            let mut actions = Vec::new();
            for event in &events {
                let outcome = flows.apply(&state, event).expect("deterministic run");
                actions.push(outcome.actions);
                state = outcome.to;
            }
            (state, actions)
        };

        assert_eq!(run(&flows), run(&flows));
    }
}
