pub mod engine;
pub mod payload;
pub mod states;
pub mod store;

pub use engine::{
    AdminContactFlow, CoffeeOrderFlow, DialogFlows, FlowDefinition, FlowEngine,
    FlowTransitionError, ProcedureBookingFlow,
};
pub use payload::{CallbackAction, PayloadError};
pub use states::{DialogState, FlowAction, FlowEvent, FlowType, StepKind, TransitionOutcome};
pub use store::{ConversationStore, InMemoryConversationStore};
