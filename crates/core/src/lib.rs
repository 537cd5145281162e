pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use domain::appointment::{Appointment, AppointmentId, Slot, SlotTime};
pub use domain::catalog::{CoffeeKind, CoffeeOrder, CupSize, Procedure, Sugar};
pub use domain::user::{NewUser, User, UserId};
pub use errors::{ApplicationError, DomainError};
pub use flows::{CallbackAction, ConversationStore, DialogFlows, DialogState, FlowEvent};
