//! Typed decoding of the opaque strings attached to inline buttons.
//!
//! Payloads are `<tag>_<value>`: `procedure_massage`, `date_20240601`,
//! `time_1000`, `coffee_latte`, `size_small`, `sugar_yes`, `cancel_<id>` and
//! `cancel_all`. They are decoded once into [`CallbackAction`] and dispatched
//! on the variant.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::appointment::{AppointmentId, SlotTime};
use crate::domain::catalog::{CoffeeKind, CupSize, Procedure, Sugar};
use crate::flows::states::FlowEvent;

/// Telegram caps `callback_data` at 64 bytes.
pub const MAX_PAYLOAD_LEN: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Procedure(Procedure),
    Date(NaiveDate),
    Time(SlotTime),
    Coffee(CoffeeKind),
    Size(CupSize),
    Sugar(Sugar),
    Cancel(AppointmentId),
    CancelAll,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("callback payload is empty")]
    Empty,
    #[error("callback payload exceeds 64 bytes")]
    TooLong,
    #[error("unrecognized callback payload `{0}`")]
    Unrecognized(String),
    #[error("invalid value `{value}` for callback tag `{tag}`")]
    InvalidValue { tag: &'static str, value: String },
}

impl CallbackAction {
    pub fn parse(payload: &str) -> Result<Self, PayloadError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(PayloadError::Empty);
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(PayloadError::TooLong);
        }
        if payload == "cancel_all" {
            return Ok(Self::CancelAll);
        }

        let Some((tag, value)) = payload.split_once('_') else {
            return Err(PayloadError::Unrecognized(payload.to_owned()));
        };

        match tag {
            "procedure" => Procedure::from_key(value)
                .map(Self::Procedure)
                .ok_or_else(|| invalid("procedure", value)),
            "date" => parse_compact_date(value).map(Self::Date).ok_or_else(|| invalid("date", value)),
            "time" => SlotTime::parse_compact(value)
                .map(Self::Time)
                .map_err(|_| invalid("time", value)),
            "coffee" => {
                CoffeeKind::from_key(value).map(Self::Coffee).ok_or_else(|| invalid("coffee", value))
            }
            "size" => CupSize::from_key(value).map(Self::Size).ok_or_else(|| invalid("size", value)),
            "sugar" => Sugar::from_key(value).map(Self::Sugar).ok_or_else(|| invalid("sugar", value)),
            "cancel" => {
                if is_appointment_id(value) {
                    Ok(Self::Cancel(AppointmentId(value.to_owned())))
                } else {
                    Err(invalid("cancel", value))
                }
            }
            _ => Err(PayloadError::Unrecognized(payload.to_owned())),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Procedure(procedure) => format!("procedure_{}", procedure.key()),
            Self::Date(date) => format!("date_{}", date.format("%Y%m%d")),
            Self::Time(time) => format!("time_{}", time.compact()),
            Self::Coffee(kind) => format!("coffee_{}", kind.key()),
            Self::Size(size) => format!("size_{}", size.key()),
            Self::Sugar(sugar) => format!("sugar_{}", sugar.key()),
            Self::Cancel(id) => format!("cancel_{}", id.0),
            Self::CancelAll => "cancel_all".to_owned(),
        }
    }

    /// Selection steps map onto flow events; cancellations are handled
    /// directly against the ledger.
    pub fn flow_event(&self) -> Option<FlowEvent> {
        match self {
            Self::Procedure(procedure) => Some(FlowEvent::ProcedureChosen(*procedure)),
            Self::Date(date) => Some(FlowEvent::DateChosen(*date)),
            Self::Time(time) => Some(FlowEvent::TimeChosen(*time)),
            Self::Coffee(kind) => Some(FlowEvent::CoffeeChosen(*kind)),
            Self::Size(size) => Some(FlowEvent::SizeChosen(*size)),
            Self::Sugar(sugar) => Some(FlowEvent::SugarChosen(*sugar)),
            Self::Cancel(_) | Self::CancelAll => None,
        }
    }
}

fn invalid(tag: &'static str, value: &str) -> PayloadError {
    PayloadError::InvalidValue { tag, value: value.to_owned() }
}

fn parse_compact_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = value[0..4].parse::<i32>().ok()?;
    let month = value[4..6].parse::<u32>().ok()?;
    let day = value[6..8].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn is_appointment_id(value: &str) -> bool {
    !value.is_empty() && value.len() <= 36 && value.bytes().all(|b| b.is_ascii_hexdigit() || b == b'-')
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{CallbackAction, PayloadError};
    use crate::domain::appointment::{AppointmentId, SlotTime};
    use crate::domain::catalog::{CoffeeKind, CupSize, Procedure, Sugar};
    use crate::flows::states::FlowEvent;

    #[test]
    fn decodes_every_known_payload_shape() {
        assert_eq!(
            CallbackAction::parse("procedure_massage"),
            Ok(CallbackAction::Procedure(Procedure::Massage))
        );
        assert_eq!(
            CallbackAction::parse("date_20240601"),
            Ok(CallbackAction::Date(NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")))
        );
        assert_eq!(
            CallbackAction::parse("time_1000"),
            Ok(CallbackAction::Time(SlotTime::new(10, 0).expect("valid time")))
        );
        assert_eq!(CallbackAction::parse("coffee_lungo"), Ok(CallbackAction::Coffee(CoffeeKind::Lungo)));
        assert_eq!(CallbackAction::parse("size_small"), Ok(CallbackAction::Size(CupSize::Small)));
        assert_eq!(CallbackAction::parse("sugar_no"), Ok(CallbackAction::Sugar(Sugar::Without)));
        assert_eq!(CallbackAction::parse("cancel_all"), Ok(CallbackAction::CancelAll));
        assert_eq!(
            CallbackAction::parse("cancel_3f2a9c"),
            Ok(CallbackAction::Cancel(AppointmentId("3f2a9c".to_owned())))
        );
    }

    #[test]
    fn encoded_payloads_decode_to_the_same_action() {
        let action = CallbackAction::Date(NaiveDate::from_ymd_opt(2025, 12, 31).expect("valid date"));
        assert_eq!(action.encode(), "date_20251231");
        assert_eq!(CallbackAction::parse(&action.encode()), Ok(action));
    }

    #[test]
    fn unknown_shapes_are_rejected_without_panicking() {
        assert_eq!(CallbackAction::parse(""), Err(PayloadError::Empty));
        assert!(matches!(CallbackAction::parse("noseparator"), Err(PayloadError::Unrecognized(_))));
        assert!(matches!(CallbackAction::parse("refund_123"), Err(PayloadError::Unrecognized(_))));
        assert!(matches!(
            CallbackAction::parse("procedure_sauna"),
            Err(PayloadError::InvalidValue { tag: "procedure", .. })
        ));
        assert!(matches!(
            CallbackAction::parse("time_2599"),
            Err(PayloadError::InvalidValue { tag: "time", .. })
        ));
        assert!(matches!(
            CallbackAction::parse("date_20240231"),
            Err(PayloadError::InvalidValue { tag: "date", .. })
        ));
        assert!(matches!(
            CallbackAction::parse("cancel_'; DROP TABLE"),
            Err(PayloadError::InvalidValue { tag: "cancel", .. })
        ));
        assert_eq!(CallbackAction::parse(&"x".repeat(65)), Err(PayloadError::TooLong));
    }

    #[test]
    fn selection_actions_map_to_flow_events() {
        assert_eq!(
            CallbackAction::Sugar(Sugar::With).flow_event(),
            Some(FlowEvent::SugarChosen(Sugar::With))
        );
        assert_eq!(CallbackAction::CancelAll.flow_event(), None);
    }
}
