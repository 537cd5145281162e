use chrono::{Days, NaiveDate};
use serde::Serialize;

use lounge_core::domain::appointment::{format_date, Appointment, SlotTime};
use lounge_core::domain::catalog::{CoffeeKind, CupSize, Procedure, Sugar};
use lounge_core::flows::CallbackAction;

use crate::commands::MenuCommand;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, action: &CallbackAction) -> Self {
        Self { text: text.into(), callback_data: action.encode() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub request_contact: bool,
}

/// Serialises to the `reply_markup` object the Bot API expects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline {
        inline_keyboard: Vec<Vec<InlineButton>>,
    },
    Keyboard {
        keyboard: Vec<Vec<KeyboardButton>>,
        resize_keyboard: bool,
        one_time_keyboard: bool,
    },
}

impl ReplyMarkup {
    pub fn inline_rows(&self) -> &[Vec<InlineButton>] {
        match self {
            Self::Inline { inline_keyboard } => inline_keyboard,
            Self::Keyboard { .. } => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub markup: Option<ReplyMarkup>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), markup: None }
    }

    pub fn callback_data(&self) -> Vec<&str> {
        self.markup
            .iter()
            .flat_map(|markup| markup.inline_rows())
            .flatten()
            .map(|button| button.callback_data.as_str())
            .collect()
    }
}

pub struct MessageBuilder {
    text: String,
    inline_rows: Vec<Vec<InlineButton>>,
    keyboard_rows: Vec<Vec<KeyboardButton>>,
    one_time: bool,
}

impl MessageBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), inline_rows: Vec::new(), keyboard_rows: Vec::new(), one_time: false }
    }

    pub fn inline_row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut RowBuilder),
    {
        let mut builder = RowBuilder::default();
        build(&mut builder);
        if !builder.buttons.is_empty() {
            self.inline_rows.push(builder.buttons);
        }
        self
    }

    pub fn keyboard_row<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keyboard_rows.push(
            labels
                .into_iter()
                .map(|label| KeyboardButton { text: label.into(), request_contact: false })
                .collect(),
        );
        self
    }

    pub fn contact_request(mut self, label: impl Into<String>) -> Self {
        self.keyboard_rows.push(vec![KeyboardButton { text: label.into(), request_contact: true }]);
        self.one_time = true;
        self
    }

    pub fn build(self) -> OutboundMessage {
        let markup = if !self.inline_rows.is_empty() {
            Some(ReplyMarkup::Inline { inline_keyboard: self.inline_rows })
        } else if !self.keyboard_rows.is_empty() {
            Some(ReplyMarkup::Keyboard {
                keyboard: self.keyboard_rows,
                resize_keyboard: true,
                one_time_keyboard: self.one_time,
            })
        } else {
            None
        };
        OutboundMessage { text: self.text, markup }
    }
}

#[derive(Default)]
pub struct RowBuilder {
    buttons: Vec<InlineButton>,
}

impl RowBuilder {
    pub fn button(&mut self, label: impl Into<String>, action: CallbackAction) -> &mut Self {
        self.buttons.push(InlineButton::new(label, &action));
        self
    }
}

pub fn main_menu(text: impl Into<String>) -> OutboundMessage {
    MessageBuilder::new(text)
        .keyboard_row([MenuCommand::OrderCoffee.label(), MenuCommand::BookProcedure.label()])
        .keyboard_row([MenuCommand::MyAppointments.label(), MenuCommand::CallAdmin.label()])
        .keyboard_row([MenuCommand::AskAdmin.label()])
        .build()
}

pub fn contact_request(text: impl Into<String>) -> OutboundMessage {
    MessageBuilder::new(text).contact_request("📱 Поділитись номером").build()
}

pub fn procedure_picker() -> OutboundMessage {
    Procedure::ALL
        .iter()
        .fold(MessageBuilder::new("🧾 Оберіть процедуру:"), |builder, procedure| {
            builder.inline_row(|row| {
                row.button(procedure.label(), CallbackAction::Procedure(*procedure));
            })
        })
        .build()
}

/// `days` consecutive dates starting at `from`, two per row.
pub fn date_picker(from: NaiveDate, days: u32) -> OutboundMessage {
    let dates: Vec<NaiveDate> =
        (0..u64::from(days)).filter_map(|offset| from.checked_add_days(Days::new(offset))).collect();
    dates
        .chunks(2)
        .fold(MessageBuilder::new("📅 Оберіть дату:"), |builder, pair| {
            builder.inline_row(|row| {
                for date in pair {
                    row.button(format_date(*date), CallbackAction::Date(*date));
                }
            })
        })
        .build()
}

pub fn time_picker(free: &[SlotTime]) -> OutboundMessage {
    free.iter()
        .fold(MessageBuilder::new("🕒 Оберіть бажаний час:"), |builder, time| {
            builder.inline_row(|row| {
                row.button(time.to_string(), CallbackAction::Time(*time));
            })
        })
        .build()
}

pub fn coffee_picker() -> OutboundMessage {
    CoffeeKind::ALL
        .iter()
        .fold(MessageBuilder::new("☕ Оберіть каву:"), |builder, kind| {
            builder.inline_row(|row| {
                row.button(kind.label(), CallbackAction::Coffee(*kind));
            })
        })
        .build()
}

pub fn size_picker() -> OutboundMessage {
    CupSize::ALL
        .iter()
        .fold(MessageBuilder::new("📏 Оберіть розмір:"), |builder, size| {
            builder.inline_row(|row| {
                row.button(size.label(), CallbackAction::Size(*size));
            })
        })
        .build()
}

pub fn sugar_picker() -> OutboundMessage {
    MessageBuilder::new("🧂 Додати цукор?")
        .inline_row(|row| {
            row.button(Sugar::With.answer(), CallbackAction::Sugar(Sugar::With));
        })
        .inline_row(|row| {
            row.button(Sugar::Without.answer(), CallbackAction::Sugar(Sugar::Without));
        })
        .build()
}

pub const NO_APPOINTMENTS: &str = "📭 У вас немає записів.";

pub fn appointments_text(appointments: &[Appointment]) -> String {
    if appointments.is_empty() {
        return NO_APPOINTMENTS.to_owned();
    }
    let mut text = String::from("📋 Ваші записи:\n\n");
    for (index, appointment) in appointments.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", index + 1, appointment.slot));
    }
    text
}

/// The appointment list with one cancel button per entry and a cancel-all row.
pub fn appointments_list(appointments: &[Appointment]) -> OutboundMessage {
    let builder = MessageBuilder::new(appointments_text(appointments));
    if appointments.is_empty() {
        return builder.build();
    }
    appointments
        .iter()
        .enumerate()
        .fold(builder, |builder, (index, appointment)| {
            builder.inline_row(|row| {
                row.button(
                    format!("❌ Скасувати {}", index + 1),
                    CallbackAction::Cancel(appointment.id.clone()),
                );
            })
        })
        .inline_row(|row| {
            row.button("🗑 Скасувати всі", CallbackAction::CancelAll);
        })
        .build()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use lounge_core::domain::appointment::{Appointment, Slot, SlotTime};
    use lounge_core::domain::catalog::Procedure;
    use lounge_core::domain::user::UserId;

    use super::{
        appointments_list, contact_request, date_picker, main_menu, procedure_picker,
        time_picker, MessageBuilder, NO_APPOINTMENTS,
    };
    use lounge_core::flows::CallbackAction;

    #[test]
    fn inline_markup_serialises_to_bot_api_shape() {
        let message = MessageBuilder::new("pick")
            .inline_row(|row| {
                row.button("Масаж", CallbackAction::Procedure(Procedure::Massage));
            })
            .build();

        let markup = serde_json::to_value(message.markup.expect("markup")).expect("serialise");
        assert_eq!(
            markup,
            json!({"inline_keyboard": [[{"text": "Масаж", "callback_data": "procedure_massage"}]]})
        );
    }

    #[test]
    fn contact_keyboard_requests_contact_once() {
        let message = contact_request("share");
        let markup = serde_json::to_value(message.markup.expect("markup")).expect("serialise");
        assert_eq!(markup["keyboard"][0][0]["request_contact"], json!(true));
        assert_eq!(markup["one_time_keyboard"], json!(true));
    }

    #[test]
    fn main_menu_omits_request_contact_flag() {
        let markup = serde_json::to_value(main_menu("menu").markup.expect("markup")).expect("json");
        assert_eq!(markup["keyboard"][0][0], json!({"text": "☕ Замовити каву"}));
        assert_eq!(markup["keyboard"][2][0], json!({"text": "💬 Задати питання адміну"}));
        assert_eq!(markup["resize_keyboard"], json!(true));
    }

    #[test]
    fn pickers_encode_typed_payloads() {
        assert_eq!(
            procedure_picker().callback_data(),
            vec!["procedure_massage", "procedure_cleaning", "procedure_btl", "procedure_endosphere"]
        );

        let start = NaiveDate::from_ymd_opt(2024, 6, 30).expect("date");
        assert_eq!(date_picker(start, 3).callback_data(), vec!["date_20240630", "date_20240701", "date_20240702"]);

        let times = [SlotTime::new(10, 0).expect("time"), SlotTime::new(14, 30).expect("time")];
        assert_eq!(time_picker(&times).callback_data(), vec!["time_1000", "time_1430"]);
    }

    #[test]
    fn appointment_list_has_cancel_buttons() {
        let appointment = Appointment::new(
            UserId(1),
            Slot {
                procedure: Procedure::Btl,
                date: NaiveDate::from_ymd_opt(2024, 6, 1).expect("date"),
                time: SlotTime::new(11, 0).expect("time"),
            },
        );
        let message = appointments_list(std::slice::from_ref(&appointment));

        assert!(message.text.contains("1. БТЛ 01.06.2024 о 11:00"));
        let cancel_one = format!("cancel_{}", appointment.id);
        assert_eq!(message.callback_data(), vec![cancel_one.as_str(), "cancel_all"]);

        let empty = appointments_list(&[]);
        assert_eq!(empty.text, NO_APPOINTMENTS);
        assert!(empty.markup.is_none());
    }
}
