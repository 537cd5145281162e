//! Drives the multi-step dialogs.
//!
//! Every inbound event is resolved against the sender's registration and
//! current [`DialogState`]. Flow events go through [`DialogFlows`], whose
//! actions are then performed here: prompts become outbound messages,
//! `ReserveSlot` writes to the appointment ledger, completions notify the
//! operator. The next state is stored only after every action succeeded, so
//! a rejected booking leaves the user at time selection.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Local, NaiveDate, NaiveDateTime, Timelike};
use tracing::{error, info, warn};

use lounge_core::config::DialogConfig;
use lounge_core::domain::appointment::{format_date, Appointment, SlotTime};
use lounge_core::domain::user::{NewUser, User};
use lounge_core::errors::{ApplicationError, DomainError};
use lounge_core::flows::{
    CallbackAction, ConversationStore, DialogFlows, DialogState, FlowAction, FlowEvent,
    FlowTransitionError,
};
use lounge_db::repositories::{AppointmentRepository, UserRepository};

use crate::commands::{parse_bot_command, parse_menu_text, BotCommand, MenuCommand};
use crate::delivery::Outbound;
use crate::events::{
    CallbackEvent, CommandEvent, ContactEvent, EventContext, InboundEvent, Sender, TextEvent,
};
use crate::followup::FollowUpScheduler;
use crate::messages::{
    appointments_list, coffee_picker, contact_request, date_picker, main_menu, procedure_picker,
    size_picker, sugar_picker, time_picker, OutboundMessage, NO_APPOINTMENTS,
};
use crate::notifier::{AdminEvent, AdminNotifier};

pub const WELCOME_BACK: &str = "Привіт ще раз! Оберіть дію:";
pub const SHARE_PHONE: &str = "Поділіться, будь ласка, своїм номером телефону:";
pub const REGISTERED: &str = "Дякую! Ви авторизовані ✅ Оберіть дію:";
pub const REGISTER_FIRST: &str = "Будь ласка, авторизуйтесь. Поділіться своїм номером телефону:";
pub const FOREIGN_CONTACT: &str = "⚠️ Будь ласка, поділіться власним номером телефону.";
pub const MENU_HINT: &str = "Оберіть дію з меню 👇";
pub const ADMIN_ON_THE_WAY: &str = "✅ Адміністратор уже йде до вас";
pub const ASK_QUESTION: &str = "📝 Напишіть своє питання, і я передам його адміністратору.";
pub const QUESTION_SENT: &str = "✅ Ваше повідомлення надіслано адміністратору.";
pub const COFFEE_FOLLOW_UP: &str = "☕ Ваша кава вже в дорозі!";
pub const STALE_BUTTON: &str = "😕 Ця кнопка більше не активна. Оберіть дію з меню.";
pub const DATE_UNAVAILABLE: &str = "📅 Ця дата недоступна. Оберіть іншу.";
pub const TIME_UNAVAILABLE: &str = "🕒 Цей час недоступний. Оберіть інший.";
pub const DAY_FULLY_BOOKED: &str = "😔 На цю дату вільного часу немає. Оберіть іншу дату.";
pub const APPOINTMENT_GONE: &str = "😕 Запис не знайдено або вже скасовано.";
pub const COFFEE_SIZE_WITHOUT_KIND: &str = "Щось пішло не так. Спробуйте замовити ще раз.";
pub const COFFEE_ORDER_MISSING: &str = "Дані замовлення не знайдено. Спробуйте ще раз.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogSettings {
    pub available_times: Vec<SlotTime>,
    pub booking_horizon_days: u32,
    pub coffee_followup: Duration,
}

impl DialogSettings {
    pub fn from_config(config: &DialogConfig) -> Self {
        let mut available_times = config.available_times.clone();
        available_times.sort();
        Self {
            available_times,
            booking_horizon_days: config.booking_horizon_days,
            coffee_followup: Duration::from_secs(config.coffee_followup_secs),
        }
    }
}

type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub struct DialogController {
    users: Arc<dyn UserRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    store: Arc<dyn ConversationStore>,
    flows: DialogFlows,
    notifier: AdminNotifier,
    followups: FollowUpScheduler,
    settings: DialogSettings,
    clock: Clock,
}

impl DialogController {
    pub fn new(
        users: Arc<dyn UserRepository>,
        appointments: Arc<dyn AppointmentRepository>,
        store: Arc<dyn ConversationStore>,
        notifier: AdminNotifier,
        followups: FollowUpScheduler,
        settings: DialogSettings,
    ) -> Self {
        Self {
            users,
            appointments,
            store,
            flows: DialogFlows::default(),
            notifier,
            followups,
            settings,
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    /// Replaces the local wall clock used for the booking horizon and for
    /// hiding slots that have already started.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn followups(&self) -> &FollowUpScheduler {
        &self.followups
    }

    /// Never fails: errors become a user-facing reply and a log line.
    pub async fn handle(&self, event: &InboundEvent, ctx: &EventContext) -> Vec<Outbound> {
        match event {
            InboundEvent::Command(event) => {
                let result = self.on_command(event).await;
                self.settle(&event.sender, result, ctx)
            }
            InboundEvent::Text(event) => {
                let result = self.on_text(event, ctx).await;
                self.settle(&event.sender, result, ctx)
            }
            InboundEvent::Contact(event) => {
                let result = self.on_contact(event, ctx).await;
                self.settle(&event.sender, result, ctx)
            }
            InboundEvent::Callback(event) => {
                let result = self.on_callback(event, ctx).await;
                let mut replies = vec![Outbound::AnswerCallback {
                    callback_id: event.callback_id.clone(),
                    text: None,
                }];
                replies.extend(self.settle(&event.sender, result, ctx));
                replies
            }
            InboundEvent::Unsupported { .. } => Vec::new(),
        }
    }

    fn settle(
        &self,
        sender: &Sender,
        result: Result<Vec<Outbound>, ApplicationError>,
        ctx: &EventContext,
    ) -> Vec<Outbound> {
        let error = match result {
            Ok(replies) => return replies,
            Err(error) => error,
        };

        match &error {
            ApplicationError::Domain(DomainError::SlotTaken { slot }) => info!(
                event_name = "dialog.booking.slot_taken",
                user_id = %sender.user_id,
                correlation_id = %ctx.correlation_id,
                slot = %slot,
                "requested slot is already booked"
            ),
            other if other.is_retryable() => warn!(
                event_name = "dialog.handler.failed",
                user_id = %sender.user_id,
                correlation_id = %ctx.correlation_id,
                error = %other,
                "dialog step failed; user may retry"
            ),
            other => error!(
                event_name = "dialog.handler.failed",
                user_id = %sender.user_id,
                correlation_id = %ctx.correlation_id,
                error = %other,
                "dialog step failed"
            ),
        }
        vec![Outbound::text(sender.chat_id, error.user_message())]
    }

    async fn on_command(&self, event: &CommandEvent) -> Result<Vec<Outbound>, ApplicationError> {
        let sender = &event.sender;
        match parse_bot_command(&event.text) {
            Some(BotCommand::Start) => {
                self.store.delete(sender.user_id).await;
                self.followups.cancel_for(sender.user_id);
                let reply = match self.users.find_by_id(sender.user_id).await? {
                    Some(_) => main_menu(WELCOME_BACK),
                    None => contact_request(SHARE_PHONE),
                };
                Ok(vec![Outbound::send(sender.chat_id, reply)])
            }
            Some(BotCommand::Unknown(_)) | None => self.menu_hint(sender).await,
        }
    }

    async fn on_contact(
        &self,
        event: &ContactEvent,
        ctx: &EventContext,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        let sender = &event.sender;
        let phone_number = event.phone_number.trim();
        if event.contact_user_id != Some(sender.user_id.0) || phone_number.is_empty() {
            warn!(
                event_name = "dialog.registration.rejected",
                user_id = %sender.user_id,
                correlation_id = %ctx.correlation_id,
                "shared contact does not belong to the sender"
            );
            return Ok(vec![Outbound::send(sender.chat_id, contact_request(FOREIGN_CONTACT))]);
        }

        let user = self
            .users
            .register(NewUser {
                id: sender.user_id,
                first_name: sender.first_name.clone(),
                last_name: sender.last_name.clone(),
                phone_number: phone_number.to_owned(),
            })
            .await?;
        info!(
            event_name = "dialog.registration.completed",
            user_id = %user.id,
            correlation_id = %ctx.correlation_id,
            "user registered"
        );
        Ok(vec![Outbound::send(sender.chat_id, main_menu(REGISTERED))])
    }

    async fn on_text(
        &self,
        event: &TextEvent,
        ctx: &EventContext,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        let sender = &event.sender;
        if let Some(command) = parse_menu_text(&event.text) {
            return self.on_menu(sender, command, ctx).await;
        }

        let state = self.store.get(sender.user_id).await.unwrap_or_default();
        if state != DialogState::WaitingForQuestion {
            return self.menu_hint(sender).await;
        }

        let Some(user) = self.users.find_by_id(sender.user_id).await? else {
            self.store.delete(sender.user_id).await;
            return Ok(register_first(sender));
        };
        let question = event.text.trim().to_owned();
        self.advance(sender, &user, FlowEvent::QuestionSubmitted(question), None, ctx).await
    }

    async fn on_menu(
        &self,
        sender: &Sender,
        command: MenuCommand,
        ctx: &EventContext,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        let Some(user) = self.users.find_by_id(sender.user_id).await? else {
            info!(
                event_name = "dialog.registration.required",
                user_id = %sender.user_id,
                correlation_id = %ctx.correlation_id,
                command = command.as_str(),
                "unregistered user asked for a flow"
            );
            return Ok(register_first(sender));
        };

        match command {
            MenuCommand::OrderCoffee => {
                self.advance(sender, &user, FlowEvent::CoffeeRequested, None, ctx).await
            }
            MenuCommand::BookProcedure => {
                self.advance(sender, &user, FlowEvent::BookingRequested, None, ctx).await
            }
            MenuCommand::AskAdmin => {
                self.advance(sender, &user, FlowEvent::QuestionRequested, None, ctx).await
            }
            MenuCommand::MyAppointments => {
                let appointments = self.appointments.find_by_user(user.id).await?;
                Ok(vec![Outbound::send(sender.chat_id, appointments_list(&appointments))])
            }
            MenuCommand::CallAdmin => {
                self.notifier.notify(&user, AdminEvent::CallRequested).await;
                Ok(vec![Outbound::text(sender.chat_id, ADMIN_ON_THE_WAY)])
            }
        }
    }

    async fn on_callback(
        &self,
        event: &CallbackEvent,
        ctx: &EventContext,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        let sender = &event.sender;
        let action = match CallbackAction::parse(&event.data) {
            Ok(action) => action,
            Err(error) => {
                warn!(
                    event_name = "ingress.telegram.unrecognized_callback",
                    user_id = %sender.user_id,
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "ignoring callback payload"
                );
                return Ok(vec![Outbound::text(sender.chat_id, STALE_BUTTON)]);
            }
        };

        let Some(user) = self.users.find_by_id(sender.user_id).await? else {
            return Ok(register_first(sender));
        };

        match action {
            CallbackAction::Cancel(id) => {
                let found = self.appointments.find_by_id(&id).await?;
                let Some(appointment) = found.filter(|found| found.is_owned_by(user.id)) else {
                    warn!(
                        event_name = "dialog.cancel.not_found",
                        user_id = %user.id,
                        correlation_id = %ctx.correlation_id,
                        appointment_id = %id,
                        "cancel requested for a missing or foreign appointment"
                    );
                    return Ok(vec![Outbound::text(sender.chat_id, APPOINTMENT_GONE)]);
                };
                if !self.appointments.delete_by_id(&appointment.id).await? {
                    return Ok(vec![Outbound::text(sender.chat_id, APPOINTMENT_GONE)]);
                }
                info!(
                    event_name = "dialog.cancel.completed",
                    user_id = %user.id,
                    correlation_id = %ctx.correlation_id,
                    appointment_id = %appointment.id,
                    "appointment cancelled"
                );
                self.notifier.notify(&user, AdminEvent::Cancelled(appointment.slot.clone())).await;

                let remaining = self.appointments.find_by_user(user.id).await?;
                Ok(vec![
                    replace(sender, event, appointments_list(&remaining)),
                    Outbound::text(sender.chat_id, format!("🗑 Запис скасовано: {}", appointment.slot)),
                ])
            }
            CallbackAction::CancelAll => {
                let removed = self.appointments.delete_all_by_user(user.id).await?;
                if removed == 0 {
                    return Ok(vec![replace(sender, event, OutboundMessage::text(NO_APPOINTMENTS))]);
                }
                info!(
                    event_name = "dialog.cancel.all_completed",
                    user_id = %user.id,
                    correlation_id = %ctx.correlation_id,
                    removed,
                    "all appointments cancelled"
                );
                self.notifier.notify(&user, AdminEvent::CancelledAll(removed)).await;
                Ok(vec![replace(
                    sender,
                    event,
                    OutboundMessage::text(format!("🗑 Скасовано записів: {removed}")),
                )])
            }
            CallbackAction::Date(date) if !self.is_bookable(date) => {
                Ok(vec![Outbound::text(sender.chat_id, DATE_UNAVAILABLE)])
            }
            CallbackAction::Time(time) if !self.settings.available_times.contains(&time) => {
                Ok(vec![Outbound::text(sender.chat_id, TIME_UNAVAILABLE)])
            }
            CallbackAction::Time(time) => {
                if let Some(DialogState::AwaitingTimeSelection { procedure, date }) =
                    self.store.get(user.id).await
                {
                    if !self.is_bookable(date) {
                        self.store.set(user.id, DialogState::AwaitingDateSelection { procedure }).await;
                        return Ok(vec![
                            Outbound::text(sender.chat_id, DATE_UNAVAILABLE),
                            Outbound::send(sender.chat_id, self.date_picker()),
                        ]);
                    }
                    if !self.is_open(date, time) {
                        return Ok(vec![Outbound::text(sender.chat_id, TIME_UNAVAILABLE)]);
                    }
                }
                self.advance(sender, &user, FlowEvent::TimeChosen(time), Some(event), ctx).await
            }
            selection => match selection.flow_event() {
                Some(flow_event) => self.advance(sender, &user, flow_event, Some(event), ctx).await,
                None => Ok(Vec::new()),
            },
        }
    }

    async fn advance(
        &self,
        sender: &Sender,
        user: &User,
        event: FlowEvent,
        callback: Option<&CallbackEvent>,
        ctx: &EventContext,
    ) -> Result<Vec<Outbound>, ApplicationError> {
        let current = self.store.get(user.id).await.unwrap_or_default();
        let outcome = match self.flows.apply(&current, &event) {
            Ok(outcome) => outcome,
            Err(error) => return Ok(self.abandon(sender, error, ctx).await),
        };

        let mut replies = Vec::new();
        for action in &outcome.actions {
            self.perform(action, sender, user, callback, &mut replies).await?;
        }

        self.store.set(user.id, outcome.to.clone()).await;
        info!(
            event_name = "dialog.flow.transition",
            user_id = %user.id,
            correlation_id = %ctx.correlation_id,
            flow = ?event.flow_type(),
            from = outcome.from.step().as_str(),
            to = outcome.to.step().as_str(),
            "dialog advanced"
        );
        Ok(replies)
    }

    /// Out-of-order selection: the flow is dropped and the user starts over.
    async fn abandon(
        &self,
        sender: &Sender,
        error: FlowTransitionError,
        ctx: &EventContext,
    ) -> Vec<Outbound> {
        self.store.delete(sender.user_id).await;
        warn!(
            event_name = "dialog.flow.abandoned",
            user_id = %sender.user_id,
            correlation_id = %ctx.correlation_id,
            error = %error,
            "stale selection; conversation reset"
        );

        let event = match &error {
            FlowTransitionError::MissingSelection { event, .. }
            | FlowTransitionError::InvalidTransition { event, .. } => event.clone(),
        };
        let text = match event {
            FlowEvent::SizeChosen(_) => COFFEE_SIZE_WITHOUT_KIND,
            FlowEvent::SugarChosen(_) => COFFEE_ORDER_MISSING,
            _ => ApplicationError::from(DomainError::from(error)).user_message(),
        };
        vec![Outbound::text(sender.chat_id, text)]
    }

    async fn perform(
        &self,
        action: &FlowAction,
        sender: &Sender,
        user: &User,
        callback: Option<&CallbackEvent>,
        replies: &mut Vec<Outbound>,
    ) -> Result<(), ApplicationError> {
        let chat_id = sender.chat_id;
        match action {
            FlowAction::PromptProcedure => replies.push(Outbound::send(chat_id, procedure_picker())),
            FlowAction::ConfirmProcedure(procedure) => {
                replies.push(confirm(sender, callback, format!("✅ Ви обрали: {}", procedure.label())))
            }
            FlowAction::PromptDate => replies.push(Outbound::send(chat_id, self.date_picker())),
            FlowAction::ConfirmDate(date) => replies.push(confirm(
                sender,
                callback,
                format!("📅 Ви обрали дату: {}", format_date(*date)),
            )),
            FlowAction::PromptTime { procedure, date } => {
                let taken = self.appointments.taken_times(*procedure, *date).await?;
                let free: Vec<SlotTime> = self
                    .settings
                    .available_times
                    .iter()
                    .copied()
                    .filter(|time| !taken.contains(time) && self.is_open(*date, *time))
                    .collect();
                if free.is_empty() {
                    replies.push(Outbound::text(chat_id, DAY_FULLY_BOOKED));
                    replies.push(Outbound::send(chat_id, self.date_picker()));
                } else {
                    replies.push(Outbound::send(chat_id, time_picker(&free)));
                }
            }
            FlowAction::ReserveSlot(slot) => {
                // Fast path only; the ledger's uniqueness rule decides.
                if self.appointments.find_by_slot(slot).await?.is_some() {
                    return Err(DomainError::SlotTaken { slot: slot.clone() }.into());
                }
                let appointment =
                    self.appointments.create(Appointment::new(user.id, slot.clone())).await?;
                info!(
                    event_name = "dialog.booking.created",
                    user_id = %user.id,
                    appointment_id = %appointment.id,
                    slot = %appointment.slot,
                    "appointment booked"
                );
                replies.push(confirm(sender, callback, format!("✅ Ви записались на {slot}")));
                self.notifier.notify(user, AdminEvent::Booked(slot.clone())).await;
            }
            FlowAction::PromptCoffeeType => replies.push(Outbound::send(chat_id, coffee_picker())),
            FlowAction::ConfirmCoffeeType(kind) => replies.push(confirm(
                sender,
                callback,
                format!("☕ Ви обрали {}. Тепер оберіть розмір:", kind.label()),
            )),
            FlowAction::PromptCupSize => replies.push(Outbound::send(chat_id, size_picker())),
            FlowAction::ConfirmCupSize(size) => replies.push(confirm(
                sender,
                callback,
                format!("📏 Ви обрали розмір: {}. Додати цукор?", size.label()),
            )),
            FlowAction::PromptSugar => replies.push(Outbound::send(chat_id, sugar_picker())),
            FlowAction::PlaceCoffeeOrder(order) => {
                info!(
                    event_name = "dialog.coffee.ordered",
                    user_id = %user.id,
                    order = %order.summary(),
                    "coffee ordered"
                );
                replies.push(confirm(
                    sender,
                    callback,
                    format!("✅ Ви замовили {}. Ваша кава готується!", order.summary()),
                ));
                self.notifier.notify(user, AdminEvent::CoffeeOrdered(*order)).await;
            }
            FlowAction::ScheduleFollowUp => self.followups.schedule(
                user.id,
                chat_id,
                self.settings.coffee_followup,
                COFFEE_FOLLOW_UP,
            ),
            FlowAction::PromptQuestion => replies.push(Outbound::text(chat_id, ASK_QUESTION)),
            FlowAction::ForwardQuestion(question) => {
                self.notifier.notify(user, AdminEvent::Question(question.clone())).await;
                replies.push(Outbound::text(chat_id, QUESTION_SENT));
            }
        }
        Ok(())
    }

    async fn menu_hint(&self, sender: &Sender) -> Result<Vec<Outbound>, ApplicationError> {
        Ok(match self.users.find_by_id(sender.user_id).await? {
            Some(_) => vec![Outbound::send(sender.chat_id, main_menu(MENU_HINT))],
            None => register_first(sender),
        })
    }

    fn today(&self) -> NaiveDate {
        (self.clock)().date()
    }

    fn date_picker(&self) -> OutboundMessage {
        date_picker(self.today(), self.settings.booking_horizon_days)
    }

    /// Whether `time` on `date` is still ahead of the clock.
    fn is_open(&self, date: NaiveDate, time: SlotTime) -> bool {
        let now = (self.clock)();
        if date != now.date() {
            return date > now.date();
        }
        let hour = u8::try_from(now.hour()).unwrap_or(u8::MAX);
        let minute = u8::try_from(now.minute()).unwrap_or(u8::MAX);
        SlotTime::new(hour, minute).is_ok_and(|current| time > current)
    }

    fn is_bookable(&self, date: NaiveDate) -> bool {
        let first = self.today();
        let last = first
            .checked_add_days(Days::new(u64::from(self.settings.booking_horizon_days)))
            .unwrap_or(NaiveDate::MAX);
        date >= first && date < last
    }
}

fn register_first(sender: &Sender) -> Vec<Outbound> {
    vec![Outbound::send(sender.chat_id, contact_request(REGISTER_FIRST))]
}

/// Edits the message that carried the pressed button, or sends a new one
/// when the callback has no message attached.
fn confirm(sender: &Sender, callback: Option<&CallbackEvent>, text: String) -> Outbound {
    match callback.and_then(|callback| callback.message_id) {
        Some(message_id) => Outbound::Edit { chat_id: sender.chat_id, message_id, text, markup: None },
        None => Outbound::text(sender.chat_id, text),
    }
}

fn replace(sender: &Sender, callback: &CallbackEvent, message: OutboundMessage) -> Outbound {
    match callback.message_id {
        Some(message_id) => Outbound::Edit {
            chat_id: sender.chat_id,
            message_id,
            text: message.text,
            markup: message.markup,
        },
        None => Outbound::send(sender.chat_id, message),
    }
}
