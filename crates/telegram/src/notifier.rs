use std::sync::Arc;

use tracing::{debug, warn};

use lounge_core::domain::appointment::Slot;
use lounge_core::domain::catalog::CoffeeOrder;
use lounge_core::domain::user::User;

use crate::delivery::{MessageSink, Outbound};

/// Something the operator should hear about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminEvent {
    CallRequested,
    Question(String),
    Booked(Slot),
    CoffeeOrdered(CoffeeOrder),
    Cancelled(Slot),
    CancelledAll(u64),
}

impl AdminEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CallRequested => "call_requested",
            Self::Question(_) => "question",
            Self::Booked(_) => "booked",
            Self::CoffeeOrdered(_) => "coffee_ordered",
            Self::Cancelled(_) => "cancelled",
            Self::CancelledAll(_) => "cancelled_all",
        }
    }

    pub fn render(&self, user: &User) -> String {
        let who = user.signature();
        match self {
            Self::CallRequested => format!("📞 {who} викликав адміністратора"),
            Self::Question(text) => format!("❓ {who} задав(ла) питання:\n\"{text}\""),
            Self::Booked(slot) => format!("🧾 {who} записався на {slot}"),
            Self::CoffeeOrdered(order) => format!("☕ {who} замовив(ла) {}", order.summary()),
            Self::Cancelled(slot) => format!("🗑 {who} скасував(ла) запис: {slot}"),
            Self::CancelledAll(count) => format!("🗑 {who} скасував(ла) всі записи ({count})"),
        }
    }
}

/// Fire-and-forget delivery to the operator chat. Failures are logged and
/// never reach the user-facing flow.
#[derive(Clone)]
pub struct AdminNotifier {
    sink: Arc<dyn MessageSink>,
    admin_chat_id: Option<i64>,
}

impl AdminNotifier {
    pub fn new(sink: Arc<dyn MessageSink>, admin_chat_id: Option<i64>) -> Self {
        Self { sink, admin_chat_id }
    }

    pub async fn notify(&self, user: &User, event: AdminEvent) {
        let Some(chat_id) = self.admin_chat_id else {
            warn!(
                event_name = "notify.admin.unconfigured",
                admin_event = event.name(),
                user_id = %user.id,
                "admin chat id is not configured; dropping notification"
            );
            return;
        };

        let outbound = Outbound::text(chat_id, event.render(user));
        match self.sink.deliver(&outbound).await {
            Ok(()) => debug!(
                event_name = "notify.admin.sent",
                admin_event = event.name(),
                user_id = %user.id,
                "admin notified"
            ),
            Err(error) => warn!(
                event_name = "notify.admin.failed",
                admin_event = event.name(),
                user_id = %user.id,
                error = %error,
                "failed to notify admin"
            ),
        }
    }
}
