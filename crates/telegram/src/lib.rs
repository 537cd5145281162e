//! Telegram interface for the lounge bot.
//!
//! - **Polling** (`polling`) - `getUpdates` long polling with reconnect backoff
//! - **Client** (`client`) - thin Bot API client, also the production [`delivery::MessageSink`]
//! - **Events** (`events`) - inbound event model and the per-user serialized dispatcher
//! - **Controller** (`controller`) - drives the booking, coffee and admin-contact dialogs
//! - **Messages** (`messages`) - reply keyboards and inline pickers
//! - **Notifier** / **Follow-ups** - operator messages and delayed coffee reminders
//!
//! ```text
//! getUpdates → PollingRunner → EventDispatcher → DialogController → repositories
//!                   ↑                                   ↓
//!              MessageSink  ←──────── Outbound replies, AdminNotifier, FollowUpScheduler
//! ```

pub mod client;
pub mod commands;
pub mod controller;
pub mod delivery;
pub mod events;
pub mod followup;
pub mod messages;
pub mod notifier;
pub mod polling;
