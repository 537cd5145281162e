//! Text-level input recognition: bot commands and main-menu phrases.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuCommand {
    OrderCoffee,
    BookProcedure,
    MyAppointments,
    CallAdmin,
    AskAdmin,
}

impl MenuCommand {
    pub const ALL: [MenuCommand; 5] = [
        MenuCommand::OrderCoffee,
        MenuCommand::BookProcedure,
        MenuCommand::MyAppointments,
        MenuCommand::CallAdmin,
        MenuCommand::AskAdmin,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::OrderCoffee => "☕ Замовити каву",
            Self::BookProcedure => "📝 Записатись на процедуру",
            Self::MyAppointments => "📅 Мої записи",
            Self::CallAdmin => "📞 Викликати адміністратора",
            Self::AskAdmin => "💬 Задати питання адміну",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrderCoffee => "order_coffee",
            Self::BookProcedure => "book_procedure",
            Self::MyAppointments => "my_appointments",
            Self::CallAdmin => "call_admin",
            Self::AskAdmin => "ask_admin",
        }
    }
}

/// Matches a main-menu phrase. The coffee order is also triggered by any
/// text mentioning "замовити каву", in any case and with any spacing.
pub fn parse_menu_text(text: &str) -> Option<MenuCommand> {
    let trimmed = text.trim();
    if let Some(command) = MenuCommand::ALL.into_iter().find(|command| command.label() == trimmed) {
        return Some(command);
    }
    is_coffee_trigger(trimmed).then_some(MenuCommand::OrderCoffee)
}

fn is_coffee_trigger(text: &str) -> bool {
    let normalized = text.to_lowercase();
    normalized
        .match_indices("замовити")
        .any(|(start, verb)| normalized[start + verb.len()..].trim_start().starts_with("каву"))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Unknown(String),
}

/// Parses `/start`, `/start@lounge_bot` and `/start <payload>` alike.
pub fn parse_bot_command(text: &str) -> Option<BotCommand> {
    let first = text.trim().split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name).to_lowercase();
    if name.is_empty() {
        return None;
    }
    Some(match name.as_str() {
        "start" => BotCommand::Start,
        _ => BotCommand::Unknown(name),
    })
}
