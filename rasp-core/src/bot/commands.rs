pub const REGISTER_BUTTON: &str = "🎯 Зарегистрировать группу";
pub const SCHEDULE_BUTTON: &str = "📅 Получить расписание";
pub const HELP_BUTTON: &str = "❓ Помощь";
pub const SELECTION_PREFIX: &str = "🎯 ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// `/reg` with its raw argument; empty when none was given.
    Register(String),
    RegisterButton,
    GetSchedule,
    Select(String),
    Unknown(String),
}

impl Command {
    /// Menu buttons win over selection so a requester with a pending choice
    /// can still navigate. `awaiting_choice` turns free text into a selection.
    pub fn parse(text: &str, awaiting_choice: bool) -> Self {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix('/') {
            let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            // `/reg@SomeBot` addresses a bot explicitly in group chats.
            let name = head.split('@').next().unwrap_or(head);
            return match name {
                "start" => Command::Start,
                "help" => Command::Help,
                "reg" => Command::Register(args.trim().to_string()),
                _ => Command::Unknown(text.to_string()),
            };
        }

        match text {
            REGISTER_BUTTON => Command::RegisterButton,
            SCHEDULE_BUTTON => Command::GetSchedule,
            HELP_BUTTON => Command::Help,
            _ => {
                if let Some(label) = text.strip_prefix(SELECTION_PREFIX) {
                    Command::Select(label.trim().to_string())
                } else if awaiting_choice {
                    Command::Select(text.to_string())
                } else {
                    Command::Unknown(text.to_string())
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Register(_) => "register",
            Command::RegisterButton => "register_button",
            Command::GetSchedule => "schedule",
            Command::Select(_) => "select",
            Command::Unknown(_) => "unknown",
        }
    }
}
