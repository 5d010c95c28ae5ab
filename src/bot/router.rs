use std::collections::HashMap;

/// Chat commands understood by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    DecodeTrack,
    Record,
    StopRecord,
    Play,
    Volume,
    Pause,
    Resume,
    Skip,
    Stop,
}

impl Command {
    pub const ALL: [Command; 9] = [
        Command::DecodeTrack,
        Command::Record,
        Command::StopRecord,
        Command::Play,
        Command::Volume,
        Command::Pause,
        Command::Resume,
        Command::Skip,
        Command::Stop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::DecodeTrack => "decodetrack",
            Command::Record => "record",
            Command::StopRecord => "stoprecord",
            Command::Play => "play",
            Command::Volume => "volume",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Skip => "skip",
            Command::Stop => "stop",
        }
    }
}

/// Immutable name → command table, built once at startup.
#[derive(Debug, Clone)]
pub struct CommandTable {
    prefix: String,
    commands: HashMap<&'static str, Command>,
}

impl CommandTable {
    pub fn new(prefix: impl Into<String>) -> Self {
        let commands = Command::ALL
            .iter()
            .map(|command| (command.name(), *command))
            .collect();

        Self {
            prefix: prefix.into(),
            commands,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn lookup(&self, name: &str) -> Option<Command> {
        self.commands.get(name).copied()
    }

    /// Resolves a message into a command and its raw argument string.
    ///
    /// The command token is the text before the first space, lowercased, with
    /// the prefix stripped. The arguments are everything after that first
    /// space, untouched. Bot authors and unknown commands yield `None`.
    pub fn route<'a>(&self, author_is_bot: bool, content: &'a str) -> Option<(Command, &'a str)> {
        if author_is_bot {
            return None;
        }

        let (token, args) = content.split_once(' ').unwrap_or((content, ""));
        let token = token.to_lowercase();
        // Se exige el prefijo exacto; no se corta a ciegas por su longitud
        let name = token.strip_prefix(self.prefix.to_lowercase().as_str())?;

        self.lookup(name).map(|command| (command, args))
    }
}
