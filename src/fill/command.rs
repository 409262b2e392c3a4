/// One line of user input, read as a command before it is read as data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play,
    Skip,
    Back,
    /// Trimmed, non-empty value for the current field
    Value(String),
    /// Empty or whitespace-only line - keep whatever is there and move on
    Keep,
}

impl Command {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.to_lowercase().as_str() {
            "p" | "play" => Command::Play,
            "s" => Command::Skip,
            "b" => Command::Back,
            "" => Command::Keep,
            _ => Command::Value(trimmed.to_string()),
        }
    }
}
