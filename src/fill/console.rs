// Line-oriented terminal I/O for the fill session
// stdin is read on its own thread so Ctrl+C can cut into a blocked prompt

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::{debug, warn};

use super::FillError;

pub trait Console {
    fn print_line(&mut self, text: &str);

    /// Show `prompt` and block until a line, end-of-input or an interrupt arrives
    fn read_line(&mut self, prompt: &str) -> Result<String, FillError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    Eof,
    Interrupt,
}

pub struct TerminalConsole {
    events: Receiver<InputEvent>,
    sender: Sender<InputEvent>,
}

impl TerminalConsole {
    /// Start the stdin reader thread and hand back a console fed by it
    pub fn spawn() -> io::Result<Self> {
        let (sender, events) = mpsc::channel();
        let reader_tx = sender.clone();

        thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || read_stdin(reader_tx))?;
        debug!("stdin reader started");

        Ok(Self { events, sender })
    }

    /// Sender for out-of-band events (the Ctrl+C listener uses this)
    pub fn interrupt_sender(&self) -> Sender<InputEvent> {
        self.sender.clone()
    }
}

fn read_stdin(tx: Sender<InputEvent>) {
    forward_lines(io::stdin().lock(), &tx);
}

/// Send each line as an event, then `Eof`. Bad UTF-8 is replaced, not fatal.
fn forward_lines<R: BufRead>(mut reader: R, tx: &Sender<InputEvent>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                if tx.send(InputEvent::Line(line)).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("stdin read failed, treating as end of input: {}", e);
                break;
            }
        }
    }
    let _ = tx.send(InputEvent::Eof);
}

impl Console for TerminalConsole {
    fn print_line(&mut self, text: &str) {
        println!("{}", text);
    }

    fn read_line(&mut self, prompt: &str) -> Result<String, FillError> {
        let mut stdout = io::stdout();
        let _ = write!(stdout, "{}", prompt);
        let _ = stdout.flush();

        match self.events.recv() {
            Ok(InputEvent::Line(line)) => Ok(line),
            Ok(InputEvent::Interrupt) => Err(FillError::UserCancelled),
            // Every sender gone means nobody can ever type again
            Ok(InputEvent::Eof) | Err(_) => Err(FillError::InputExhausted),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Console fed from a fixed script, records everything shown
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedConsole {
        pub inputs: VecDeque<InputEvent>,
        pub output: Vec<String>,
        pub prompts: Vec<String>,
    }

    impl ScriptedConsole {
        pub fn new(lines: &[&str]) -> Self {
            Self {
                inputs: lines.iter().map(|l| InputEvent::Line(l.to_string())).collect(),
                ..Self::default()
            }
        }

        pub fn then(mut self, event: InputEvent) -> Self {
            self.inputs.push_back(event);
            self
        }

        pub fn printed(&self, text: &str) -> bool {
            self.output.iter().any(|line| line == text)
        }

        pub fn printed_containing(&self, text: &str) -> bool {
            self.output.iter().any(|line| line.contains(text))
        }
    }

    impl Console for ScriptedConsole {
        fn print_line(&mut self, text: &str) {
            self.output.push(text.to_string());
        }

        fn read_line(&mut self, prompt: &str) -> Result<String, FillError> {
            self.prompts.push(prompt.to_string());
            match self.inputs.pop_front() {
                Some(InputEvent::Line(line)) => Ok(line),
                Some(InputEvent::Interrupt) => Err(FillError::UserCancelled),
                Some(InputEvent::Eof) | None => Err(FillError::InputExhausted),
            }
        }
    }

    #[test]
    fn terminal_console_maps_events() {
        let (sender, events) = mpsc::channel();
        let mut console = TerminalConsole { events, sender: sender.clone() };

        sender.send(InputEvent::Line("chill".into())).unwrap();
        sender.send(InputEvent::Interrupt).unwrap();
        sender.send(InputEvent::Eof).unwrap();

        assert_eq!(console.read_line("  mood: ").unwrap(), "chill");
        assert!(matches!(console.read_line("  mood: "), Err(FillError::UserCancelled)));
        assert!(matches!(console.read_line("  mood: "), Err(FillError::InputExhausted)));
    }

    #[test]
    fn invalid_utf8_input_stays_a_line() {
        let (sender, events) = mpsc::channel();
        forward_lines(io::Cursor::new(b"caf\xe9\r\nchill\n".to_vec()), &sender);

        assert_eq!(events.recv().unwrap(), InputEvent::Line("caf\u{fffd}".to_string()));
        assert_eq!(events.recv().unwrap(), InputEvent::Line("chill".to_string()));
        assert_eq!(events.recv().unwrap(), InputEvent::Eof);
    }

    #[test]
    fn last_line_without_newline_is_kept() {
        let (sender, events) = mpsc::channel();
        forward_lines(io::Cursor::new(b"happy".to_vec()), &sender);

        assert_eq!(events.recv().unwrap(), InputEvent::Line("happy".to_string()));
        assert_eq!(events.recv().unwrap(), InputEvent::Eof);
    }

    #[test]
    fn interrupt_sender_reaches_the_console() {
        let (sender, events) = mpsc::channel();
        let mut console = TerminalConsole { events, sender };

        console.interrupt_sender().send(InputEvent::Interrupt).unwrap();
        assert!(matches!(console.read_line(""), Err(FillError::UserCancelled)));
    }
}
