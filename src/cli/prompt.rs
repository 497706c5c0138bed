//! Interactive input for fields not supplied on the command line.

use crate::core::error::{CrmError, CrmResult};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{self, BufRead, IsTerminal, Write};

pub trait Prompter {
    fn ask(&mut self, label: &str) -> CrmResult<String>;

    /// Same as [`Prompter::ask`]; implementations may hide the echo.
    fn ask_secret(&mut self, label: &str) -> CrmResult<String>;

    fn confirm(&mut self, question: &str) -> CrmResult<bool> {
        let answer = self.ask(&format!("{question} [o/N]"))?;
        Ok(is_affirmative(&answer))
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "oui" | "o" | "yes" | "y"
    )
}

/// Line-based prompter over any reader/writer pair.
pub struct StdinPrompter<R, W> {
    input: R,
    output: W,
    hide_secrets: bool,
}

impl StdinPrompter<io::StdinLock<'static>, io::Stderr> {
    /// Questions go to stderr so stdout carries only command results.
    /// Secrets are read without echo when stdin is a terminal.
    pub fn stdio() -> Self {
        let stdin = io::stdin();
        let hide_secrets = stdin.is_terminal();
        Self {
            input: stdin.lock(),
            output: io::stderr(),
            hide_secrets,
        }
    }
}

impl<R: BufRead, W: Write> StdinPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            hide_secrets: false,
        }
    }

    fn read_line(&mut self, label: &str) -> CrmResult<String> {
        write!(self.output, "{label}: ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(CrmError::invalid(label, "no input provided"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl<R: BufRead, W: Write> Prompter for StdinPrompter<R, W> {
    fn ask(&mut self, label: &str) -> CrmResult<String> {
        self.read_line(label)
    }

    fn ask_secret(&mut self, label: &str) -> CrmResult<String> {
        if !self.hide_secrets {
            return self.read_line(label);
        }
        write!(self.output, "{label}: ")?;
        self.output.flush()?;
        terminal::enable_raw_mode()?;
        let secret = read_hidden();
        terminal::disable_raw_mode()?;
        writeln!(self.output)?;
        secret
    }
}

/// Collects key presses until Enter. Raw mode must be on.
fn read_hidden() -> CrmResult<String> {
    let mut secret = String::new();
    loop {
        if let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event::read()?
        {
            match code {
                KeyCode::Enter => return Ok(secret),
                KeyCode::Backspace => {
                    secret.pop();
                }
                KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                    return Err(CrmError::invalid("password", "input cancelled"));
                }
                KeyCode::Esc => return Err(CrmError::invalid("password", "input cancelled")),
                KeyCode::Char(c) => secret.push(c),
                _ => {}
            }
        }
    }
}

/// Prompter that answers from a fixed script, for non-interactive runs.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: std::collections::VecDeque<String>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, label: &str) -> CrmResult<String> {
        self.asked.push(label.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| CrmError::invalid(label, "no input provided"))
    }

    fn ask_secret(&mut self, label: &str) -> CrmResult<String> {
        self.ask(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_one_line_per_question() {
        let mut out = Vec::new();
        let mut prompter = StdinPrompter::new(Cursor::new("Jeanne\r\nd'Arc\n"), &mut out);
        assert_eq!(prompter.ask("First name").expect("answer"), "Jeanne");
        assert_eq!(prompter.ask("Last name").expect("answer"), "d'Arc");
        assert!(matches!(
            prompter.ask("Email"),
            Err(CrmError::InvalidValue { .. })
        ));
        drop(prompter);
        assert!(String::from_utf8(out).expect("utf8").starts_with("First name: "));
    }

    #[test]
    fn test_confirmation_vocabulary() {
        for yes in ["oui", "O", "yes", " y "] {
            assert!(is_affirmative(yes), "{yes}");
        }
        for no in ["", "non", "n", "nope", "1"] {
            assert!(!is_affirmative(no), "{no}");
        }
        let mut prompter = ScriptedPrompter::new(["non"]);
        assert!(!prompter.confirm("Delete?").expect("answer"));
        assert_eq!(prompter.asked, vec!["Delete? [o/N]"]);
    }
}
