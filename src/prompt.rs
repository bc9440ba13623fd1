//! Confirmation prompts for destructive commands.

use std::io::{BufRead, IsTerminal, Write};

/// Asks the user to confirm something.
pub trait Confirm {
    /// `Some(answer)`, or `None` when nobody can be asked.
    fn confirm(&self, question: &str) -> Option<bool>;
}

/// Prompts on the terminal; `assume_yes` answers for the user.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt {
    pub assume_yes: bool,
}

impl Confirm for TerminalPrompt {
    fn confirm(&self, question: &str) -> Option<bool> {
        if self.assume_yes {
            return Some(true);
        }
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return None;
        }
        eprint!("{} [y/N] ", question);
        let _ = std::io::stderr().flush();
        let mut answer = String::new();
        stdin.lock().read_line(&mut answer).ok()?;
        Some(is_yes(&answer))
    }
}

/// A fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct Answer(pub Option<bool>);

impl Confirm for Answer {
    fn confirm(&self, _: &str) -> Option<bool> {
        self.0
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
