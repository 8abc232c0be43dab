//! # Terminal Prompts
//!
//! Narrow seam around operator input. The handshake and archive flows
//! block on passwords and confirmations with no timeout - an operator may
//! take arbitrarily long - so everything interactive goes through the
//! [`Terminal`] trait, and tests drive the flows with a scripted
//! implementation instead of a TTY.

use anyhow::Result;
use std::collections::VecDeque;
use std::io::{BufRead, Write};

/// Operator input abstraction.
pub trait Terminal {
    /// Read a password without echoing it.
    fn read_password(&mut self, prompt: &str) -> Result<String>;

    /// Ask a yes/no question. Returns `true` only on an explicit yes.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;

    /// Read a plain line of input.
    fn read_line(&mut self, prompt: &str) -> Result<String>;
}

/// Prompt for a new password, asking twice and rejecting mismatches.
pub fn read_new_password(terminal: &mut dyn Terminal, what: &str) -> Result<String> {
    let first = terminal.read_password(&format!("Enter {}: ", what))?;
    if first.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    let second = terminal.read_password(&format!("Confirm {}: ", what))?;
    if first != second {
        anyhow::bail!("Passwords do not match");
    }
    Ok(first)
}

/// Real terminal backed by stdin and the platform's password prompt.
pub struct StdTerminal;

impl Terminal for StdTerminal {
    fn read_password(&mut self, prompt: &str) -> Result<String> {
        Ok(rpassword::prompt_password(prompt)?)
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let answer = self.read_line(&format!("{} [y/N]: ", prompt))?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }

    fn read_line(&mut self, prompt: &str) -> Result<String> {
        print!("{}", prompt);
        std::io::stdout().flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Scripted terminal for tests: answers prompts from a fixed queue.
pub struct ScriptedTerminal {
    inputs: VecDeque<String>,
    pub prompts: Vec<String>,
}

impl ScriptedTerminal {
    pub fn new(inputs: &[&str]) -> Self {
        Self {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            prompts: Vec::new(),
        }
    }

    fn next(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        self.inputs
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted terminal ran out of inputs at: {}", prompt))
    }
}

impl Terminal for ScriptedTerminal {
    fn read_password(&mut self, prompt: &str) -> Result<String> {
        self.next(prompt)
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let answer = self.next(prompt)?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }

    fn read_line(&mut self, prompt: &str) -> Result<String> {
        self.next(prompt)
    }
}
