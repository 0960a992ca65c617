//! Operator prompts.
//!
//! Uses dialoguer when attached to a terminal and plain line reads from
//! stdin otherwise, so answers can be piped in.

use std::io::{BufRead, BufReader, IsTerminal};

use anyhow::{bail, Context, Result};
use dialoguer::{Confirm, Input};

use cpd_migrate::{ConfirmationError, ConfirmationPort, Gate, LineConfirmation};

/// Checks if both stdin and stdout are connected to a terminal.
pub fn is_interactive_terminal() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

/// Asks each gate through a dialoguer yes/no prompt.
pub struct TerminalConfirmation;

impl ConfirmationPort for TerminalConfirmation {
    fn confirm(&self, gate: &Gate) -> Result<bool, ConfirmationError> {
        Confirm::new()
            .with_prompt(gate.prompt())
            .default(gate.default_answer())
            .interact()
            .map_err(|e| ConfirmationError(e.to_string()))
    }
}

/// Pick the confirmation port for the current stdin.
pub fn confirmation_port() -> Box<dyn ConfirmationPort> {
    if is_interactive_terminal() {
        Box::new(TerminalConfirmation)
    } else {
        Box::new(LineConfirmation::new(BufReader::new(std::io::stdin())))
    }
}

/// Show the consent URL and read back the authorization code.
pub fn read_authorization_code(url: &str) -> Result<String> {
    println!(
        "Go to the following link in your browser then type the authorization code:\n{}",
        url
    );

    let code = if is_interactive_terminal() {
        Input::<String>::new()
            .with_prompt("Authorization code")
            .interact_text()
            .context("Unable to read authorization code")?
    } else {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Unable to read authorization code")?;
        line
    };

    let code = code.trim().to_string();
    if code.is_empty() {
        bail!("No authorization code entered");
    }
    Ok(code)
}
