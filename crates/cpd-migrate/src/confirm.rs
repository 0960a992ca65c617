//! Confirmation gates before destructive calls.

use std::collections::VecDeque;
use std::fmt;
use std::io::BufRead;

use parking_lot::Mutex;
use thiserror::Error;

/// A yes/no decision point in the migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// The customer's primary domain already equals the target.
    DomainAlreadyCurrent { customer_id: String, domain: String },
    /// About to swap the customer's primary domain.
    UpdateDomain {
        customer_id: String,
        from: String,
        to: String,
    },
}

impl Gate {
    pub fn name(&self) -> &'static str {
        match self {
            Gate::DomainAlreadyCurrent { .. } => "domain-already-current",
            Gate::UpdateDomain { .. } => "update-domain",
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            Gate::DomainAlreadyCurrent { customer_id, domain } => format!(
                "Primary domain for customer Id {} is already {}, continue checking users and groups?",
                customer_id, domain
            ),
            Gate::UpdateDomain { customer_id, from, to } => format!(
                "About to update customer Id {} primary domain from {} to {}, continue?",
                customer_id, from, to
            ),
        }
    }

    /// Answer assumed when the operator just presses enter.
    pub fn default_answer(&self) -> bool {
        matches!(self, Gate::DomainAlreadyCurrent { .. })
    }

    /// Interpret a typed answer.
    ///
    /// Re-checking an already migrated domain continues unless the answer is
    /// "n"; the domain swap proceeds only on "y".
    pub fn accepts(&self, answer: &str) -> bool {
        let answer = answer.trim();
        match self {
            Gate::DomainAlreadyCurrent { .. } => !answer.eq_ignore_ascii_case("n"),
            Gate::UpdateDomain { .. } => answer.eq_ignore_ascii_case("y"),
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The operator's answer could not be read.
#[derive(Debug, Clone, Error)]
#[error("Unable to read response: {0}")]
pub struct ConfirmationError(pub String);

/// Capability to ask the operator a yes/no question.
pub trait ConfirmationPort: Send + Sync {
    fn confirm(&self, gate: &Gate) -> Result<bool, ConfirmationError>;
}

/// Reads one whitespace-delimited answer per gate from a line source.
pub struct LineConfirmation<R> {
    input: Mutex<R>,
}

impl<R: BufRead + Send> LineConfirmation<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }
}

impl<R: BufRead + Send> ConfirmationPort for LineConfirmation<R> {
    fn confirm(&self, gate: &Gate) -> Result<bool, ConfirmationError> {
        println!("{} (y/n): ", gate.prompt());

        let mut input = self.input.lock();
        loop {
            let mut line = String::new();
            let read = input
                .read_line(&mut line)
                .map_err(|e| ConfirmationError(e.to_string()))?;
            if read == 0 {
                return Err(ConfirmationError("unexpected end of input".to_string()));
            }
            if let Some(token) = line.split_whitespace().next() {
                return Ok(gate.accepts(token));
            }
        }
    }
}

/// Canned answers, consumed in order. Running out is a read failure.
#[derive(Debug, Default)]
pub struct ScriptedConfirmation {
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<Gate>>,
}

impl ScriptedConfirmation {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Gates presented so far.
    pub fn asked(&self) -> Vec<Gate> {
        self.asked.lock().clone()
    }
}

impl ConfirmationPort for ScriptedConfirmation {
    fn confirm(&self, gate: &Gate) -> Result<bool, ConfirmationError> {
        self.asked.lock().push(gate.clone());
        self.answers
            .lock()
            .pop_front()
            .ok_or_else(|| ConfirmationError("no scripted answer left".to_string()))
    }
}
