//! Interactive input.
//!
//! All prompting goes through [`InputProvider`] so registration flows can be
//! driven from a terminal or from a script of canned answers.

mod collector;

pub use collector::{choose, get_custom_json_input, get_custom_model_details, MenuChoice};

use dialoguer::{theme::ColorfulTheme, Input, Password};
use std::collections::VecDeque;
use thiserror::Error;

/// Error type for input operations.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read input: {0}")]
    Dialog(#[from] dialoguer::Error),

    #[error("No more scripted input (prompt: {0})")]
    Exhausted(String),
}

/// Source of interactive answers.
pub trait InputProvider {
    /// Read one line of text for the given prompt.
    fn read_line(&mut self, prompt: &str) -> Result<String, InputError>;

    /// Read a value that should not be echoed. Defaults to [`read_line`].
    ///
    /// [`read_line`]: InputProvider::read_line
    fn read_secret(&mut self, prompt: &str) -> Result<String, InputError> {
        self.read_line(prompt)
    }

    /// Read a line, falling back to `default` when the answer is blank.
    fn read_line_or(&mut self, prompt: &str, default: &str) -> Result<String, InputError> {
        let answer = self.read_line(&format!("{} [{}]", prompt, default))?;
        let answer = answer.trim();
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer.to_string())
        }
    }
}

impl<T: InputProvider + ?Sized> InputProvider for &mut T {
    fn read_line(&mut self, prompt: &str) -> Result<String, InputError> {
        (**self).read_line(prompt)
    }

    fn read_secret(&mut self, prompt: &str) -> Result<String, InputError> {
        (**self).read_secret(prompt)
    }
}

/// Terminal input backed by `dialoguer`.
pub struct TerminalInput {
    theme: ColorfulTheme,
}

impl TerminalInput {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputProvider for TerminalInput {
    fn read_line(&mut self, prompt: &str) -> Result<String, InputError> {
        let answer: String = Input::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(answer)
    }

    fn read_secret(&mut self, prompt: &str) -> Result<String, InputError> {
        let answer = Password::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()?;
        Ok(answer)
    }
}

/// Replays a fixed list of answers in order.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    answers: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Prompts seen so far, in order.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl InputProvider for ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> Result<String, InputError> {
        self.prompts.push(prompt.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| InputError::Exhausted(prompt.to_string()))
    }
}
