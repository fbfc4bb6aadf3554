//! Menu and JSON collection helpers.

use serde_json::Value;
use tracing::{debug, warn};

use super::{InputError, InputProvider};
use crate::messaging;

/// Outcome of a numbered menu prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    /// Zero-based index of the selected option.
    Selected(usize),
    /// Anything that is not one of the listed numbers.
    Invalid(String),
}

/// Print a numbered menu and read the user's choice.
pub fn choose<I>(input: &mut I, title: &str, options: &[&str]) -> Result<MenuChoice, InputError>
where
    I: InputProvider + ?Sized,
{
    messaging::heading(title);
    for (i, option) in options.iter().enumerate() {
        messaging::info(format!("{}. {}", i + 1, option));
    }

    let answer = input.read_line(&format!("Enter your choice (1-{})", options.len()))?;
    let answer = answer.trim();

    match answer.parse::<usize>() {
        Ok(n) if (1..=options.len()).contains(&n) => Ok(MenuChoice::Selected(n - 1)),
        _ => Ok(MenuChoice::Invalid(answer.to_string())),
    }
}

/// Ask whether to use `default` or a custom JSON object.
///
/// Returns `default` unchanged on choice 1 and the parsed object on choice 2.
/// Malformed JSON and unknown choices yield `None`.
pub fn get_custom_model_details<I>(input: &mut I, default: Value) -> Result<Option<Value>, InputError>
where
    I: InputProvider + ?Sized,
{
    let choice = choose(
        input,
        "Do you want to use the default configuration or provide custom model settings?",
        &["Use default configuration", "Provide custom model settings"],
    )?;

    match choice {
        MenuChoice::Selected(0) => Ok(Some(default)),
        MenuChoice::Selected(_) => {
            messaging::info("Please enter your model details as a JSON object.");
            messaging::info("Example:");
            // Pretty printing a Value cannot fail.
            messaging::info(serde_json::to_string_pretty(&default).unwrap_or_default());
            get_custom_json_input(input)
        }
        MenuChoice::Invalid(raw) => {
            debug!(choice = %raw, "Unrecognized configuration choice");
            messaging::failure("Invalid choice. Aborting model registration.");
            Ok(None)
        }
    }
}

/// Read one line and parse it as JSON. Parse errors yield `None`.
pub fn get_custom_json_input<I>(input: &mut I) -> Result<Option<Value>, InputError>
where
    I: InputProvider + ?Sized,
{
    let raw = input.read_line("Enter your JSON object")?;
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(error = %e, "Rejected custom JSON input");
            messaging::failure(format!("Invalid JSON input: {}", e));
            Ok(None)
        }
    }
}
