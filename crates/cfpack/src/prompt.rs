//! Interactive override conflict prompt.

use camino::Utf8Path;
use cfpack_sync::{ConflictChoice, ConflictResolver};
use colored::Colorize;
use inquire::{validator::Validation, InquireError, Text};

use crate::println_pad;
use crate::utils::print_diff;

const PROMPT: &str = "[s]kip - keep your version | [o]verwrite - replace with downloaded | \
    [r]ename old file by adding .old | [e]xit - cancel and exit";

/// Parse a single-letter answer, case-insensitive.
pub fn parse_choice(input: &str) -> Option<ConflictChoice> {
    match input.trim().to_ascii_lowercase().as_str() {
        "s" | "skip" => Some(ConflictChoice::Skip),
        "o" | "overwrite" => Some(ConflictChoice::Overwrite),
        "r" | "rename" => Some(ConflictChoice::Rename),
        "e" | "exit" => Some(ConflictChoice::Exit),
        _ => None,
    }
}

/// Asks on the terminal. Used when no conflict flag is given.
pub struct ConsolePrompt;

impl ConflictResolver for ConsolePrompt {
    fn resolve(&self, relative_path: &Utf8Path, diff: &str) -> ConflictChoice {
        println!();
        println_pad!("{} {}", "Difference in".bright_yellow().bold(), relative_path);
        print_diff(diff);
        println!();

        let validator = |input: &str| {
            if parse_choice(input).is_some() {
                Ok(Validation::Valid)
            } else {
                Ok(Validation::Invalid(
                    "Please select what to do: [s]kip, [o]verwrite, [r]ename or [e]xit".into(),
                ))
            }
        };

        match Text::new(PROMPT).with_validator(validator).prompt() {
            Ok(answer) => parse_choice(&answer).unwrap_or(ConflictChoice::Exit),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                ConflictChoice::Exit
            }
            Err(e) => {
                tracing::warn!("Unable to read answer ({}), keeping a backup of {}", e, relative_path);
                ConflictChoice::Rename
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("s"), Some(ConflictChoice::Skip));
        assert_eq!(parse_choice(" O "), Some(ConflictChoice::Overwrite));
        assert_eq!(parse_choice("rename"), Some(ConflictChoice::Rename));
        assert_eq!(parse_choice("E"), Some(ConflictChoice::Exit));
        assert_eq!(parse_choice("x"), None);
        assert_eq!(parse_choice(""), None);
    }
}
