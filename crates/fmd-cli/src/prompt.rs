//! Interactive prompts.

use anyhow::{Context, Result};
use std::io::{self, Write};
use zeroize::Zeroizing;

/// Prompt for a secret without echoing it.
///
/// The returned buffer is wiped when dropped.
pub fn prompt_secret(prompt: &str) -> Result<Zeroizing<String>> {
    rpassword::prompt_password(prompt)
        .map(Zeroizing::new)
        .context("Failed to read input")
}

/// Prompt for a line of visible input.
pub fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// True only if the user types `expected` exactly.
pub fn confirm_phrase(prompt: &str, expected: &str) -> Result<bool> {
    Ok(prompt_line(prompt)? == expected)
}
