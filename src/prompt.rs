use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{bail, Context, Result};

/// Print `question` and read one line from stdin, without the newline.
pub fn prompt_line(question: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{question}")?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Password from `NORTHBASE_PASSWORD`, or read from the terminal with echo off.
pub fn prompt_password(question: &str) -> Result<String> {
    if let Ok(password) = std::env::var("NORTHBASE_PASSWORD") {
        return Ok(password);
    }
    if !io::stdin().is_terminal() {
        bail!("`northbase login` requires an interactive terminal (stdin is not a TTY) or NORTHBASE_PASSWORD");
    }
    rpassword::prompt_password(question).context("failed to read password")
}
