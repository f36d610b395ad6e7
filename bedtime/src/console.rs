//! Prompted line input.

use std::io::{self, BufRead, StdinLock, Stdout, Write};

/// Reads answers to prompts, one line each.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Show `prompt` and read one trimmed line. `None` at end of input.
    pub fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask a yes/no question. Anything but `y`/`yes` is no.
    pub fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        Ok(self
            .ask(prompt)?
            .is_some_and(|answer| matches!(answer.to_lowercase().as_str(), "y" | "yes")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console(input: &str) -> Console<&[u8], Vec<u8>> {
        Console::new(input.as_bytes(), Vec::new())
    }

    #[test]
    fn test_ask_trims_and_echoes_prompt() {
        let mut c = console("  a brave dragon \n");
        assert_eq!(c.ask("Idea: ").unwrap(), Some("a brave dragon".to_string()));
        assert_eq!(String::from_utf8(c.output).unwrap(), "Idea: ");
    }

    #[test]
    fn test_ask_at_eof() {
        let mut c = console("");
        assert_eq!(c.ask("Idea: ").unwrap(), None);
    }

    #[test]
    fn test_confirm() {
        let mut c = console("YES\nn\n");
        assert!(c.confirm("? ").unwrap());
        assert!(!c.confirm("? ").unwrap());
        assert!(!c.confirm("? ").unwrap());
    }
}
