use std::io::{self, BufRead, Write};

use rsre::{HostError, ScriptHost};

const PROMPT: &str = "> ";
const CONTINUATION: &str = "... ";

/// Run an interactive read-eval-print loop on stdin/stdout until EOF or
/// `exit`.
pub fn run(host: &ScriptHost) -> io::Result<()> {
    let stdin = io::stdin();
    run_with(host, stdin.lock(), io::stdout(), io::stderr())
}

/// Read-eval-print loop over arbitrary streams.
///
/// Input is accumulated while brackets are unbalanced, so a function can be
/// typed across several lines.
pub fn run_with<R, W, E>(
    host: &ScriptHost,
    mut input: R,
    mut output: W,
    mut errors: E,
) -> io::Result<()>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { PROMPT } else { CONTINUATION };
        write!(output, "{prompt}")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(());
        }

        if buffer.is_empty() && matches!(line.trim(), "exit" | "quit") {
            return Ok(());
        }

        buffer.push_str(&line);
        if !is_complete(&buffer) {
            continue;
        }

        let source = std::mem::take(&mut buffer);
        if source.trim().is_empty() {
            continue;
        }

        match host.eval(source) {
            Ok(text) => writeln!(output, "{text}")?,
            Err(HostError::Stopped) => {
                writeln!(errors, "{}", HostError::Stopped)?;
                return Ok(());
            }
            Err(e) => writeln!(errors, "{e}")?,
        }
    }
}

/// Whether `source` has no open brackets, ignoring strings and comments
fn is_complete(source: &str) -> bool {
    let mut depth: i32 = 0;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '`' | '\'' => {
                // Skip to the closing quote
                while let Some(inner) = chars.next() {
                    if inner == '\\' {
                        chars.next();
                    } else if inner == c {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }

    depth <= 0
}
