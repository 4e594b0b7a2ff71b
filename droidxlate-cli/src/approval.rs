//! Interactive review of each translation before it is merged.

use std::{
    io::{self, BufRead, Write},
    sync::Mutex,
};

use droidxlate::{Approval, Approver, Candidate, language_name};

/// Asks on `output` and reads the answer from `input`.
///
/// An empty answer or anything starting with `y` approves. End of input
/// denies, so nothing unreviewed gets written.
pub struct PromptApprover<R, W> {
    io: Mutex<(R, W)>,
}

impl<R: BufRead, W: Write> PromptApprover<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new((input, output)),
        }
    }
}

pub type StdinApprover = PromptApprover<io::BufReader<io::Stdin>, io::Stderr>;

impl StdinApprover {
    pub fn stdin() -> Self {
        PromptApprover::new(io::BufReader::new(io::stdin()), io::stderr())
    }
}

impl<R, W> Approver for PromptApprover<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn review(&self, candidate: &Candidate<'_>) -> Approval {
        let Ok(mut guard) = self.io.lock() else {
            return Approval::Deny;
        };
        let (input, output) = &mut *guard;
        let asked = writeln!(
            output,
            "\n[{}] {} ({})\n  source:      {}\n  translation: {}",
            candidate.module,
            candidate.id,
            language_name(&candidate.locale.id),
            candidate.source,
            candidate.translation
        )
        .and_then(|()| write!(output, "Accept? [Y/n] "))
        .and_then(|()| output.flush());
        if asked.is_err() {
            return Approval::Deny;
        }

        let mut answer = String::new();
        match input.read_line(&mut answer) {
            Ok(0) | Err(_) => Approval::Deny,
            Ok(_) => {
                let answer = answer.trim().to_ascii_lowercase();
                if answer.is_empty() || answer.starts_with('y') {
                    Approval::Approve
                } else {
                    Approval::Deny
                }
            }
        }
    }
}
