// src/frontend/mod.rs

//! User-facing side of the runtime.
//!
//! The runtime never blocks on the user. It hands prompts and output to a
//! [`Frontend`], and the answers come back later as [`RuntimeEvent`]s on the
//! ordinary event channel.
//!
//! - [`terminal`]: non-interactive `run` mode; streams output, prompts with
//!   dialoguer on a blocking thread.
//! - [`repl`]: the interactive `shell`, a line-based command loop.

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Password};
use tracing::debug;

use crate::engine::{Credential, CredentialRequest, RuntimeEvent, SinkUpdate};

pub mod repl;
pub mod terminal;

pub use repl::ReplFrontend;
pub use terminal::TerminalFrontend;

/// Sink for everything the runtime wants to show or ask.
pub trait Frontend: Send {
    /// A line was appended to a tab.
    fn render(&mut self, update: &SinkUpdate);

    /// Answer to a query (job list, tab contents, help, ...).
    fn present(&mut self, text: &str);

    /// Ask for the elevation credential. The answer must arrive as
    /// `CredentialSubmitted` or `CredentialCancelled`.
    fn prompt_credential(&mut self, request: CredentialRequest);

    /// Ask whether to quit with `active` jobs still alive. The answer must
    /// arrive as `ShutdownConfirmed` or `ShutdownAborted`.
    fn confirm_shutdown(&mut self, active: usize);

    /// The last user request has been fully handled.
    fn settle(&mut self) {}

    /// The runtime is stopping.
    fn finish(&mut self) {}
}

/// How a sink line is printed on a plain terminal.
pub fn format_update(update: &SinkUpdate, console_title: &str) -> String {
    if update.title == console_title {
        update.line.clone()
    } else {
        format!("[{}] {}", update.title, update.line)
    }
}

/// Blocking credential prompt. Any prompt failure (EOF, no terminal) counts
/// as a cancellation.
pub fn ask_credential(request: &CredentialRequest) -> RuntimeEvent {
    let theme = ColorfulTheme::default();
    let mut prompt = format!("sudo password for {}", request.scripts.join(", "));
    if request.attempt > 0 {
        prompt.push_str(" (empty input is not accepted; Ctrl-D to cancel)");
    }

    match Password::with_theme(&theme)
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
    {
        Ok(secret) => RuntimeEvent::CredentialSubmitted {
            credential: Credential::new(secret),
        },
        Err(e) => {
            debug!(error = %e, "credential prompt closed");
            RuntimeEvent::CredentialCancelled
        }
    }
}

/// Blocking quit confirmation. Failure to ask counts as "yes".
pub fn ask_confirm_shutdown(active: usize) -> RuntimeEvent {
    let theme = ColorfulTheme::default();
    let answer = Confirm::with_theme(&theme)
        .with_prompt(format!(
            "{active} script(s) still running or queued. Cancel them and quit?"
        ))
        .default(false)
        .interact();

    match answer {
        Ok(true) => RuntimeEvent::ShutdownConfirmed,
        Ok(false) => RuntimeEvent::ShutdownAborted,
        Err(e) => {
            debug!(error = %e, "quit confirmation unavailable; quitting");
            RuntimeEvent::ShutdownConfirmed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TabId;

    #[test]
    fn console_lines_are_printed_bare() {
        let update = SinkUpdate {
            tab: TabId(0),
            title: "Console".into(),
            line: "[INFO] hi".into(),
        };
        assert_eq!(format_update(&update, "Console"), "[INFO] hi");

        let update = SinkUpdate {
            tab: TabId(4),
            title: "backup.sh".into(),
            line: "[OUT] done".into(),
        };
        assert_eq!(format_update(&update, "Console"), "[backup.sh] [OUT] done");
    }
}
