// src/engine/elevation.rs

//! Elevation credential flow.
//!
//! ```text
//! NoCredential --first sudo launch--> AwaitingInput --non-empty--> Validated
//!      ^                                |   ^    |                     |
//!      |                         cancel |   +----+ empty input         | consumed
//!      +--------------------------------+          (prompt stays open) | (no cache)
//!      +---------------------------------------------------------------+
//! ```
//!
//! Launch requests that need elevation while a prompt is open wait here and
//! are released (or aborted) together when the prompt is answered. The
//! credential lives only in memory and is wiped on drop.

use std::collections::VecDeque;
use std::fmt;

use tracing::debug;
use zeroize::Zeroizing;

/// Secret collected from the user. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// How a job is elevated when it is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Elevation {
    /// Run the script directly.
    None,
    /// Run through the elevation program. With a credential it is written to
    /// the child's stdin; without one the program must already hold a valid
    /// session and must not prompt.
    Sudo { credential: Option<Credential> },
}

/// Proof of elevation held while `Validated`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Grant {
    Password(Credential),
    /// The elevation program already had a valid session.
    Session,
}

impl Grant {
    fn to_elevation(&self) -> Elevation {
        match self {
            Grant::Password(c) => Elevation::Sudo {
                credential: Some(c.clone()),
            },
            Grant::Session => Elevation::Sudo { credential: None },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElevationState {
    NoCredential,
    /// A prompt is pending. `prompt_open` is false while the session probe
    /// is still running.
    AwaitingInput { prompt_open: bool, attempts: u32 },
    Validated,
}

/// What the caller should do after asking for elevation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElevationStep {
    /// Launch now with this elevation.
    Ready(Elevation),
    /// First request: check for an existing session, then prompt.
    Probe,
    /// A prompt is already pending; the request has been parked.
    Waiting,
}

/// Outcome of an answer to the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome<T> {
    /// Empty input. Nothing launched; the prompt stays open.
    Rejected,
    /// Parked requests, each paired with the elevation to launch it with.
    Released(Vec<(T, Elevation)>),
    /// No prompt was pending.
    Ignored,
}

#[derive(Debug)]
pub struct ElevationFlow<T> {
    grant: Option<Grant>,
    state: ElevationState,
    cache: bool,
    waiting: VecDeque<T>,
}

impl<T> ElevationFlow<T> {
    /// `cache` keeps a validated credential for the rest of the session.
    pub fn new(cache: bool) -> Self {
        Self {
            grant: None,
            state: ElevationState::NoCredential,
            cache,
            waiting: VecDeque::new(),
        }
    }

    pub fn state(&self) -> &ElevationState {
        &self.state
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, ElevationState::AwaitingInput { .. })
    }

    pub fn waiting(&self) -> impl Iterator<Item = &T> {
        self.waiting.iter()
    }

    /// Ask for elevation on behalf of `request`.
    pub fn begin(&mut self, request: T) -> ElevationStep {
        match self.state {
            ElevationState::Validated => match &self.grant {
                Some(grant) => {
                    let elevation = grant.to_elevation();
                    if !self.cache {
                        self.consume();
                    }
                    ElevationStep::Ready(elevation)
                }
                None => {
                    self.state = ElevationState::NoCredential;
                    self.begin(request)
                }
            },
            ElevationState::AwaitingInput { .. } => {
                self.waiting.push_back(request);
                ElevationStep::Waiting
            }
            ElevationState::NoCredential => {
                self.waiting.push_back(request);
                self.state = ElevationState::AwaitingInput {
                    prompt_open: false,
                    attempts: 0,
                };
                ElevationStep::Probe
            }
        }
    }

    /// Session probe answered. Returns the released requests when a session
    /// already exists, or `None` if the prompt must now be opened.
    pub fn probed(&mut self, authorized: bool) -> Option<Vec<(T, Elevation)>> {
        if !self.is_awaiting() {
            return Some(Vec::new());
        }
        if authorized {
            debug!("elevation session already valid; skipping prompt");
            Some(self.validate(Grant::Session))
        } else {
            self.state = ElevationState::AwaitingInput {
                prompt_open: true,
                attempts: 0,
            };
            None
        }
    }

    /// The user confirmed the prompt with `input`.
    pub fn submit(&mut self, input: Credential) -> SubmitOutcome<T> {
        let ElevationState::AwaitingInput { attempts, .. } = self.state else {
            return SubmitOutcome::Ignored;
        };
        if input.is_empty() {
            self.state = ElevationState::AwaitingInput {
                prompt_open: true,
                attempts: attempts + 1,
            };
            return SubmitOutcome::Rejected;
        }
        SubmitOutcome::Released(self.validate(Grant::Password(input)))
    }

    /// The user cancelled the prompt. Returns the aborted requests.
    pub fn cancel(&mut self) -> Vec<T> {
        if !self.is_awaiting() {
            return Vec::new();
        }
        self.state = ElevationState::NoCredential;
        self.grant = None;
        self.waiting.drain(..).collect()
    }

    fn validate(&mut self, grant: Grant) -> Vec<(T, Elevation)> {
        let elevation = grant.to_elevation();
        let released: Vec<(T, Elevation)> = self
            .waiting
            .drain(..)
            .map(|req| (req, elevation.clone()))
            .collect();

        if self.cache {
            self.grant = Some(grant);
            self.state = ElevationState::Validated;
        } else {
            self.consume();
        }
        released
    }

    fn consume(&mut self) {
        self.grant = None;
        self.state = ElevationState::NoCredential;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_keeps_prompt_open() {
        let mut flow = ElevationFlow::new(true);
        assert_eq!(flow.begin("a"), ElevationStep::Probe);
        assert_eq!(flow.probed(false), None);

        assert_eq!(flow.submit(Credential::new("")), SubmitOutcome::Rejected);
        assert_eq!(
            flow.state(),
            &ElevationState::AwaitingInput { prompt_open: true, attempts: 1 }
        );
        assert_eq!(flow.waiting().count(), 1);
    }

    #[test]
    fn validated_credential_releases_all_waiters_and_is_cached() {
        let mut flow = ElevationFlow::new(true);
        flow.begin("a");
        assert_eq!(flow.begin("b"), ElevationStep::Waiting);
        flow.probed(false);

        let SubmitOutcome::Released(released) = flow.submit(Credential::new("pw")) else {
            panic!("expected release");
        };
        assert_eq!(released.len(), 2);
        assert_eq!(flow.state(), &ElevationState::Validated);

        let expected = Elevation::Sudo { credential: Some(Credential::new("pw")) };
        assert_eq!(flow.begin("c"), ElevationStep::Ready(expected));
    }

    #[test]
    fn uncached_credential_is_consumed() {
        let mut flow = ElevationFlow::new(false);
        flow.begin("a");
        flow.probed(false);
        assert!(matches!(flow.submit(Credential::new("pw")), SubmitOutcome::Released(_)));
        assert_eq!(flow.state(), &ElevationState::NoCredential);
        assert_eq!(flow.begin("b"), ElevationStep::Probe);
    }

    #[test]
    fn cancel_aborts_every_waiter() {
        let mut flow = ElevationFlow::new(true);
        flow.begin(1);
        flow.begin(2);
        assert_eq!(flow.cancel(), vec![1, 2]);
        assert_eq!(flow.state(), &ElevationState::NoCredential);
    }

    #[test]
    fn successful_probe_skips_prompt() {
        let mut flow = ElevationFlow::new(true);
        flow.begin("a");
        let released = flow.probed(true).unwrap();
        assert_eq!(released, vec![("a", Elevation::Sudo { credential: None })]);
    }

    #[test]
    fn debug_never_prints_secret() {
        assert_eq!(format!("{:?}", Credential::new("hunter2")), "Credential(***)");
    }
}
