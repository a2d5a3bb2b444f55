// {{{ Copyright (c) Paul R. Tagliamonte <paultag@debian.org>, 2024
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE. }}}

//! The `Status` field and trigger-state enums/structs.

use std::str::FromStr;

/// What the administrator wants done with a package (`Status` field's first
/// token).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Want {
    /// `unknown`
    Unknown,
    /// `install`
    Install,
    /// `hold`
    Hold,
    /// `deinstall`
    Deinstall,
    /// `purge`
    Purge,
}

/// Error state flag (`Status` field's second token).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EFlag {
    /// `ok`
    Ok,
    /// `reinstreq`
    Reinstreq,
}

/// Installation-state machine (`Status` field's third token).
///
/// Transitions flow `NotInstalled -> ConfigFiles -> HalfInstalled ->
/// Unpacked -> HalfConfigured -> TriggersAwaited -> TriggersPending ->
/// Installed`, though not every step is visited on every install.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    /// `not-installed`
    NotInstalled,
    /// `config-files`
    ConfigFiles,
    /// `half-installed`
    HalfInstalled,
    /// `unpacked`
    Unpacked,
    /// `half-configured`
    HalfConfigured,
    /// `triggers-awaited`
    TriggersAwaited,
    /// `triggers-pending`
    TriggersPending,
    /// `installed`
    Installed,
}

impl Status {
    /// `true` for the five statuses the design says must never have
    /// awaited triggers.
    pub fn forbids_triggers_awaited(self) -> bool {
        matches!(
            self,
            Status::NotInstalled
                | Status::ConfigFiles
                | Status::HalfInstalled
                | Status::Unpacked
                | Status::HalfConfigured
        )
    }

    /// `true` if a `Config-Version` field is forbidden for this status
    /// (the version is instead derived from the current version, or from
    /// the absence of one).
    pub fn forbids_config_version(self) -> bool {
        matches!(self, Status::Installed | Status::NotInstalled)
    }
}

macro_rules! token_enum {
    ($ty:ident { $( $variant:ident => $text:expr ),+ $(,)? }) => {
        impl $ty {
            /// Canonical lowercase token as written in the `Status` field.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $ty::$variant => $text, )+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Error> {
                Ok(match s {
                    $( $text => $ty::$variant, )+
                    _ => return Err(Error::UnknownToken(s.to_owned())),
                })
            }
        }
    };
}

token_enum!(Want {
    Unknown => "unknown",
    Install => "install",
    Hold => "hold",
    Deinstall => "deinstall",
    Purge => "purge",
});

token_enum!(EFlag {
    Ok => "ok",
    Reinstreq => "reinstreq",
});

token_enum!(Status {
    NotInstalled => "not-installed",
    ConfigFiles => "config-files",
    HalfInstalled => "half-installed",
    Unpacked => "unpacked",
    HalfConfigured => "half-configured",
    TriggersAwaited => "triggers-awaited",
    TriggersPending => "triggers-pending",
    Installed => "installed",
});

/// Error conditions parsing a `Status` field or one of its three tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// One of the three tokens wasn't a recognized keyword.
    UnknownToken(String),
    /// The field didn't have exactly three space-separated tokens.
    WrongTokenCount(usize),
    /// A package in `triggers-awaited` had an empty awaited-trigger list.
    EmptyAwaited,
    /// A package in `triggers-pending` had an empty pending-trigger list,
    /// or a non-empty awaited-trigger list.
    InvalidPendingState,
    /// A package outside the trigger states had a non-empty awaited list.
    TriggersAwaitedNotAllowed,
}
crate::errors::error_enum!(Error);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownToken(t) => write!(f, "unknown status token {:?}", t),
            Error::WrongTokenCount(n) => {
                write!(f, "Status field must have 3 tokens, found {}", n)
            }
            Error::EmptyAwaited => write!(f, "triggers-awaited package has no awaiters"),
            Error::InvalidPendingState => {
                write!(f, "triggers-pending package must have pending triggers and no awaiters")
            }
            Error::TriggersAwaitedNotAllowed => {
                write!(f, "package status forbids a non-empty trigger-awaited list")
            }
        }
    }
}

/// The full parsed `Status` field: want/eflag/status triple.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatusField {
    /// What the admin wants done with this package.
    pub want: Want,
    /// Error-state flag.
    pub eflag: EFlag,
    /// Installation-state.
    pub status: Status,
}

impl std::fmt::Display for StatusField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.want, self.eflag, self.status)
    }
}

impl FromStr for StatusField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        if tokens.len() != 3 {
            return Err(Error::WrongTokenCount(tokens.len()));
        }
        Ok(StatusField {
            want: tokens[0].parse()?,
            eflag: tokens[1].parse()?,
            status: tokens[2].parse()?,
        })
    }
}

/// Pending/awaited trigger bookkeeping for one package.
///
/// Invariants (checked by [`TriggerState::check`]):
/// - A package whose [`Status`] forbids awaited triggers must have an empty
///   `awaited` list.
/// - A package in [`Status::TriggersAwaited`] must have a non-empty
///   `awaited` list.
/// - A package in [`Status::TriggersPending`] must have a non-empty
///   `pending` list and an empty `awaited` list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TriggerState {
    /// Trigger names this package has pending for itself to process.
    pub pending: Vec<String>,
    /// Package names this package is waiting on to process a trigger.
    pub awaited: Vec<String>,
}

impl TriggerState {
    /// Validate this trigger state against a package's [`Status`].
    pub fn check(&self, status: Status) -> Result<(), Error> {
        if status.forbids_triggers_awaited() && !self.awaited.is_empty() {
            return Err(Error::TriggersAwaitedNotAllowed);
        }
        match status {
            Status::TriggersAwaited if self.awaited.is_empty() => Err(Error::EmptyAwaited),
            Status::TriggersPending if self.pending.is_empty() || !self.awaited.is_empty() => {
                Err(Error::InvalidPendingState)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_status_field() {
        let sf: StatusField = "install ok installed".parse().unwrap();
        assert_eq!(Want::Install, sf.want);
        assert_eq!(EFlag::Ok, sf.eflag);
        assert_eq!(Status::Installed, sf.status);
    }

    #[test]
    fn render_status_field() {
        let sf = StatusField {
            want: Want::Deinstall,
            eflag: EFlag::Reinstreq,
            status: Status::HalfInstalled,
        };
        assert_eq!("deinstall reinstreq half-installed", sf.to_string());
    }

    #[test]
    fn wrong_token_count() {
        assert_eq!(
            Error::WrongTokenCount(2),
            "install ok".parse::<StatusField>().unwrap_err()
        );
    }

    #[test]
    fn unknown_token() {
        assert!(matches!(
            "install ok bogus".parse::<StatusField>(),
            Err(Error::UnknownToken(_))
        ));
    }

    #[test]
    fn trigger_state_forbidden_awaited() {
        let ts = TriggerState {
            pending: vec![],
            awaited: vec!["libc6".to_owned()],
        };
        assert_eq!(
            Error::TriggersAwaitedNotAllowed,
            ts.check(Status::Unpacked).unwrap_err()
        );
    }

    #[test]
    fn trigger_state_awaited_requires_nonempty() {
        let ts = TriggerState::default();
        assert_eq!(Error::EmptyAwaited, ts.check(Status::TriggersAwaited).unwrap_err());
    }

    #[test]
    fn trigger_state_pending_requires_pending_and_no_awaited() {
        let ts = TriggerState {
            pending: vec![],
            awaited: vec![],
        };
        assert_eq!(
            Error::InvalidPendingState,
            ts.check(Status::TriggersPending).unwrap_err()
        );

        let ok = TriggerState {
            pending: vec!["interest".to_owned()],
            awaited: vec![],
        };
        assert!(ok.check(Status::TriggersPending).is_ok());
    }
}

// vim: foldmethod=marker
