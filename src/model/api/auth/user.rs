use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

/// A kind of caller of our application, having defined rights.
///
/// Callers are registered and signed in by the external identity service;
/// we only ever see the IDs and rights in their tokens.
pub trait User {
    /// The rights of this user type.
    const RIGHTS: Rights;
}

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
            }
        )
    }
}

/// Marker for tokens held by election administrators.
#[derive(Debug, Clone, Copy)]
pub struct Admin;

/// Marker for tokens held by registered, verified voters.
#[derive(Debug, Clone, Copy)]
pub struct Voter;

impl User for Voter {
    const RIGHTS: Rights = Rights::Voter;
}

impl User for Admin {
    const RIGHTS: Rights = Rights::Admin;
}
