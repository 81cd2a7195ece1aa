//! Keyed lookup tables from user-facing strings to remote enumerations.
//!
//! Every vocabulary is a fixed table built once per process and read-only
//! afterwards. Lookup is an exact, case-sensitive match; input that matches
//! nothing resolves to the enumeration's zero value (`Unset`), never to an
//! error. Callers that want to reject unknown input validate first with
//! [`check`].

use crate::types::{
    AuthAlgorithm, ContainerType, EncapsulationMode, EncryptionAlgorithm, Pfs, SecretType,
    TransformProtocol,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VocabError {
    #[error("unknown {kind} '{value}', expected one of: {accepted}")]
    Unknown {
        kind: &'static str,
        value: String,
        accepted: String,
    },
    #[error("unknown vocabulary '{0}'")]
    UnknownKind(String),
}

/// An immutable input-string to value table for one enumeration.
pub struct VocabTable<T: 'static> {
    kind: &'static str,
    entries: HashMap<&'static str, T>,
    accepted: Vec<&'static str>,
}

impl<T: Copy + Default> VocabTable<T> {
    pub fn new(kind: &'static str, pairs: &[(&'static str, T)]) -> Self {
        Self {
            kind,
            entries: pairs.iter().copied().collect(),
            accepted: pairs.iter().map(|(input, _)| *input).collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Exact lookup; unmatched input yields `T::default()`.
    pub fn lookup(&self, input: &str) -> T {
        self.get(input).unwrap_or_default()
    }

    pub fn get(&self, input: &str) -> Option<T> {
        self.entries.get(input).copied()
    }

    pub fn contains(&self, input: &str) -> bool {
        self.entries.contains_key(input)
    }

    /// Accepted inputs in declaration order.
    pub fn accepted(&self) -> &[&'static str] {
        &self.accepted
    }
}

/// An enumeration with a process-wide vocabulary table.
pub trait Vocabulary: Copy + Default + 'static {
    const KIND: &'static str;

    fn table() -> &'static VocabTable<Self>;
}

/// Map a user-facing string to its enumeration value, falling back to the
/// zero value.
pub fn map<T: Vocabulary>(input: &str) -> T {
    T::table().lookup(input)
}

/// Strict variant of [`map`] for validation. The empty string is accepted
/// and means "unset".
pub fn check<T: Vocabulary>(input: &str) -> Result<T, VocabError> {
    if input.is_empty() {
        return Ok(T::default());
    }
    let table = T::table();
    table.get(input).ok_or_else(|| VocabError::Unknown {
        kind: table.kind(),
        value: input.to_owned(),
        accepted: table.accepted().join(", "),
    })
}

/// Which auth-algorithm table to use.
///
/// `Legacy` reproduces the historical mapping where `sha512` was sent to
/// the remote as `sha384`. Only records created under that mapping need it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingCompat {
    #[default]
    Current,
    Legacy,
}

static LEGACY_AUTH_ALGORITHM: Lazy<VocabTable<AuthAlgorithm>> = Lazy::new(|| {
    VocabTable::new(
        AuthAlgorithm::KIND,
        &[
            ("sha1", AuthAlgorithm::Sha1),
            ("sha256", AuthAlgorithm::Sha256),
            ("sha384", AuthAlgorithm::Sha384),
            ("sha512", AuthAlgorithm::Sha384),
        ],
    )
});

pub fn map_auth_algorithm(input: &str, compat: MappingCompat) -> AuthAlgorithm {
    match compat {
        MappingCompat::Current => map(input),
        MappingCompat::Legacy => LEGACY_AUTH_ALGORITHM.lookup(input),
    }
}

/// Runtime handle on a vocabulary, for callers that pick the table by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocabKind {
    SecretType,
    ContainerType,
    AuthAlgorithm,
    EncryptionAlgorithm,
    Pfs,
    EncapsulationMode,
    TransformProtocol,
}

impl VocabKind {
    pub const ALL: [VocabKind; 7] = [
        VocabKind::SecretType,
        VocabKind::ContainerType,
        VocabKind::AuthAlgorithm,
        VocabKind::EncryptionAlgorithm,
        VocabKind::Pfs,
        VocabKind::EncapsulationMode,
        VocabKind::TransformProtocol,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VocabKind::SecretType => SecretType::KIND,
            VocabKind::ContainerType => ContainerType::KIND,
            VocabKind::AuthAlgorithm => AuthAlgorithm::KIND,
            VocabKind::EncryptionAlgorithm => EncryptionAlgorithm::KIND,
            VocabKind::Pfs => Pfs::KIND,
            VocabKind::EncapsulationMode => EncapsulationMode::KIND,
            VocabKind::TransformProtocol => TransformProtocol::KIND,
        }
    }

    pub fn from_name(name: &str) -> Result<Self, VocabError> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == name)
            .ok_or_else(|| VocabError::UnknownKind(name.to_owned()))
    }

    pub fn accepted(self) -> &'static [&'static str] {
        match self {
            VocabKind::SecretType => SecretType::table().accepted(),
            VocabKind::ContainerType => ContainerType::table().accepted(),
            VocabKind::AuthAlgorithm => AuthAlgorithm::table().accepted(),
            VocabKind::EncryptionAlgorithm => EncryptionAlgorithm::table().accepted(),
            VocabKind::Pfs => Pfs::table().accepted(),
            VocabKind::EncapsulationMode => EncapsulationMode::table().accepted(),
            VocabKind::TransformProtocol => TransformProtocol::table().accepted(),
        }
    }

    /// Map `input` through this vocabulary and return the wire value that
    /// would be sent. Unmatched input yields `""`.
    pub fn resolve(self, input: &str, compat: MappingCompat) -> &'static str {
        match self {
            VocabKind::SecretType => map::<SecretType>(input).as_str(),
            VocabKind::ContainerType => map::<ContainerType>(input).as_str(),
            VocabKind::AuthAlgorithm => map_auth_algorithm(input, compat).as_str(),
            VocabKind::EncryptionAlgorithm => map::<EncryptionAlgorithm>(input).as_str(),
            VocabKind::Pfs => map::<Pfs>(input).as_str(),
            VocabKind::EncapsulationMode => map::<EncapsulationMode>(input).as_str(),
            VocabKind::TransformProtocol => map::<TransformProtocol>(input).as_str(),
        }
    }
}

impl std::fmt::Display for VocabKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
