//! Closed enumerations the remote API expects.
//!
//! Each type serializes to its wire string; `Unset` is the zero value and
//! serializes as `""`. Deserialization goes through the same vocabulary
//! table, so a value the table does not know reads back as `Unset`.

use crate::vocab::{VocabTable, Vocabulary};

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $name:ident as $kind:literal {
            $( $variant:ident => $wire:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
        )]
        #[serde(from = "String", into = "&'static str")]
        pub enum $name {
            #[default]
            Unset,
            $( $variant, )+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $name::Unset => "",
                    $( $name::$variant => $wire, )+
                }
            }

            #[allow(clippy::trivially_copy_pass_by_ref)]
            pub fn is_unset(&self) -> bool {
                *self == $name::Unset
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Vocabulary for $name {
            const KIND: &'static str = $kind;

            fn table() -> &'static VocabTable<Self> {
                static TABLE: once_cell::sync::Lazy<VocabTable<$name>> =
                    once_cell::sync::Lazy::new(|| {
                        VocabTable::new($kind, &[ $( ($wire, $name::$variant), )+ ])
                    });
                &TABLE
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::table().lookup(&value)
            }
        }

        impl From<$name> for &'static str {
            fn from(value: $name) -> Self {
                value.as_str()
            }
        }
    };
}

vocabulary! {
    /// Barbican secret type.
    pub enum SecretType as "secret_type" {
        Symmetric => "symmetric",
        Public => "public",
        Private => "private",
        Passphrase => "passphrase",
        Certificate => "certificate",
        Opaque => "opaque",
    }
}

vocabulary! {
    /// Barbican container type.
    pub enum ContainerType as "container_type" {
        Rsa => "rsa",
        Generic => "generic",
        Certificate => "certificate",
    }
}

vocabulary! {
    pub enum AuthAlgorithm as "auth_algorithm" {
        Sha1 => "sha1",
        Sha256 => "sha256",
        Sha384 => "sha384",
        Sha512 => "sha512",
    }
}

vocabulary! {
    pub enum EncryptionAlgorithm as "encryption_algorithm" {
        TripleDes => "3des",
        Aes128 => "aes-128",
        Aes192 => "aes-192",
        Aes256 => "aes-256",
    }
}

vocabulary! {
    /// Perfect forward secrecy group.
    pub enum Pfs as "pfs" {
        Group2 => "group2",
        Group5 => "group5",
        Group14 => "group14",
    }
}

vocabulary! {
    pub enum EncapsulationMode as "encapsulation_mode" {
        Tunnel => "tunnel",
        Transport => "transport",
    }
}

vocabulary! {
    pub enum TransformProtocol as "transform_protocol" {
        Esp => "esp",
        Ah => "ah",
        AhEsp => "ah-esp",
    }
}
