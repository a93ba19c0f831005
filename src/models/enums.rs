use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a wire string does not name a known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} value: {value:?}")]
pub struct ParseEnumError {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ParseEnumError {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// Tags are the German document names used by the upload clients.
str_enum!(DocumentType {
    BloodTest => "blutbild",
    Vaccination => "impfpass",
    Report => "befund",
    Medication => "medikation",
    Other => "other",
});

str_enum!(AnalysisStatus {
    Success => "success",
    Error => "error",
});

impl DocumentType {
    pub fn all() -> &'static [DocumentType] {
        &[
            Self::BloodTest,
            Self::Vaccination,
            Self::Report,
            Self::Medication,
            Self::Other,
        ]
    }
}
