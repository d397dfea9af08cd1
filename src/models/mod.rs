// src/models/mod.rs

use thiserror::Error;

pub mod activity;
pub mod assignee;
pub mod category;
pub mod comment;
pub mod email;
pub mod invitation;
pub mod member;
pub mod onboarding;
pub mod reminder;
pub mod session;
pub mod subscription;
pub mod task;
pub mod user;
pub mod workspace;

/// A stored string column held a value no enum variant matches.
#[derive(Debug, Error, PartialEq)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Enum stored as a VARCHAR column and sent as a lowercase JSON string.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::models::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use string_enum;

#[cfg(test)]
mod tests {
    use super::*;

    string_enum! {
        enum Shade { Light => "light", Dark => "dark" }
    }

    #[test]
    fn parses_and_prints_stored_values() {
        assert_eq!("dark".parse::<Shade>().unwrap(), Shade::Dark);
        assert_eq!(Shade::Light.to_string(), "light");
        assert_eq!(Shade::ALL.len(), 2);
        assert_eq!(
            Shade::try_from("dim".to_string()).unwrap_err(),
            UnknownVariant {
                kind: "Shade",
                value: "dim".into()
            }
        );
    }

    #[test]
    fn serializes_as_lowercase_strings() {
        assert_eq!(serde_json::to_string(&Shade::Dark).unwrap(), "\"dark\"");
        let shade: Shade = serde_json::from_str("\"light\"").unwrap();
        assert_eq!(shade, Shade::Light);
    }
}
