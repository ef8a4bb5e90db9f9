//! Database rows and the TEXT-backed enums stored in them.

/// Declares an enum stored as upper-case TEXT, with `as_str`, `FromStr`,
/// `Display` and matching serde names.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            #[allow(dead_code)]
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("unknown {} '{}'", stringify!($name), s)),
                }
            }
        }
    };
}

pub(crate) use text_enum;

pub mod contact;
pub mod grow;
pub mod job;
pub mod outreach;
pub mod task;
pub mod user;

#[cfg(test)]
mod tests {
    use super::job::JobStage;
    use super::outreach::OutreachOutcome;

    #[test]
    fn test_text_enum_parses_case_insensitively() {
        assert_eq!("tech".parse::<JobStage>().unwrap(), JobStage::Tech);
        assert_eq!(
            " no_response ".parse::<OutreachOutcome>().unwrap(),
            OutreachOutcome::NoResponse
        );
        assert!("SIDEWAYS".parse::<JobStage>().is_err());
    }

    #[test]
    fn test_text_enum_serde_matches_as_str() {
        let json = serde_json::to_string(&OutreachOutcome::NoResponse).unwrap();
        assert_eq!(json, "\"NO_RESPONSE\"");
        assert_eq!(OutreachOutcome::NoResponse.as_str(), "NO_RESPONSE");
    }
}
