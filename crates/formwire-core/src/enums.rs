//! Enum types naming channel kinds and invalidation sources.
//!
//! Each enum has:
//! - Serialize / Deserialize as a kebab-case string
//! - `as_str()`, `ALL`, `Display` and `FromStr`

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Macro: defines a closed enum with one string form per variant.
// ---------------------------------------------------------------------------
macro_rules! define_enum {
    (
        $(#[$meta:meta])*
        $name:ident,
        variants: [
            $( $(#[$vmeta:meta])* ($variant:ident, $str:expr) ),+ $(,)?
        ]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[ $( Self::$variant, )+ ];

            /// Returns the string representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $str, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $str => Ok(Self::$variant), )+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

define_enum!(
    /// The kind of state a channel registry holds.
    ChannelKind,
    variants: [
        (FieldValue, "field-value"),
        (SearchTerm, "search-term"),
        (FieldValidity, "field-validity"),
        (RepeatCount, "repeat-count"),
        (QuestionSetValidity, "question-set-validity"),
        (FunctionStale, "function-stale"),
    ]
);

impl ChannelKind {
    /// Returns `true` if channels of this kind replay their latest value to
    /// new subscribers; pulse kinds only deliver emissions made after
    /// subscribing.
    pub fn replays(&self) -> bool {
        !matches!(self, Self::QuestionSetValidity | Self::FunctionStale)
    }
}

define_enum!(
    /// An upstream change source that can make a built-in function stale.
    Trigger,
    variants: [
        /// The periodic clock timer.
        (Timer, "timer"),
        (OperationResult, "operation-result"),
        (OperationInProgress, "operation-in-progress"),
        (CalculationResult, "calculation-result"),
        (WorkflowStep, "workflow-step"),
        (ArticleIndex, "article-index"),
        (ElementIndex, "element-index"),
        /// Some form element became visible or hidden.
        (Visibility, "visibility"),
        /// A repeating group gained or lost an instance.
        (RepeatingField, "repeating-field"),
        (DebugFlag, "debug-flag"),
        (DebugLevel, "debug-level"),
        (CurrencyCode, "currency-code"),
    ]
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_kind_roundtrips_through_str() {
        for kind in ChannelKind::ALL {
            assert_eq!(kind.as_str().parse::<ChannelKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn pulse_kinds_do_not_replay() {
        assert!(ChannelKind::FieldValue.replays());
        assert!(ChannelKind::RepeatCount.replays());
        assert!(!ChannelKind::FunctionStale.replays());
        assert!(!ChannelKind::QuestionSetValidity.replays());
    }

    #[test]
    fn trigger_serializes_kebab_case() {
        let json = serde_json::to_string(&Trigger::OperationInProgress).unwrap();
        assert_eq!(json, "\"operation-in-progress\"");
        let back: Trigger = serde_json::from_str("\"debug-level\"").unwrap();
        assert_eq!(back, Trigger::DebugLevel);
    }

    #[test]
    fn unknown_trigger_is_rejected() {
        assert!("sundial".parse::<Trigger>().is_err());
    }
}
