use std::str::FromStr;

/// Sufficiency verdict for the evidence gathered in one retrieval pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Sufficient,
    Insufficient,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized grade reply: {reply:?}")]
pub struct GradeParseError {
    pub reply: String,
}

const MAX_REPLY_IN_ERROR: usize = 80;

impl FromStr for Grade {
    type Err = GradeParseError;

    /// Reads the first word of the reply, ignoring case, quotes and punctuation.
    fn from_str(reply: &str) -> Result<Self, Self::Err> {
        let lower = reply.trim().to_lowercase();
        let first = lower
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .find(|w| !w.is_empty());

        match first {
            Some("yes" | "예" | "네") => Ok(Self::Sufficient),
            Some("no" | "아니오" | "아니요") => Ok(Self::Insufficient),
            _ => Err(GradeParseError {
                reply: reply.trim().chars().take(MAX_REPLY_IN_ERROR).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn plain_answers() {
        assert_eq!("yes".parse::<Grade>().unwrap(), Grade::Sufficient);
        assert_eq!("no".parse::<Grade>().unwrap(), Grade::Insufficient);
    }

    #[test]
    fn tolerates_case_quotes_and_punctuation() {
        for reply in ["Yes.", "  'yes'  ", "\"YES\"", "**yes**", "yes, the context covers it"] {
            assert_eq!(reply.parse::<Grade>().unwrap(), Grade::Sufficient, "{reply}");
        }
        for reply in ["No.", "`no`", "NO!\n", "- no"] {
            assert_eq!(reply.parse::<Grade>().unwrap(), Grade::Insufficient, "{reply}");
        }
    }

    #[test]
    fn korean_answers() {
        assert_eq!("예".parse::<Grade>().unwrap(), Grade::Sufficient);
        assert_eq!("네, 충분합니다".parse::<Grade>().unwrap(), Grade::Sufficient);
        assert_eq!("아니오".parse::<Grade>().unwrap(), Grade::Insufficient);
        assert_eq!("아니요.".parse::<Grade>().unwrap(), Grade::Insufficient);
    }

    #[test]
    fn ambiguous_replies_are_errors() {
        for reply in ["", "   ", "maybe", "yesterday", "The context is partially relevant", "..."] {
            assert!(reply.parse::<Grade>().is_err(), "{reply}");
        }
    }

    #[test]
    fn only_first_word_counts() {
        assert!("maybe yes".parse::<Grade>().is_err());
        assert_eq!("no yes".parse::<Grade>().unwrap(), Grade::Insufficient);
    }

    #[test]
    fn error_keeps_a_bounded_excerpt() {
        let long = "x".repeat(500);
        let err = long.parse::<Grade>().unwrap_err();
        assert_eq!(err.reply.chars().count(), MAX_REPLY_IN_ERROR);
        assert!(err.to_string().starts_with("unrecognized grade reply"));
    }

    proptest! {
        #[test]
        fn parse_never_panics(s in "\\PC{0,64}") {
            let _ = s.parse::<Grade>();
        }
    }
}
