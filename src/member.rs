use std::sync::OnceLock;

use regex::Regex;

/// A parsed dotted identifier chain, e.g. `target.health` or `pos.x`.
///
/// Chains are transient: the VM rebuilds one per access from the string the
/// compiler pushed, then resolves it segment by segment. The first segment
/// names a variable or an entity; later segments are member names or entity
/// hops, decided during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberAccess {
    segments: Vec<String>,
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles")
    })
}

impl MemberAccess {
    /// Parse a chain, rejecting anything that is not dot-separated
    /// identifiers: empty segments, leading digits, stray punctuation.
    pub fn parse(chain: &str) -> Option<MemberAccess> {
        if chain.is_empty() {
            return None;
        }
        let segments: Vec<String> = chain.split('.').map(str::to_string).collect();
        if segments
            .iter()
            .any(|segment| !identifier_pattern().is_match(segment))
        {
            return None;
        }
        Some(MemberAccess { segments })
    }

    pub fn head(&self) -> &str {
        &self.segments[0]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// A bare name with no member hops.
    pub fn is_plain(&self) -> bool {
        self.segments.len() == 1
    }

    /// The final segment and everything before it.
    pub fn split_last(&self) -> (&[String], &str) {
        let (last, rest) = self
            .segments
            .split_last()
            .expect("chains always have at least one segment");
        (rest, last)
    }
}

impl std::fmt::Display for MemberAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_dotted_chains_parse() {
        let plain = MemberAccess::parse("health").unwrap();
        assert!(plain.is_plain());
        assert_eq!(plain.head(), "health");

        let chain = MemberAccess::parse("target.pos.x").unwrap();
        assert_eq!(chain.segments(), &["target", "pos", "x"]);
        let (hops, last) = chain.split_last();
        assert_eq!(hops, &["target", "pos"]);
        assert_eq!(last, "x");
    }

    #[test]
    fn malformed_chains_are_rejected() {
        assert_eq!(MemberAccess::parse(""), None);
        assert_eq!(MemberAccess::parse("a..b"), None);
        assert_eq!(MemberAccess::parse(".health"), None);
        assert_eq!(MemberAccess::parse("health."), None);
        assert_eq!(MemberAccess::parse("1up"), None);
        assert_eq!(MemberAccess::parse("a b"), None);
    }
}
