use proxy_core::types::FactKind;
use regex::Regex;
use std::sync::OnceLock;

/// One fact-extraction rule: a regex with a single capture group, the kind of
/// fact it yields, and a template with `{}` standing in for the capture.
pub struct FactPattern {
    pub regex: Regex,
    pub kind: FactKind,
    pub template: &'static str,
}

/// Canonical fact patterns, checked in order against every user turn. Every
/// matching pattern contributes a candidate fact — this is not first-match-wins,
/// a single sentence can yield more than one fact.
pub fn fact_patterns() -> &'static [FactPattern] {
    static PATTERNS: OnceLock<Vec<FactPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let rules: &[(&str, FactKind, &'static str)] = &[
            (r"(?i)my name is ([a-z0-9 '\-]{2,40})", FactKind::Fact, "User's name is {}"),
            (r"(?i)i live in ([a-z0-9 ,'\-]{2,60})", FactKind::Fact, "User lives in {}"),
            (r"(?i)i work as (?:an? )?([a-z0-9 '\-]{2,60})", FactKind::Fact, "User works as {}"),
            (r"(?i)i (?:like|love) ([a-z0-9 ,'\-]{2,60})", FactKind::Preference, "User likes {}"),
            (r"(?i)i enjoy ([a-z0-9 ,'\-]{2,60})", FactKind::Preference, "User enjoys {}"),
            (r"(?i)my project is ([a-z0-9 ,'\-]{2,80})", FactKind::Project, "User's project: {}"),
            (r"(?i)i(?:'m| am) into ([a-z0-9 ,'\-]{2,60})", FactKind::Hobby, "User is into {}"),
            (r"(?i)i(?:'m| am) passionate about ([a-z0-9 ,'\-]{2,60})", FactKind::Hobby, "User is passionate about {}"),
            (r"(?i)i (?:know how to|can) ([a-z0-9 ,'\-]{2,60})", FactKind::Skill, "User can {}"),
            (r"(?i)i want to ([a-z0-9 ,'\-]{2,80})", FactKind::Plan, "User wants to {}"),
            (r"(?i)i(?:'m| am) planning to ([a-z0-9 ,'\-]{2,80})", FactKind::Plan, "User plans to {}"),
        ];
        rules
            .iter()
            .map(|(pattern, kind, template)| FactPattern {
                regex: Regex::new(pattern).expect("fact pattern must compile"),
                kind: *kind,
                template,
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_patterns_compile() {
        assert_eq!(fact_patterns().len(), 11);
    }

    #[test]
    fn name_pattern_matches() {
        let hit = fact_patterns()[0].regex.captures("hi, my name is Alex Rivera").unwrap();
        assert_eq!(&hit[1], "Alex Rivera");
    }
}
