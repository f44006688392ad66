//! Customer profile: a sparse, unschemaed field mapping.
//!
//! The profile is whatever `label：value` lines the model produced. Nothing is
//! validated at parse time; readers go through accessors that fall back to a
//! placeholder when a field is missing.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Field labels requested by the profile prompt.
pub mod fields {
    pub const NAME: &str = "名前";
    pub const GENDER: &str = "性別";
    pub const AGE: &str = "年代";
    pub const PERSONALITY: &str = "性格";
    pub const DEVICE: &str = "現機種";
    pub const PLAN: &str = "現プラン";
    pub const CARD_RANK: &str = "dカードランク";
    pub const CARD_SPEND: &str = "dカード利用額";
    pub const WIFI: &str = "Wi-Fi";
    pub const TV: &str = "TV契約";
    pub const PHONE_LINE: &str = "電話契約";
    pub const UTILITIES: &str = "電気ガス";
    pub const VISIT_REASON: &str = "来店目的";
}

/// Default display values for missing fields.
pub mod placeholders {
    pub const NAME: &str = "お客様";
    pub const PERSONALITY: &str = "普通";
    pub const DASH: &str = "-";
    pub const BLANK: &str = "";
}

/// Insertion-ordered `label -> value` mapping.
///
/// A repeated label overwrites the earlier value and keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerProfile {
    entries: Vec<(String, String)>,
}

impl CustomerProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value for `key`, or `placeholder` when absent.
    pub fn get_or<'a>(&'a self, key: &str, placeholder: &'a str) -> &'a str {
        self.get(key).unwrap_or(placeholder)
    }

    pub fn name(&self) -> &str {
        self.get_or(fields::NAME, placeholders::NAME)
    }

    pub fn personality(&self) -> &str {
        self.get_or(fields::PERSONALITY, placeholders::PERSONALITY)
    }

    pub fn visit_reason(&self) -> &str {
        self.get_or(fields::VISIT_REASON, placeholders::BLANK)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Literal rendering embedded in prompts: `{'名前': '山田太郎', '年代': '30代'}`.
    pub fn to_literal(&self) -> String {
        let body = self
            .entries
            .iter()
            .map(|(k, v)| format!("{}: {}", quote_literal(k), quote_literal(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{body}}}")
    }
}

impl From<Vec<(String, String)>> for CustomerProfile {
    fn from(pairs: Vec<(String, String)>) -> Self {
        let mut profile = Self::new();
        for (k, v) in pairs {
            profile.insert(k, v);
        }
        profile
    }
}

impl Serialize for CustomerProfile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Extract `label：value` pairs from generated text.
///
/// Each line containing a full-width colon is split on its first `：`;
/// otherwise a line containing `:` is split on its first `:`. Both halves are
/// trimmed. Lines without either colon are ignored.
pub fn parse_profile(text: &str) -> CustomerProfile {
    let mut profile = CustomerProfile::new();
    for line in text.lines() {
        let split = line.split_once('：').or_else(|| line.split_once(':'));
        if let Some((key, value)) = split {
            profile.insert(key.trim(), value.trim());
        }
    }
    profile
}

/// Quote a string the way a Python `repr` would, so prompts read the same.
fn quote_literal(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_colons_and_drops_plain_lines() {
        let profile = parse_profile("名前：山田太郎\n年代：30代\n(no colon line)\n性格:せっかち");
        assert_eq!(profile.len(), 3);
        assert_eq!(profile.get("名前"), Some("山田太郎"));
        assert_eq!(profile.get("年代"), Some("30代"));
        assert_eq!(profile.get("性格"), Some("せっかち"));
        assert_eq!(profile.get("(no colon line)"), None);
    }

    #[test]
    fn empty_input_yields_empty_profile() {
        assert!(parse_profile("").is_empty());
        assert!(parse_profile("\n\n   \n").is_empty());
    }

    #[test]
    fn splits_on_first_colon_only() {
        let profile = parse_profile("Wi-Fi：ドコモ光(1Gbps/5720円)：確認中\n時刻: 10:30");
        assert_eq!(profile.get("Wi-Fi"), Some("ドコモ光(1Gbps/5720円)：確認中"));
        assert_eq!(profile.get("時刻"), Some("10:30"));
    }

    #[test]
    fn full_width_colon_takes_priority() {
        // A half-width colon earlier in the line is ignored when a full-width one exists.
        let profile = parse_profile("現機種: iPhone：12(3年)");
        assert_eq!(profile.get("現機種: iPhone"), Some("12(3年)"));
    }

    #[test]
    fn trims_whitespace_and_markdown_bullets_stay_in_key() {
        let profile = parse_profile("   名前 ：  佐藤花子  \n- 性別：女性");
        assert_eq!(profile.get("名前"), Some("佐藤花子"));
        assert_eq!(profile.get("- 性別"), Some("女性"));
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "名前：田中\n来店目的：充電器購入\nノイズ\nTV契約:なし";
        assert_eq!(parse_profile(text), parse_profile(text));
    }

    #[test]
    fn repeated_key_overwrites_in_place() {
        let profile = parse_profile("名前：A\n年代：20代\n名前：B");
        let keys: Vec<_> = profile.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["名前", "年代"]);
        assert_eq!(profile.name(), "B");
    }

    #[test]
    fn accessors_fall_back_to_placeholders() {
        let profile = CustomerProfile::new();
        assert_eq!(profile.name(), "お客様");
        assert_eq!(profile.personality(), "普通");
        assert_eq!(profile.visit_reason(), "");
        assert_eq!(profile.get_or(fields::DEVICE, placeholders::DASH), "-");
    }

    #[test]
    fn literal_rendering_matches_dict_style() {
        let profile = parse_profile("名前：山田太郎\n年代：30代");
        assert_eq!(profile.to_literal(), "{'名前': '山田太郎', '年代': '30代'}");
        assert_eq!(CustomerProfile::new().to_literal(), "{}");
    }

    #[test]
    fn literal_rendering_escapes_quotes() {
        let mut profile = CustomerProfile::new();
        profile.insert("メモ", "it's");
        profile.insert("引用", "a'b\"c");
        assert_eq!(profile.to_literal(), r#"{'メモ': "it's", '引用': 'a\'b"c'}"#);
    }

    #[test]
    fn serializes_as_ordered_object() {
        let profile = parse_profile("年代：30代\n名前：山田");
        let json = serde_json::to_string(&profile).unwrap();
        assert_eq!(json, r#"{"年代":"30代","名前":"山田"}"#);
    }
}
