//! Prompt templates for customer generation and role-play turns, plus the
//! emotion-marker parser for customer replies.

use super::campaign::{Campaign, Mood};
use super::profile::CustomerProfile;
use crate::session::Emotion;

/// The closed set of reasons a customer walks into the shop.
pub const VISIT_REASONS: [&str; 6] = [
    "料金支払い",
    "充電器購入",
    "パスワード忘れ",
    "操作説明",
    "迷惑メール相談",
    "フィルム貼替え",
];

pub const ANGRY_MARKER: &str = "<emo>angry</emo>";
pub const HAPPY_MARKER: &str = "<emo>happy</emo>";
pub const NEUTRAL_MARKER: &str = "<emo>neutral</emo>";

/// Prompt asking the model to invent a customer as `label：value` lines.
pub fn profile_prompt(campaign: Campaign, mood: Mood) -> String {
    let reasons = VISIT_REASONS.join("/");
    format!(
        "ドコモショップに来店する日本人顧客プロフィールを作成せよ。\n\
         商材：{label}\n\
         設定：{seed}\n\
         性格指定：{mood}\n\
         \n\
         【出力項目】\n\
         名前：(日本人名)\n\
         性別：(男性/女性)\n\
         年代：(例:20代)\n\
         性格：(一言で)\n\
         現機種：(機種名 + 利用年数。例:iPhone12(3年))\n\
         現プラン：(eximo/irumo/ギガホなど)\n\
         dカードランク：(REGULAR/GOLD/GOLD U/PLATINUM/なし)\n\
         dカード利用額：(例:月5万 / なし)\n\
         Wi-Fi：(例:ドコモ光(1Gbps/5720円) / HOME 5G / なし)\n\
         TV契約：(あり/なし)\n\
         電話契約：(あり/なし)\n\
         電気ガス：(例:東京電力/東京ガス)\n\
         来店目的：({reasons} からランダム1つ)\n",
        label = campaign.label(),
        seed = campaign.seed(),
        mood = mood.label(),
    )
}

/// Prompt for the customer's first line once serving starts.
pub fn opening_prompt(profile: &CustomerProfile) -> String {
    format!(
        "設定：{literal}。来店目的（{reason}）について店員に話しかけられた。\
         用件を済ませたい。性格に合わせて第一声を返して。",
        literal = profile.to_literal(),
        reason = profile.visit_reason(),
    )
}

/// Prompt for one conversation turn, sent after the prior history.
pub fn turn_prompt(
    profile: &CustomerProfile,
    campaign: Campaign,
    representative_line: &str,
) -> String {
    format!(
        "客として振る舞え。設定：{literal}。目標：{goal}。\n\
         直前の店員の言葉：{line}\n\
         1. 「来店目的」が未解決なら営業に怒る。\n\
         2. 解決済みでメリットがあれば興味を持つ。\n\
         3. 最後に感情タグ {ANGRY_MARKER} / {NEUTRAL_MARKER} / {HAPPY_MARKER} のどれか1つだけをつける。",
        literal = profile.to_literal(),
        goal = campaign.goal(),
        line = representative_line,
    )
}

/// A customer reply with its emotion marker removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerReply {
    pub text: String,
    pub emotion: Emotion,
}

/// Read the emotion marker and strip every marker from the visible text.
///
/// Angry wins over happy when both appear; no marker means neutral. Text
/// without any marker is returned unchanged.
pub fn parse_customer_reply(raw: &str) -> CustomerReply {
    let emotion = if raw.contains(ANGRY_MARKER) {
        Emotion::Angry
    } else if raw.contains(HAPPY_MARKER) {
        Emotion::Happy
    } else {
        Emotion::Neutral
    };

    let text = raw
        .replace(ANGRY_MARKER, "")
        .replace(HAPPY_MARKER, "")
        .replace(NEUTRAL_MARKER, "");

    CustomerReply { text, emotion }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::profile::parse_profile;

    #[test]
    fn profile_prompt_embeds_campaign_and_mood() {
        let prompt = profile_prompt(Campaign::CreditCard, Mood::Angry);
        assert!(prompt.contains("商材：⑥ dカード（GOLD）"));
        assert!(prompt.contains("設定：現金派。年会費懸念。"));
        assert!(prompt.contains("性格指定：怒っている(難)"));
        for field in ["名前：", "dカードランク：", "Wi-Fi：", "電気ガス：", "来店目的："] {
            assert!(prompt.contains(field), "missing {field}");
        }
        for reason in VISIT_REASONS {
            assert!(prompt.contains(reason));
        }
    }

    #[test]
    fn random_mood_is_passed_verbatim() {
        assert!(profile_prompt(Campaign::PortIn, Mood::Random).contains("性格指定：ランダム"));
    }

    #[test]
    fn opening_prompt_embeds_profile_and_reason() {
        let profile = parse_profile("名前：山田太郎\n来店目的：充電器購入");
        let prompt = opening_prompt(&profile);
        assert!(prompt.contains("{'名前': '山田太郎', '来店目的': '充電器購入'}"));
        assert!(prompt.contains("来店目的（充電器購入）"));
        assert!(prompt.contains("第一声"));
    }

    #[test]
    fn turn_prompt_embeds_goal_line_and_markers() {
        let profile = parse_profile("名前：山田太郎");
        let prompt = turn_prompt(&profile, Campaign::PortIn, "お支払いですね");
        assert!(prompt.contains("{'名前': '山田太郎'}"));
        assert!(prompt.contains("目標：MNP成約"));
        assert!(prompt.contains("直前の店員の言葉：お支払いですね"));
        assert!(prompt.contains(ANGRY_MARKER));
        assert!(prompt.contains(NEUTRAL_MARKER));
        assert!(prompt.contains(HAPPY_MARKER));
    }

    #[test]
    fn happy_marker_is_stripped() {
        let reply = parse_customer_reply("助かります<emo>happy</emo>");
        assert_eq!(reply.text, "助かります");
        assert_eq!(reply.emotion, Emotion::Happy);
    }

    #[test]
    fn angry_marker_is_stripped() {
        let reply = parse_customer_reply("早くして！<emo>angry</emo>");
        assert_eq!(reply.emotion, Emotion::Angry);
        assert!(!reply.text.contains(ANGRY_MARKER));
        assert_eq!(reply.text, "早くして！");
    }

    #[test]
    fn no_marker_is_neutral_and_unchanged() {
        let raw = "  はい、お願いします。\n";
        let reply = parse_customer_reply(raw);
        assert_eq!(reply.emotion, Emotion::Neutral);
        assert_eq!(reply.text, raw);
    }

    #[test]
    fn angry_wins_over_happy_and_all_markers_removed() {
        let reply = parse_customer_reply("<emo>happy</emo>えっ<emo>angry</emo>ok<emo>neutral</emo>");
        assert_eq!(reply.emotion, Emotion::Angry);
        assert_eq!(reply.text, "えっok");
    }

    #[test]
    fn neutral_marker_is_removed() {
        let reply = parse_customer_reply("なるほど<emo>neutral</emo>");
        assert_eq!(reply.emotion, Emotion::Neutral);
        assert_eq!(reply.text, "なるほど");
    }

    #[test]
    fn malformed_marker_is_left_alone() {
        let reply = parse_customer_reply("うーん<emo>sad</emo>");
        assert_eq!(reply.emotion, Emotion::Neutral);
        assert_eq!(reply.text, "うーん<emo>sad</emo>");
    }
}
