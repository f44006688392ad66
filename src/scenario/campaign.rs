//! Sales campaigns and customer moods.

use serde::{Deserialize, Serialize};

/// The sales focus of a training session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Campaign {
    /// Carrier switch (MNP).
    PortIn,
    PlanChange,
    /// Full six-option security bundle.
    OptionBundle,
    /// Home internet (fiber / HOME 5G).
    HomeInternet,
    PixelSwitch,
    CreditCard,
    Utilities,
}

impl Campaign {
    pub const ALL: [Campaign; 7] = [
        Self::PortIn,
        Self::PlanChange,
        Self::OptionBundle,
        Self::HomeInternet,
        Self::PixelSwitch,
        Self::CreditCard,
        Self::Utilities,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::PortIn => "① PI（乗り換え）",
            Self::PlanChange => "② プラン変更",
            Self::OptionBundle => "③ S4（オプション満載）",
            Self::HomeInternet => "④ イエナカ（光・HOME 5G）",
            Self::PixelSwitch => "⑤ Pixelスイッチ",
            Self::CreditCard => "⑥ dカード（GOLD）",
            Self::Utilities => "⑦ 電気・ガス",
        }
    }

    /// Accent colour used by front ends.
    pub fn color(&self) -> &'static str {
        match self {
            Self::PortIn => "#E60012",
            Self::PlanChange => "#E91E63",
            Self::OptionBundle => "#673AB7",
            Self::HomeInternet => "#0091EA",
            Self::PixelSwitch => "#2E7D32",
            Self::CreditCard => "#F9A825",
            Self::Utilities => "#EF6C00",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::PortIn => "🔥",
            Self::PlanChange => "📱",
            Self::OptionBundle => "🛡️",
            Self::HomeInternet => "📶",
            Self::PixelSwitch => "🎨",
            Self::CreditCard => "💳",
            Self::Utilities => "💡",
        }
    }

    /// What the representative should close. Empty for utilities.
    pub fn goal(&self) -> &'static str {
        match self {
            Self::PortIn => "MNP成約",
            Self::PlanChange => "ポイ活/eximo成約",
            Self::OptionBundle => "6点フル成約",
            Self::HomeInternet => "解約新規・成約",
            Self::PixelSwitch => "Pixel成約",
            Self::CreditCard => "GOLD/PLATINUM成約",
            Self::Utilities => "",
        }
    }

    /// Situation seed embedded in the profile prompt.
    pub fn seed(&self) -> &'static str {
        match self {
            Self::PortIn => "現在au/SB利用。メリットを感じていない。",
            Self::PlanChange => "制限中、またはポイ活興味あり。",
            Self::OptionBundle => "セキュリティ意識低い。リスク訴求必要。",
            Self::HomeInternet => "他社光/遅い回線利用中。速度不満。",
            Self::PixelSwitch => "iPhone(古)などを利用中。",
            Self::CreditCard => "現金派。年会費懸念。",
            Self::Utilities => "地域電力利用中。まとめるメリット提示。",
        }
    }

    /// 1-based position in the selector.
    pub fn number(&self) -> usize {
        Self::ALL.iter().position(|c| c == self).map_or(0, |i| i + 1)
    }

    /// Resolve a selector value: the 1-based number, the snake_case id, or the label.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Ok(n) = input.parse::<usize>() {
            return n.checked_sub(1).and_then(|i| Self::ALL.get(i).copied());
        }
        Self::ALL
            .into_iter()
            .find(|c| c.id() == input || c.label() == input)
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::PortIn => "port_in",
            Self::PlanChange => "plan_change",
            Self::OptionBundle => "option_bundle",
            Self::HomeInternet => "home_internet",
            Self::PixelSwitch => "pixel_switch",
            Self::CreditCard => "credit_card",
            Self::Utilities => "utilities",
        }
    }
}

impl Default for Campaign {
    fn default() -> Self {
        Self::PortIn
    }
}

impl std::fmt::Display for Campaign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Customer temperament requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    /// Let the model choose.
    Random,
    Patient,
    Angry,
    Curious,
    Hurried,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Self::Random,
        Self::Patient,
        Self::Angry,
        Self::Curious,
        Self::Hurried,
    ];

    /// Label embedded verbatim in the profile prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Random => "ランダム",
            Self::Patient => "じっくり聞く(普通)",
            Self::Angry => "怒っている(難)",
            Self::Curious => "教えて(易)",
            Self::Hurried => "急いでいる(短)",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Patient => "patient",
            Self::Angry => "angry",
            Self::Curious => "curious",
            Self::Hurried => "hurried",
        }
    }

    pub fn number(&self) -> usize {
        Self::ALL.iter().position(|m| m == self).map_or(0, |i| i + 1)
    }

    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Ok(n) = input.parse::<usize>() {
            return n.checked_sub(1).and_then(|i| Self::ALL.get(i).copied());
        }
        Self::ALL
            .into_iter()
            .find(|m| m.id() == input || m.label() == input)
    }
}

impl Default for Mood {
    fn default() -> Self {
        Self::Random
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
