use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AttributeId, SegmentId};

/// イメージ項目（7項目固定）。数値は fit_scores.attribute_id と一致する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitAttribute {
    Likability = 1,
    Trust = 2,
    Approachability = 3,
    Cleanliness = 4,
    Stylishness = 5,
    Intelligence = 6,
    Energy = 7,
}

impl FitAttribute {
    pub const ALL: [FitAttribute; 7] = [
        FitAttribute::Likability,
        FitAttribute::Trust,
        FitAttribute::Approachability,
        FitAttribute::Cleanliness,
        FitAttribute::Stylishness,
        FitAttribute::Intelligence,
        FitAttribute::Energy,
    ];

    pub fn id(self) -> AttributeId {
        self as AttributeId
    }

    pub fn from_id(id: AttributeId) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| attr.id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            FitAttribute::Likability => "好感度",
            FitAttribute::Trust => "信頼感",
            FitAttribute::Approachability => "親しみやすさ",
            FitAttribute::Cleanliness => "清潔感",
            FitAttribute::Stylishness => "おしゃれ",
            FitAttribute::Intelligence => "知的",
            FitAttribute::Energy => "元気",
        }
    }
}

/// 業種ごとの判定ルール
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryRule {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// 指定があればこの1項目だけで適合度を見る。なければ全7項目
    #[serde(default)]
    pub required_attribute: Option<FitAttribute>,
    /// 年齢制限（酒類など）
    #[serde(default)]
    pub minimum_age: Option<u32>,
    /// 競合契約チェック対象のカテゴリコード。空なら競合判定しない
    #[serde(default)]
    pub competing_codes: Vec<String>,
}

impl IndustryRule {
    pub fn fit_attribute_ids(&self) -> Vec<AttributeId> {
        match self.required_attribute {
            Some(attr) => vec![attr.id()],
            None => FitAttribute::ALL.iter().map(|attr| attr.id()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentEntry {
    pub id: SegmentId,
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetTier {
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// None は最上位の「上限なし」ティア
    pub ceiling_yen: Option<i64>,
}

#[derive(Debug, Error)]
pub enum CatalogLoadError {
    #[error("failed to read brief catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse brief catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("brief catalog is invalid: {0}")]
    Invalid(String),
}

/// ブリーフ入力の選択肢と業種ルール一式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefCatalog {
    pub industries: Vec<IndustryRule>,
    pub segments: Vec<SegmentEntry>,
    pub budget_tiers: Vec<BudgetTier>,
}

static BUILTIN_CATALOG: Lazy<BriefCatalog> = Lazy::new(|| BriefCatalog {
    industries: builtin_industries(),
    segments: builtin_segments(),
    budget_tiers: builtin_budget_tiers(),
});

impl BriefCatalog {
    pub fn builtin() -> Self {
        BUILTIN_CATALOG.clone()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogLoadError> {
        let raw = std::fs::read_to_string(path)?;
        let catalog: BriefCatalog = serde_json::from_str(&raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// `TM_BRIEF_CATALOG` が指定されていればそのファイル、なければ組み込みテーブル
    pub fn from_env_or_builtin() -> Result<Self, CatalogLoadError> {
        match std::env::var_os("TM_BRIEF_CATALOG") {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn validate(&self) -> Result<(), CatalogLoadError> {
        if self.industries.is_empty() || self.segments.is_empty() || self.budget_tiers.is_empty()
        {
            return Err(CatalogLoadError::Invalid(
                "industries, segments and budget_tiers must not be empty".into(),
            ));
        }

        let unlimited = self
            .budget_tiers
            .iter()
            .filter(|tier| tier.ceiling_yen.is_none())
            .count();
        if unlimited > 1 {
            return Err(CatalogLoadError::Invalid(
                "at most one unlimited budget tier is allowed".into(),
            ));
        }

        Ok(())
    }
}

fn industry(
    name: &str,
    aliases: &[&str],
    required_attribute: Option<FitAttribute>,
    minimum_age: Option<u32>,
    competing_codes: &[&str],
) -> IndustryRule {
    IndustryRule {
        name: name.into(),
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        required_attribute,
        minimum_age,
        competing_codes: competing_codes.iter().map(|s| s.to_string()).collect(),
    }
}

fn builtin_industries() -> Vec<IndustryRule> {
    use FitAttribute::*;

    vec![
        // 食品系4業種のみ競合契約を判定する。食品は "food" 自体を含めず隣接カテゴリを見る
        industry(
            "食品",
            &["食料品", "加工食品"],
            None,
            None,
            &["processed_food", "seasoning", "instant_food"],
        ),
        industry(
            "飲料",
            &["清涼飲料", "ソフトドリンク"],
            Some(Energy),
            None,
            &["soft_drink", "tea_coffee", "water"],
        ),
        industry(
            "アルコール飲料",
            &["酒類", "お酒", "ビール"],
            None,
            Some(25),
            &["beer", "spirits", "wine", "alcohol"],
        ),
        industry(
            "菓子",
            &["お菓子", "製菓"],
            Some(Approachability),
            None,
            &["confectionery", "snack", "ice_cream"],
        ),
        industry("化粧品", &["コスメ", "美容"], Some(Cleanliness), None, &[]),
        industry("金融", &["銀行", "保険"], Some(Trust), None, &[]),
        industry("自動車", &["車"], None, None, &[]),
        industry("通信", &["携帯", "通信キャリア"], None, None, &[]),
        industry("不動産", &["住宅"], Some(Trust), None, &[]),
        industry("アパレル", &["ファッション"], Some(Stylishness), None, &[]),
        industry("教育", &["学習塾", "通信教育"], Some(Intelligence), None, &[]),
    ]
}

fn builtin_segments() -> Vec<SegmentEntry> {
    let bands = [
        ("10代", "12〜19歳"),
        ("20〜34歳", "20代"),
        ("35〜49歳", "40代"),
        ("50〜69歳", "50代以上"),
    ];

    let mut segments = vec![SegmentEntry {
        id: 0,
        label: "全体".into(),
        aliases: vec!["全年代".into(), "男女全体".into()],
    }];

    for (gender_offset, gender) in [(0, "男性"), (4, "女性")] {
        for (idx, (band, alias)) in bands.iter().enumerate() {
            segments.push(SegmentEntry {
                id: gender_offset + idx as SegmentId + 1,
                label: format!("{gender}{band}"),
                aliases: vec![format!("{gender}{alias}")],
            });
        }
    }

    segments
}

fn builtin_budget_tiers() -> Vec<BudgetTier> {
    let limited = [
        ("〜500万円", "500万円未満", 5_000_000),
        ("〜1,000万円", "1,000万円未満", 10_000_000),
        ("〜3,000万円", "3,000万円未満", 30_000_000),
        ("〜5,000万円", "5,000万円未満", 50_000_000),
        ("〜1億円", "1億円未満", 100_000_000),
    ];

    let mut tiers: Vec<BudgetTier> = limited
        .into_iter()
        .map(|(label, alias, ceiling)| BudgetTier {
            label: label.into(),
            aliases: vec![alias.into()],
            ceiling_yen: Some(ceiling),
        })
        .collect();

    tiers.push(BudgetTier {
        label: "1億円以上".into(),
        aliases: vec!["上限なし".into(), "制限なし".into()],
        ceiling_yen: None,
    });

    tiers
}
