//! Choice tables offered by the intake screens.
//!
//! Grades, classes, strength ranks, headcount quick picks and the member
//! roster are data, not behaviour. The defaults below describe this year's
//! event; a `catalog` object in the config file replaces them wholesale.

use serde::{Deserialize, Serialize};

/// Label of the "no particular strength" choice.
pub const NO_STRENGTH: &str = "特にない";

/// A coarse strength bucket. A tier without ranks is itself the final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrengthTier {
    pub label: String,
    #[serde(default)]
    pub ranks: Vec<String>,
}

impl StrengthTier {
    fn new(label: &str, ranks: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            ranks: ranks.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.ranks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub grades: Vec<String>,
    pub classes: Vec<String>,
    #[serde(rename = "strengthTiers")]
    pub strength_tiers: Vec<StrengthTier>,
    #[serde(rename = "quickCounts")]
    pub quick_counts: Vec<u32>,
    pub members: Vec<String>,
}

const DEFAULT_MEMBERS: &[&str] = &[
    "熱田 望", "池田 大翔", "岩間 悠希", "白石 怜大",
    "高椋 煌生", "布施 皓己", "吉井 千智", "秋山 七星",
    "大庭 悠誠", "熊谷 流星", "佐藤 勘太", "下田 聖",
    "遅 志丞", "皆川 哲弥", "宮崎 惺也", "山崎 泰蔵",
    "片山 幸典", "葛石 知佑", "金 悠鉉", "小林 慈人",
    "坂内 元気", "下村 篤生", "染谷 尚太朗", "高木 翔玄",
    "棚瀬 侑真", "中野 琥太郎", "西内 幸輝", "野田 慧",
    "秀村 紘嗣", "船津 太一", "槇 啓秀", "松井 俐真",
    "森本 直樹", "山田 悠聖", "若林 空", "小畑 貴慈",
    "龍口 直史",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            grades: strings(&["中1", "中2", "中3", "高1", "高2", "高3"]),
            classes: strings(&["A", "B", "C", "D", "E", "F", "G"]),
            strength_tiers: vec![
                StrengthTier::new(NO_STRENGTH, &[]),
                StrengthTier::new(
                    "級位",
                    &["10級", "9級", "8級", "7級", "6級", "5級", "4級", "3級", "2級", "1級"],
                ),
                StrengthTier::new("段位", &["初段", "二段", "三段", "四段以上"]),
            ],
            quick_counts: vec![1, 2, 3, 4, 5],
            members: strings(DEFAULT_MEMBERS),
        }
    }
}

impl Catalog {
    pub fn tier(&self, index: usize) -> Option<&StrengthTier> {
        self.strength_tiers.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables() {
        let catalog = Catalog::default();
        assert_eq!(catalog.grades.len(), 6);
        assert_eq!(catalog.classes.len(), 7);
        assert_eq!(catalog.quick_counts, vec![1, 2, 3, 4, 5]);
        assert_eq!(catalog.members.len(), 37);
    }

    #[test]
    fn test_first_tier_is_terminal_none() {
        let catalog = Catalog::default();
        let none = catalog.tier(0).expect("tier");
        assert_eq!(none.label, NO_STRENGTH);
        assert!(none.is_terminal());
        assert!(!catalog.tier(1).expect("tier").is_terminal());
    }

    #[test]
    fn test_catalog_json_roundtrip_keeps_tiers() {
        let json = r#"{
            "grades": ["1年"],
            "classes": ["1"],
            "strengthTiers": [{"label": "なし"}, {"label": "級", "ranks": ["1級"]}],
            "quickCounts": [1, 2],
            "members": []
        }"#;
        let catalog: Catalog = serde_json::from_str(json).expect("parse");
        assert!(catalog.tier(0).expect("tier").is_terminal());
        assert_eq!(catalog.tier(1).expect("tier").ranks, vec!["1級"]);
    }
}
