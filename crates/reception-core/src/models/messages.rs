use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Category;

/// Built-in completion text per category.
pub fn default_message(category: Category) -> &'static str {
    match category {
        Category::External => "パンフレットを取って、将棋サロンをお楽しみください。少しでも不明点があれば、近くにいる班員にお気軽にお声掛けください。",
        Category::Student => "希望する場合はパンフレットを取ってください。混雑時は外部の方優先で対応させていただきます。予めご了承ください。将棋部では、体験入部・入部を一年中受け付けています。少しでも興味があれば、1人でも友達とでもいいので気軽に来てください。",
        Category::Parent => "ご来場ありがとうございます。パンフレットを取って、将棋サロンをお楽しみください。日頃の部活動の様子もぜひご覧ください。",
        Category::Alumni => "おかえりなさい！パンフレットを取って、将棋サロンをお楽しみください。現役部員との対局も大歓迎です。",
        Category::Teacher => "いつもありがとうございます。パンフレットを取って、将棋サロンをお楽しみください。",
    }
}

/// Admin-edited completion messages. Categories without an override use
/// the built-in text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomMessages(BTreeMap<Category, String>);

impl CustomMessages {
    pub fn message_for(&self, category: Category) -> &str {
        self.0
            .get(&category)
            .map(String::as_str)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_message(category))
    }

    /// Set a category's text. An empty text drops the override.
    pub fn set(&mut self, category: Category, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            self.0.remove(&category);
        } else {
            self.0.insert(category, text.to_string());
        }
    }

    pub fn is_customized(&self, category: Category) -> bool {
        self.0.contains_key(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let messages = CustomMessages::default();
        assert_eq!(
            messages.message_for(Category::External),
            default_message(Category::External)
        );
        assert!(!messages.is_customized(Category::External));
    }

    #[test]
    fn test_override_and_clear() {
        let mut messages = CustomMessages::default();
        messages.set(Category::Student, "  ようこそ  ");
        assert_eq!(messages.message_for(Category::Student), "ようこそ");
        assert!(messages.is_customized(Category::Student));

        messages.set(Category::Student, "   ");
        assert_eq!(
            messages.message_for(Category::Student),
            default_message(Category::Student)
        );
    }

    #[test]
    fn test_json_keys_are_category_names() {
        let mut messages = CustomMessages::default();
        messages.set(Category::Alumni, "おかえり");
        let json = serde_json::to_string(&messages).expect("serialize");
        assert_eq!(json, r#"{"alumni":"おかえり"}"#);

        let parsed: CustomMessages = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, messages);
    }
}
