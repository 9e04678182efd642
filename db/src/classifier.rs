//! Rule-based tagging of verse text: keywords, themes and a category.
//!
//! Theme detection is a plain substring test against each theme's synonym
//! list, so a synonym embedded in an unrelated word still counts.

use lazy_static::lazy_static;
use regex::Regex;
use serde_derive::Serialize;

use crate::models::Category;

/// Themes in declaration order, each with the words that trigger it.
pub const THEMES: [(&str, &[&str]); 20] = [
    ("사랑", &["사랑", "애정", "자비", "긍휼", "은혜"]),
    ("믿음", &["믿음", "신뢰", "확신", "신앙"]),
    ("소망", &["소망", "희망", "기대", "약속"]),
    ("용서", &["용서", "사함", "화해", "회개"]),
    ("지혜", &["지혜", "명철", "분별", "깨달음"]),
    ("위로", &["위로", "안위", "평안", "쉼"]),
    ("인도", &["인도", "길", "방향", "인도하심"]),
    ("힘", &["힘", "능력", "강함", "권세"]),
    ("평화", &["평화", "평안", "화평", "안식"]),
    ("기쁨", &["기쁨", "즐거움", "감사", "찬양"]),
    ("기도", &["기도", "간구", "부르짖음", "간청"]),
    ("구원", &["구원", "구속", "해방", "건짐"]),
    ("가족", &["가족", "부모", "자녀", "형제"]),
    ("관계", &["관계", "친구", "이웃", "동료"]),
    ("일", &["일", "직업", "사명", "부르심"]),
    ("고난", &["고난", "시험", "환난", "어려움"]),
    ("치유", &["치유", "고침", "건강", "회복"]),
    ("감사", &["감사", "찬송", "영광", "찬양"]),
    ("겸손", &["겸손", "낮춤", "온유", "겸허"]),
    ("순종", &["순종", "복종", "따름", "청종"]),
];

const THEME_CATEGORIES: [(&str, Category); 20] = [
    ("사랑", Category::Love),
    ("믿음", Category::Faith),
    ("소망", Category::Hope),
    ("용서", Category::Forgiveness),
    ("지혜", Category::Wisdom),
    ("위로", Category::Comfort),
    ("인도", Category::Guidance),
    ("힘", Category::Strength),
    ("평화", Category::Peace),
    ("기쁨", Category::Joy),
    ("기도", Category::Prayer),
    ("구원", Category::Salvation),
    ("가족", Category::Family),
    ("관계", Category::Relationship),
    ("일", Category::Work),
    ("고난", Category::Suffering),
    ("치유", Category::Healing),
    ("감사", Category::Gratitude),
    ("겸손", Category::Humility),
    ("순종", Category::Obedience),
];

/// Tokens shorter than this (in characters) are not keywords.
const MIN_KEYWORD_CHARS: usize = 2;

/// Everything the classifier derives from one verse.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Classification {
    pub keywords: Vec<String>,
    pub themes: Vec<String>,
    pub category: Category,
    /// Verse text followed by its themes and keywords; this is what the
    /// full-text index sees.
    pub search_text: String,
}

pub fn classify(text: &str) -> Classification {
    let keywords = extract_keywords(text);
    let themes = detect_themes(text);
    let category = categorize(&themes);
    let search_text = format!("{} {} {}", text, themes.join(" "), keywords.join(" "));

    Classification {
        keywords,
        themes,
        category,
        search_text,
    }
}

/// Whitespace tokens with everything but ASCII word characters and Hangul
/// syllables stripped, at least two characters long, first occurrence kept.
pub fn extract_keywords(text: &str) -> Vec<String> {
    lazy_static! {
        static ref NON_WORD: Regex = Regex::new(r"[^A-Za-z0-9_가-힣]").unwrap();
    }

    let mut keywords: Vec<String> = Vec::new();
    for token in text.split_whitespace() {
        let word = NON_WORD.replace_all(token, "");
        if word.chars().count() >= MIN_KEYWORD_CHARS && !keywords.iter().any(|k| *k == word) {
            keywords.push(word.into_owned());
        }
    }
    keywords
}

pub fn detect_themes(text: &str) -> Vec<String> {
    THEMES
        .iter()
        .filter(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(theme, _)| theme.to_string())
        .collect()
}

/// The category of the first theme (in declaration order) that has one.
pub fn categorize<S: AsRef<str>>(themes: &[S]) -> Category {
    THEMES
        .iter()
        .map(|(theme, _)| *theme)
        .filter(|theme| themes.iter().any(|t| t.as_ref() == *theme))
        .find_map(theme_category)
        .unwrap_or(Category::Other)
}

pub fn theme_category(theme: &str) -> Option<Category> {
    THEME_CATEGORIES
        .iter()
        .find(|(t, _)| *t == theme)
        .map(|(_, category)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords() {
        assert_eq!(
            extract_keywords("아무 것도 염려하지 말고, 다만 (모든) 일에 기도와 간구로!"),
            vec!["아무", "것도", "염려하지", "말고", "다만", "모든", "일에", "기도와", "간구로"]
        );
        assert_eq!(
            extract_keywords("사랑 사랑! a 사랑, 내 love_1"),
            vec!["사랑", "love_1"]
        );
        assert!(extract_keywords("").is_empty());
        assert!(extract_keywords("주 와 , !").is_empty());
    }

    #[test]
    fn themes_follow_declaration_order() {
        let text = "아무 것도 염려하지 말고 다만 모든 일에 기도와 간구로, 너희 구할 것을 감사함으로 하나님께 아뢰라";
        let classification = classify(text);

        // "감사함으로" contains "사함", so forgiveness is tagged and wins the category.
        assert_eq!(
            classification.themes,
            vec!["용서", "기쁨", "기도", "일", "감사"]
        );
        assert_eq!(classification.category, Category::Forgiveness);
    }

    #[test]
    fn shared_synonyms_tag_every_theme() {
        // "평안" is listed under both comfort and peace.
        let classification = classify("평안을 너희에게 끼치노니");
        assert_eq!(classification.themes, vec!["위로", "평화"]);
        assert_eq!(classification.category, Category::Comfort);
    }

    #[test]
    fn substring_matches_inside_longer_words() {
        // "길" inside "길이" still tags guidance.
        assert_eq!(detect_themes("그 길이가 얼마인가"), vec!["인도"]);
    }

    #[test]
    fn no_theme_means_other() {
        let classification = classify("태초에 하나님이 천지를 창조하시니라");
        assert!(classification.themes.is_empty());
        assert_eq!(classification.category, Category::Other);

        let empty = classify("");
        assert_eq!(empty.category, Category::Other);
        assert!(empty.keywords.is_empty());
        assert_eq!(empty.search_text, "  ");
    }

    #[test]
    fn category_is_always_known() {
        vec![
            "",
            " ",
            "사랑",
            "순종하라",
            "abc def",
            "일",
            "능력과 사랑과 절제하는 마음",
            "!@#$%^&*()",
        ]
        .into_iter()
        .for_each(|text| assert!(Category::ALL.contains(&classify(text).category)));
    }

    #[test]
    fn themes_grow_with_text() {
        let short = "여호와를 신뢰하고";
        let long = "너는 마음을 다하여 여호와를 신뢰하고 네 명철을 의지하지 말라";
        let short_themes = detect_themes(short);
        let long_themes = detect_themes(long);

        assert_eq!(short_themes, vec!["믿음"]);
        assert!(short_themes.iter().all(|t| long_themes.contains(t)));
        assert_eq!(long_themes, vec!["믿음", "지혜"]);
    }

    #[test]
    fn search_text_layout() {
        let classification = classify("사랑은 오래 참고");
        assert_eq!(classification.search_text, "사랑은 오래 참고 사랑 사랑은 오래 참고");
    }

    #[test]
    fn categorize_uses_declaration_order_not_input_order() {
        assert_eq!(categorize(&["감사", "사랑"]), Category::Love);
        assert_eq!(categorize(&["평안", "동행"]), Category::Other);
        assert_eq!(categorize::<&str>(&[]), Category::Other);
    }

    #[test]
    fn every_theme_has_a_category() {
        for (theme, _) in THEMES.iter() {
            assert!(theme_category(theme).is_some(), "{theme} has no category");
        }
    }
}
