//! Request vocabularies that map a caller's situation onto verse themes.
//!
//! Several mapped themes (e.g. "평안", "동행", "성실") are not part of the
//! classifier's vocabulary and therefore never match a stored verse; they
//! are kept so the lists stay as they are curated.

use std::fmt;
use std::str::FromStr;

use serde_derive::Serialize;

use crate::DbError;

/// Themes used when an emotion tag is not recognized.
pub const DEFAULT_EMOTION_THEMES: [&str; 2] = ["위로", "소망"];

/// Themes used when a counseling topic is not recognized.
pub const DEFAULT_COUNSELING_THEMES: [&str; 2] = ["지혜", "인도"];

/// Themes prepended for urgent counseling requests.
pub const COMFORT_THEMES: [&str; 2] = ["위로", "소망"];

/// Themes used for a prayer when no topic was given.
pub const DEFAULT_PRAYER_THEMES: [&str; 3] = ["위로", "소망", "감사"];

/// The emotion value meaning nothing in particular was detected.
pub const NEUTRAL_EMOTION: &str = "neutral";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Sad,
    Anxious,
    Angry,
    Hopeful,
    Grateful,
    Confused,
    Lonely,
    Peaceful,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Sad,
        Emotion::Anxious,
        Emotion::Angry,
        Emotion::Hopeful,
        Emotion::Grateful,
        Emotion::Confused,
        Emotion::Lonely,
        Emotion::Peaceful,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Sad => "sad",
            Emotion::Anxious => "anxious",
            Emotion::Angry => "angry",
            Emotion::Hopeful => "hopeful",
            Emotion::Grateful => "grateful",
            Emotion::Confused => "confused",
            Emotion::Lonely => "lonely",
            Emotion::Peaceful => "peaceful",
        }
    }

    pub fn themes(&self) -> &'static [&'static str] {
        match self {
            Emotion::Sad => &["위로", "소망", "평안"],
            Emotion::Anxious => &["평화", "신뢰", "위로"],
            Emotion::Angry => &["용서", "평화", "겸손"],
            Emotion::Hopeful => &["소망", "믿음", "기쁨"],
            Emotion::Grateful => &["감사", "찬양", "기쁨"],
            Emotion::Confused => &["지혜", "인도", "분별"],
            Emotion::Lonely => &["사랑", "위로", "동행"],
            Emotion::Peaceful => &["평안", "감사", "기쁨"],
        }
    }

    /// Themes for a raw emotion tag, falling back to comfort and hope.
    pub fn themes_for(tag: &str) -> &'static [&'static str] {
        tag.parse::<Emotion>()
            .map(|e| e.themes())
            .unwrap_or(&DEFAULT_EMOTION_THEMES)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_lowercase();
        Emotion::ALL
            .iter()
            .find(|e| e.as_str() == tag)
            .copied()
            .ok_or_else(|| DbError::validation(format!("unknown emotion '{tag}'")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CounselingTopic {
    Relationship,
    Family,
    Work,
    Health,
    Financial,
    Faith,
    Decision,
}

impl CounselingTopic {
    pub const ALL: [CounselingTopic; 7] = [
        CounselingTopic::Relationship,
        CounselingTopic::Family,
        CounselingTopic::Work,
        CounselingTopic::Health,
        CounselingTopic::Financial,
        CounselingTopic::Faith,
        CounselingTopic::Decision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CounselingTopic::Relationship => "relationship",
            CounselingTopic::Family => "family",
            CounselingTopic::Work => "work",
            CounselingTopic::Health => "health",
            CounselingTopic::Financial => "financial",
            CounselingTopic::Faith => "faith",
            CounselingTopic::Decision => "decision",
        }
    }

    pub fn themes(&self) -> &'static [&'static str] {
        match self {
            CounselingTopic::Relationship => &["사랑", "용서", "화해", "이해"],
            CounselingTopic::Family => &["가족", "사랑", "순종", "존경"],
            CounselingTopic::Work => &["일", "성실", "지혜", "인내"],
            CounselingTopic::Health => &["치유", "회복", "신뢰", "평안"],
            CounselingTopic::Financial => &["공급", "신뢰", "지혜", "만족"],
            CounselingTopic::Faith => &["믿음", "확신", "성장", "순종"],
            CounselingTopic::Decision => &["지혜", "인도", "분별", "기도"],
        }
    }

    /// Themes for a raw topic name, falling back to wisdom and guidance.
    pub fn themes_for(topic: &str) -> &'static [&'static str] {
        topic
            .parse::<CounselingTopic>()
            .map(|t| t.themes())
            .unwrap_or(&DEFAULT_COUNSELING_THEMES)
    }
}

impl fmt::Display for CounselingTopic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounselingTopic {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        CounselingTopic::ALL
            .iter()
            .find(|t| t.as_str() == name)
            .copied()
            .ok_or_else(|| DbError::validation(format!("unknown counseling topic '{name}'")))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            other => Err(DbError::validation(format!("unknown urgency '{other}'"))),
        }
    }
}

/// Where a counseling conversation currently stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CounselingStage {
    Greeting,
    #[default]
    Exploration,
    Guidance,
    Prayer,
    Closing,
}

impl FromStr for CounselingStage {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "greeting" => Ok(CounselingStage::Greeting),
            "exploration" => Ok(CounselingStage::Exploration),
            "guidance" => Ok(CounselingStage::Guidance),
            "prayer" => Ok(CounselingStage::Prayer),
            "closing" => Ok(CounselingStage::Closing),
            other => Err(DbError::validation(format!(
                "unknown counseling stage '{other}'"
            ))),
        }
    }
}

/// What the chat layer knows about a conversation when it asks for verses.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationContext {
    /// Most recent messages, oldest first.
    pub history: Vec<String>,
    /// Topics detected in the latest message.
    pub topics: Vec<String>,
    /// Detected emotion tag; `None` or `"neutral"` when nothing stood out.
    pub emotion: Option<String>,
    pub urgency: Urgency,
    pub stage: CounselingStage,
}

impl ConversationContext {
    /// The detected emotion, unless it is absent or neutral.
    pub fn salient_emotion(&self) -> Option<&str> {
        self.emotion
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty() && !e.eq_ignore_ascii_case(NEUTRAL_EMOTION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emotion_themes() {
        assert_eq!(Emotion::themes_for("sad"), &["위로", "소망", "평안"]);
        assert_eq!(Emotion::themes_for(" Lonely "), &["사랑", "위로", "동행"]);
        assert_eq!(Emotion::themes_for("unknown_tag"), &DEFAULT_EMOTION_THEMES);
        assert_eq!(Emotion::themes_for(""), &["위로", "소망"]);
    }

    #[test]
    fn counseling_themes() {
        assert_eq!(
            CounselingTopic::themes_for("work"),
            &["일", "성실", "지혜", "인내"]
        );
        assert_eq!(CounselingTopic::themes_for("gardening"), &["지혜", "인도"]);
    }

    #[test]
    fn vocabularies_round_trip() {
        for emotion in Emotion::ALL.iter() {
            assert_eq!(emotion.as_str().parse::<Emotion>().unwrap(), *emotion);
            assert!((2..=3).contains(&emotion.themes().len()));
        }
        for topic in CounselingTopic::ALL.iter() {
            assert_eq!(topic.as_str().parse::<CounselingTopic>().unwrap(), *topic);
        }
        assert_eq!("HIGH".parse::<Urgency>().unwrap(), Urgency::High);
        assert!("urgent".parse::<Urgency>().is_err());
        assert_eq!(Urgency::default(), Urgency::Medium);
        assert_eq!(CounselingStage::default(), CounselingStage::Exploration);
        assert_eq!(
            "closing".parse::<CounselingStage>().unwrap(),
            CounselingStage::Closing
        );
    }

    #[test]
    fn salient_emotion() {
        let mut context = ConversationContext::default();
        assert_eq!(context.salient_emotion(), None);

        context.emotion = Some("Neutral".to_string());
        assert_eq!(context.salient_emotion(), None);

        context.emotion = Some("anxious".to_string());
        assert_eq!(context.salient_emotion(), Some("anxious"));
    }
}
