//! The query surface used by the chat and prayer flows.
//!
//! Every operation that returns verses also counts them as used, so the
//! popularity ranking reflects what callers were actually shown.

use std::collections::HashSet;

use chrono::Utc;
use log::{debug, warn};

use crate::guidance::{
    ConversationContext, CounselingTopic, Emotion, Urgency, COMFORT_THEMES,
    DEFAULT_PRAYER_THEMES,
};
use crate::models::{Category, Facets, Stats, Testament, Verse, VerseSummary};
use crate::sword_drill::{SwordDrill, SwordDrillable, VerseFilter};
use crate::DbError;

/// Largest result set for searches, category listings and popularity.
pub const MAX_SEARCH_LIMIT: i64 = 50;

/// Largest result set for emotion, counseling and random recommendations.
pub const MAX_RECOMMENDATION_LIMIT: i64 = 20;

/// Comfort verses placed ahead of topical ones for urgent counseling.
const URGENT_COMFORT_COUNT: i64 = 3;

const CONVERSATION_VERSE_LIMIT: i64 = 5;
const CONVERSATION_FALLBACK_LIMIT: i64 = 3;
const PRAYER_VERSE_LIMIT: i64 = 3;

/// Options for [search_by_keywords](VerseFinder::search_by_keywords).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchOptions {
    pub category: Option<Category>,
    pub testament: Option<Testament>,
    pub limit: i64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            category: None,
            testament: None,
            limit: 10,
        }
    }
}

/// Restores the lenient behaviour of treating any failure as "no verses".
pub trait OrEmpty<T> {
    fn or_empty(self) -> Vec<T>;
}

impl<T> OrEmpty<T> for Result<Vec<T>, DbError> {
    fn or_empty(self) -> Vec<T> {
        self.unwrap_or_else(|e| {
            warn!("Returning no verses after error: {}", e);
            Vec::new()
        })
    }
}

/// Retrieval operations over a verse store.
pub struct VerseFinder<S = SwordDrill> {
    store: S,
}

impl<S: SwordDrillable> VerseFinder<S> {
    pub fn new(store: S) -> VerseFinder<S> {
        VerseFinder { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Full text search, best match first and more used verses first among
    /// equally good matches.
    ///
    /// A blank query is rejected before the store is contacted.
    pub fn search_by_keywords(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<VerseSummary>, DbError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DbError::validation("search query must not be empty"));
        }
        let limit = clamp(options.limit, MAX_SEARCH_LIMIT);
        if limit == 0 {
            return Ok(vec![]);
        }

        let filter = VerseFilter {
            category: options.category,
            testament: options.testament,
        };
        let verses = self.fetch("search_by_keywords", || {
            self.store.search(query, &filter, limit)
        })?;
        Ok(self.surface(verses))
    }

    /// Verses carrying any of `themes`, most used first. No themes match
    /// nothing.
    pub fn search_by_themes<T: AsRef<str>>(
        &self,
        themes: &[T],
        limit: i64,
    ) -> Result<Vec<VerseSummary>, DbError> {
        let themes = owned_themes(themes);
        let limit = clamp(limit, MAX_SEARCH_LIMIT);
        if themes.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        let verses = self.fetch("search_by_themes", || self.store.themed(&themes, limit))?;
        Ok(self.surface(verses))
    }

    /// Verses suited to an emotion tag such as `"anxious"`. Unrecognized tags
    /// get comfort and hope verses.
    pub fn verses_for_emotion(
        &self,
        emotion: &str,
        limit: i64,
    ) -> Result<Vec<VerseSummary>, DbError> {
        if emotion.parse::<Emotion>().is_err() {
            debug!("Unrecognized emotion '{}', using default themes", emotion);
        }
        self.search_by_themes(
            Emotion::themes_for(emotion),
            clamp(limit, MAX_RECOMMENDATION_LIMIT),
        )
    }

    /// Verses for a counseling topic such as `"work"`. For urgent requests up
    /// to three comfort and hope verses lead the list, which is then cut to
    /// `limit`.
    pub fn verses_for_counseling(
        &self,
        topic: &str,
        urgency: Urgency,
        limit: i64,
    ) -> Result<Vec<VerseSummary>, DbError> {
        let limit = clamp(limit, MAX_RECOMMENDATION_LIMIT);
        if limit == 0 {
            return Ok(vec![]);
        }
        if topic.parse::<CounselingTopic>().is_err() {
            debug!("Unrecognized counseling topic '{}', using default themes", topic);
        }

        let themes = owned_themes(CounselingTopic::themes_for(topic));
        let topical = self.fetch("verses_for_counseling", || {
            self.store.themed(&themes, limit)
        })?;

        let verses = if urgency == Urgency::High {
            let comfort = owned_themes(&COMFORT_THEMES);
            let comforting = self.fetch("verses_for_counseling", || {
                self.store.themed(&comfort, URGENT_COMFORT_COUNT)
            })?;

            let mut seen = HashSet::new();
            comforting
                .into_iter()
                .chain(topical)
                .filter(|v| seen.insert(v.id))
                .take(limit as usize)
                .collect()
        } else {
            topical
        };

        Ok(self.surface(verses))
    }

    /// The most used verses.
    pub fn popular_verses(&self, limit: i64) -> Result<Vec<VerseSummary>, DbError> {
        let limit = clamp(limit, MAX_SEARCH_LIMIT);
        if limit == 0 {
            return Ok(vec![]);
        }

        let verses = self.fetch("popular_verses", || self.store.most_used(limit))?;
        Ok(self.surface(verses))
    }

    /// A random selection, optionally restricted to one category.
    pub fn random_verses(
        &self,
        category: Option<Category>,
        limit: i64,
    ) -> Result<Vec<VerseSummary>, DbError> {
        let limit = clamp(limit, MAX_RECOMMENDATION_LIMIT);
        if limit == 0 {
            return Ok(vec![]);
        }

        let mut verses = self.fetch("random_verses", || {
            self.store.sample(category, limit * 2)
        })?;
        verses.truncate(limit as usize);
        Ok(self.surface(verses))
    }

    /// Verses filed under `category`, most used first.
    pub fn verses_in_category(
        &self,
        category: Category,
        limit: i64,
    ) -> Result<Vec<VerseSummary>, DbError> {
        let limit = clamp(limit, MAX_SEARCH_LIMIT);
        if limit == 0 {
            return Ok(vec![]);
        }

        let verses = self.fetch("verses_in_category", || {
            self.store.in_category(category, limit)
        })?;
        Ok(self.surface(verses))
    }

    /// Looks up a single verse by reference, e.g. `"요3:16"`.
    pub fn verse(&self, reference: &str) -> Result<Option<VerseSummary>, DbError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(DbError::validation("reference must not be empty"));
        }

        let found = self.store.verse(reference).map_err(|e| {
            warn!("verse lookup for {} failed: {}", reference, e);
            e
        })?;
        Ok(found.and_then(|v| self.surface(vec![v]).pop()))
    }

    /// Picks verses for a chat reply: detected topics first, then the
    /// detected emotion, then a few random verses so a reply always has some.
    pub fn verses_for_conversation(
        &self,
        context: &ConversationContext,
    ) -> Result<Vec<VerseSummary>, DbError> {
        let mut verses = Vec::new();

        let topics = context.topics.join(" ");
        if !topics.trim().is_empty() {
            let options = SearchOptions {
                limit: CONVERSATION_VERSE_LIMIT,
                ..SearchOptions::default()
            };
            verses = self.search_by_keywords(&topics, &options)?;
        }

        if verses.is_empty() {
            if let Some(emotion) = context.salient_emotion() {
                verses = self.verses_for_emotion(emotion, CONVERSATION_VERSE_LIMIT)?;
            }
        }

        if verses.is_empty() {
            verses = self.random_verses(None, CONVERSATION_FALLBACK_LIMIT)?;
        }

        Ok(verses)
    }

    /// Verses to weave into a prayer on the given topics, or comfort, hope
    /// and gratitude verses when no topic is given.
    pub fn verses_for_prayer<T: AsRef<str>>(
        &self,
        topics: &[T],
    ) -> Result<Vec<VerseSummary>, DbError> {
        if owned_themes(topics).is_empty() {
            self.search_by_themes(&DEFAULT_PRAYER_THEMES, PRAYER_VERSE_LIMIT)
        } else {
            self.search_by_themes(topics, PRAYER_VERSE_LIMIT)
        }
    }

    pub fn stats(&self) -> Result<Stats, DbError> {
        self.store.stats().map_err(|e| {
            warn!("stats failed: {}", e);
            e
        })
    }

    /// Categories, themes and books present in the store, plus the fixed
    /// request vocabularies.
    pub fn options(&self) -> Result<Facets, DbError> {
        self.store.facets().map_err(|e| {
            warn!("options failed: {}", e);
            e
        })
    }

    fn fetch<F>(&self, operation: &str, query: F) -> Result<Vec<Verse>, DbError>
    where
        F: FnOnce() -> Result<Vec<Verse>, DbError>,
    {
        query().map_err(|e| {
            warn!("{} failed: {}", operation, e);
            e
        })
    }

    /// Counts the verses as used and converts them for the caller.
    ///
    /// A failed usage update is logged and does not fail the read.
    fn surface(&self, mut verses: Vec<Verse>) -> Vec<VerseSummary> {
        if !verses.is_empty() {
            let now = Utc::now().naive_utc();
            let ids: Vec<i32> = verses.iter().map(|v| v.id).collect();
            match self.store.record_usage(&ids, now) {
                Ok(_) => verses.iter_mut().for_each(|v| {
                    v.usage_count += 1;
                    v.last_used = Some(now);
                }),
                Err(e) => warn!("Could not record usage of {} verses: {}", ids.len(), e),
            }
        }
        verses.into_iter().map(VerseSummary::from).collect()
    }
}

fn clamp(limit: i64, max: i64) -> i64 {
    limit.clamp(0, max)
}

fn owned_themes<T: AsRef<str>>(themes: &[T]) -> Vec<String> {
    themes
        .iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
