use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use serde_derive::Serialize;

use crate::classifier::classify;
use crate::guidance::{CounselingTopic, Emotion};
use crate::schema::verses;
use crate::DbError;

/// Enum for the testaments in the Bible (Old or New). This is mapped
/// to the `testament` column of the `verses` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, AsExpression, FromSqlRow, Serialize)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum Testament {
    Old,
    New,
}

impl Testament {
    pub const ALL: [Testament; 2] = [Testament::Old, Testament::New];

    pub fn as_str(&self) -> &'static str {
        match self {
            Testament::Old => "old",
            Testament::New => "new",
        }
    }
}

impl fmt::Display for Testament {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Testament {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "old" => Ok(Testament::Old),
            "new" => Ok(Testament::New),
            other => Err(DbError::validation(format!("unknown testament '{other}'"))),
        }
    }
}

impl FromSql<Text, Sqlite> for Testament {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let testament = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        match testament.as_ref() {
            "old" => Ok(Testament::Old),
            "new" => Ok(Testament::New),
            _ => Err("Unexpected testament in the Bible".into()),
        }
    }
}

impl ToSql<Text, Sqlite> for Testament {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

/// The single classification a verse is filed under, derived from its
/// first matching theme.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    AsExpression,
    FromSqlRow,
    Serialize,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Faith,
    Love,
    Hope,
    Forgiveness,
    Wisdom,
    Comfort,
    Guidance,
    Strength,
    Peace,
    Joy,
    Prayer,
    Salvation,
    Family,
    Relationship,
    Work,
    Suffering,
    Healing,
    Gratitude,
    Humility,
    Obedience,
    Other,
}

impl Category {
    pub const ALL: [Category; 21] = [
        Category::Faith,
        Category::Love,
        Category::Hope,
        Category::Forgiveness,
        Category::Wisdom,
        Category::Comfort,
        Category::Guidance,
        Category::Strength,
        Category::Peace,
        Category::Joy,
        Category::Prayer,
        Category::Salvation,
        Category::Family,
        Category::Relationship,
        Category::Work,
        Category::Suffering,
        Category::Healing,
        Category::Gratitude,
        Category::Humility,
        Category::Obedience,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Faith => "faith",
            Category::Love => "love",
            Category::Hope => "hope",
            Category::Forgiveness => "forgiveness",
            Category::Wisdom => "wisdom",
            Category::Comfort => "comfort",
            Category::Guidance => "guidance",
            Category::Strength => "strength",
            Category::Peace => "peace",
            Category::Joy => "joy",
            Category::Prayer => "prayer",
            Category::Salvation => "salvation",
            Category::Family => "family",
            Category::Relationship => "relationship",
            Category::Work => "work",
            Category::Suffering => "suffering",
            Category::Healing => "healing",
            Category::Gratitude => "gratitude",
            Category::Humility => "humility",
            Category::Obedience => "obedience",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Category::ALL
            .iter()
            .find(|c| c.as_str() == name)
            .copied()
            .ok_or_else(|| DbError::validation(format!("unknown category '{name}'")))
    }
}

impl FromSql<Text, Sqlite> for Category {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let category = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        category
            .parse()
            .map_err(|_| format!("Unexpected verse category '{category}'").into())
    }
}

impl ToSql<Text, Sqlite> for Category {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

/// An ordered list of single-word terms, stored space-separated in a text
/// column. Keywords and themes never contain whitespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, AsExpression, FromSqlRow, Serialize)]
#[diesel(sql_type = Text)]
#[serde(transparent)]
pub struct TermList(pub Vec<String>);

impl Deref for TermList {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for TermList {
    fn from(terms: Vec<String>) -> Self {
        TermList(terms)
    }
}

impl FromSql<Text, Sqlite> for TermList {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let joined = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(TermList(
            joined.split_whitespace().map(str::to_string).collect(),
        ))
    }
}

impl ToSql<Text, Sqlite> for TermList {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.0.join(" "));
        Ok(IsNull::No)
    }
}

/// Model representing a stored Bible verse.
#[derive(Clone, Debug, Queryable, Selectable)]
#[diesel(table_name = verses)]
#[diesel(check_for_backend(Sqlite))]
pub struct Verse {
    pub id: i32,
    pub reference: String,
    pub book: String,
    pub chapter: i32,
    pub verse: i32,
    pub text: String,
    pub keywords: TermList,
    pub themes: TermList,
    pub category: Category,
    pub testament: Testament,
    pub search_text: String,
    pub usage_count: i32,
    pub last_used: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

/// A parsed and classified verse, ready to be inserted.
#[derive(Clone, Debug, PartialEq, Insertable)]
#[diesel(table_name = verses)]
pub struct NewVerse {
    pub reference: String,
    pub book: String,
    pub chapter: i32,
    pub verse: i32,
    pub text: String,
    pub keywords: TermList,
    pub themes: TermList,
    pub category: Category,
    pub testament: Testament,
    pub search_text: String,
}

impl NewVerse {
    /// Parses `reference` and classifies `text`.
    ///
    /// Fails with `InvalidReference` for a malformed reference and with
    /// `Validation` for blank text; nothing is partially built.
    pub fn new(reference: &str, text: &str) -> Result<NewVerse, DbError> {
        let parsed: Reference = reference.trim().parse()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(DbError::validation(format!(
                "verse text for '{parsed}' is empty"
            )));
        }

        let classification = classify(text);

        Ok(NewVerse {
            reference: parsed.to_string(),
            book: parsed.book,
            chapter: parsed.chapter,
            verse: parsed.verse,
            text: text.to_string(),
            keywords: classification.keywords.into(),
            themes: classification.themes.into(),
            category: classification.category,
            testament: parsed.testament,
            search_text: classification.search_text,
        })
    }
}

/// The outward view of a verse returned by the retrieval operations.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VerseSummary {
    pub reference: String,
    pub text: String,
    pub book: String,
    pub chapter: i32,
    pub verse: i32,
    pub themes: Vec<String>,
    pub category: Category,
    pub testament: Testament,
    pub usage_count: i32,
}

impl From<Verse> for VerseSummary {
    fn from(v: Verse) -> Self {
        VerseSummary {
            reference: v.reference,
            text: v.text,
            book: v.book,
            chapter: v.chapter,
            verse: v.verse,
            themes: v.themes.0,
            category: v.category,
            testament: v.testament,
            usage_count: v.usage_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThemeUsage {
    pub theme: String,
    pub verse_count: i64,
    pub usage_count: i64,
}

/// Aggregate counts over the whole verse collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total_verses: i64,
    pub old_testament: i64,
    pub new_testament: i64,
    /// Verse count per category, largest first.
    pub categories: Vec<CategoryCount>,
    /// The ten themes with the most accumulated usage.
    pub top_themes: Vec<ThemeUsage>,
}

/// Filter values available to callers: what is present in the store plus the
/// fixed request vocabularies.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Facets {
    pub categories: Vec<Category>,
    pub themes: Vec<String>,
    pub books: Vec<String>,
    pub emotions: Vec<&'static str>,
    pub counseling_topics: Vec<&'static str>,
    pub testaments: Vec<Testament>,
}

impl Facets {
    pub fn new(categories: Vec<Category>, themes: Vec<String>, books: Vec<String>) -> Facets {
        Facets {
            categories,
            themes,
            books,
            emotions: Emotion::ALL.iter().map(Emotion::as_str).collect(),
            counseling_topics: CounselingTopic::ALL
                .iter()
                .map(CounselingTopic::as_str)
                .collect(),
            testaments: Testament::ALL.to_vec(),
        }
    }
}

mod reference;
pub use self::reference::{find_book, parse_reference, testament_of, Book, Reference, BOOKS};
