use chrono::NaiveDateTime;
use diesel::dsl::{count_star, sum};
use diesel::prelude::*;
use diesel::r2d2::PooledConnection;
use diesel::sql_types::Integer;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::models::*;
use crate::{DbError, SqliteConnectionManager, SqliteConnectionPool};

/// Number of themes reported by `stats`.
const TOP_THEME_COUNT: usize = 10;

define_sql_function!(fn random() -> Integer);

/// Optional equality filters for full text search.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VerseFilter {
    pub category: Option<Category>,
    pub testament: Option<Testament>,
}

/// Trait implemented by stores that can hold and query classified verses.
///
/// Every query returns full [Verse](crate::models::Verse) rows; none of them
/// touches usage counts except `record_usage`.
pub trait SwordDrillable {
    /// Inserts a batch of verses, skipping any whose reference is already
    /// stored. Returns how many rows were actually inserted.
    fn insert_verses(&self, verses: &[NewVerse]) -> Result<usize, DbError>;

    /// Looks up one verse by its exact reference string.
    fn verse(&self, reference: &str) -> Result<Option<Verse>, DbError>;

    /// Searches the full text index.
    ///
    /// Each word of the query is matched as a prefix and any word may match.
    /// If the query contains a quotation mark, the words are matched as a
    /// single phrase instead. All characters other than word characters and
    /// whitespace are stripped out; a query with nothing left yields no rows.
    ///
    /// Ordered by relevance, best first, then by usage count descending.
    fn search(&self, query: &str, filter: &VerseFilter, limit: i64)
        -> Result<Vec<Verse>, DbError>;

    /// Verses tagged with any of the given themes, most used first, then
    /// most recently created.
    fn themed(&self, themes: &[String], limit: i64) -> Result<Vec<Verse>, DbError>;

    /// Verses filed under `category`, most used first.
    fn in_category(&self, category: Category, limit: i64) -> Result<Vec<Verse>, DbError>;

    /// Verses ordered by usage count descending.
    fn most_used(&self, limit: i64) -> Result<Vec<Verse>, DbError>;

    /// A uniform random sample of up to `size` verses.
    fn sample(&self, category: Option<Category>, size: i64) -> Result<Vec<Verse>, DbError>;

    /// Adds one to the usage count of each verse in `ids` and stamps
    /// `last_used`. Returns the number of rows updated.
    fn record_usage(&self, ids: &[i32], at: NaiveDateTime) -> Result<usize, DbError>;

    fn stats(&self) -> Result<Stats, DbError>;

    fn facets(&self) -> Result<Facets, DbError>;
}

/// SQLite implementation of [SwordDrillable](crate::sword_drill::SwordDrillable).
#[derive(Clone)]
pub struct SwordDrill {
    pool: SqliteConnectionPool,
}

impl SwordDrill {
    pub fn new(pool: SqliteConnectionPool) -> SwordDrill {
        SwordDrill { pool }
    }

    pub fn pool(&self) -> &SqliteConnectionPool {
        &self.pool
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, DbError> {
        self.pool.get().map_err(DbError::from)
    }
}

impl SwordDrillable for SwordDrill {
    fn insert_verses(&self, batch: &[NewVerse]) -> Result<usize, DbError> {
        use crate::schema::{verse_themes, verses};

        if batch.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        conn.transaction::<usize, diesel::result::Error, _>(|c| {
            let mut stored = 0;
            for new_verse in batch {
                let inserted = diesel::insert_or_ignore_into(verses::table)
                    .values(new_verse)
                    .execute(c)?;
                if inserted == 0 {
                    debug!("Skipping duplicate reference {}", new_verse.reference);
                    continue;
                }

                let id: i32 = verses::table
                    .filter(verses::reference.eq(&new_verse.reference))
                    .select(verses::id)
                    .first(c)?;
                for theme in new_verse.themes.iter() {
                    diesel::insert_or_ignore_into(verse_themes::table)
                        .values((verse_themes::verse_id.eq(id), verse_themes::theme.eq(theme)))
                        .execute(c)?;
                }
                stored += 1;
            }
            Ok(stored)
        })
        .map_err(DbError::from)
    }

    fn verse(&self, reference: &str) -> Result<Option<Verse>, DbError> {
        use crate::schema::verses;

        verses::table
            .filter(verses::reference.eq(reference))
            .select(Verse::as_select())
            .first(&mut self.conn()?)
            .optional()
            .map_err(DbError::from)
    }

    fn search(
        &self,
        query: &str,
        filter: &VerseFilter,
        limit: i64,
    ) -> Result<Vec<Verse>, DbError> {
        use crate::schema::{verses, verses_fts};

        let fts_query = match match_expression(query) {
            Some(q) => q,
            // Don't even try to run the query if there are no characters
            None => return Ok(vec![]),
        };

        let mut query = verses::table
            .inner_join(verses_fts::table.on(verses_fts::rowid.eq(verses::id)))
            .filter(verses_fts::document.eq(fts_query))
            .select(Verse::as_select())
            .into_boxed();

        if let Some(category) = filter.category {
            query = query.filter(verses::category.eq(category));
        }
        if let Some(testament) = filter.testament {
            query = query.filter(verses::testament.eq(testament));
        }

        query
            .order_by((verses_fts::rank.asc(), verses::usage_count.desc()))
            .limit(limit)
            .load(&mut self.conn()?)
            .map_err(DbError::from)
    }

    fn themed(&self, themes: &[String], limit: i64) -> Result<Vec<Verse>, DbError> {
        use crate::schema::{verse_themes, verses};

        if themes.is_empty() {
            return Ok(vec![]);
        }

        let tagged = verse_themes::table
            .filter(verse_themes::theme.eq_any(themes.to_vec()))
            .select(verse_themes::verse_id);

        verses::table
            .filter(verses::id.eq_any(tagged))
            .select(Verse::as_select())
            .order_by((
                verses::usage_count.desc(),
                verses::created_at.desc(),
                verses::id.desc(),
            ))
            .limit(limit)
            .load(&mut self.conn()?)
            .map_err(DbError::from)
    }

    fn in_category(&self, category: Category, limit: i64) -> Result<Vec<Verse>, DbError> {
        use crate::schema::verses;

        verses::table
            .filter(verses::category.eq(category))
            .select(Verse::as_select())
            .order_by((verses::usage_count.desc(), verses::id.asc()))
            .limit(limit)
            .load(&mut self.conn()?)
            .map_err(DbError::from)
    }

    fn most_used(&self, limit: i64) -> Result<Vec<Verse>, DbError> {
        use crate::schema::verses;

        verses::table
            .select(Verse::as_select())
            .order_by((verses::usage_count.desc(), verses::id.asc()))
            .limit(limit)
            .load(&mut self.conn()?)
            .map_err(DbError::from)
    }

    fn sample(&self, category: Option<Category>, size: i64) -> Result<Vec<Verse>, DbError> {
        use crate::schema::verses;

        let mut query = verses::table.select(Verse::as_select()).into_boxed();
        if let Some(category) = category {
            query = query.filter(verses::category.eq(category));
        }

        query
            .order_by(random())
            .limit(size)
            .load(&mut self.conn()?)
            .map_err(DbError::from)
    }

    fn record_usage(&self, ids: &[i32], at: NaiveDateTime) -> Result<usize, DbError> {
        use crate::schema::verses;

        if ids.is_empty() {
            return Ok(0);
        }

        diesel::update(verses::table.filter(verses::id.eq_any(ids.to_vec())))
            .set((
                verses::usage_count.eq(verses::usage_count + 1),
                verses::last_used.eq(Some(at)),
            ))
            .execute(&mut self.conn()?)
            .map_err(DbError::from)
    }

    fn stats(&self) -> Result<Stats, DbError> {
        use crate::schema::{verse_themes, verses};

        let mut conn = self.conn()?;

        let total_verses: i64 = verses::table.count().get_result(&mut conn)?;
        let old_testament: i64 = verses::table
            .filter(verses::testament.eq(Testament::Old))
            .count()
            .get_result(&mut conn)?;
        let new_testament: i64 = verses::table
            .filter(verses::testament.eq(Testament::New))
            .count()
            .get_result(&mut conn)?;

        let mut categories: Vec<CategoryCount> = verses::table
            .group_by(verses::category)
            .select((verses::category, count_star()))
            .load::<(Category, i64)>(&mut conn)?
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();
        categories.sort_by(|a, b| b.count.cmp(&a.count).then(a.category.cmp(&b.category)));

        let mut top_themes: Vec<ThemeUsage> = verse_themes::table
            .inner_join(verses::table)
            .group_by(verse_themes::theme)
            .select((verse_themes::theme, count_star(), sum(verses::usage_count)))
            .load::<(String, i64, Option<i64>)>(&mut conn)?
            .into_iter()
            .map(|(theme, verse_count, usage_count)| ThemeUsage {
                theme,
                verse_count,
                usage_count: usage_count.unwrap_or(0),
            })
            .collect();
        top_themes.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then(b.verse_count.cmp(&a.verse_count))
                .then(a.theme.cmp(&b.theme))
        });
        top_themes.truncate(TOP_THEME_COUNT);

        Ok(Stats {
            total_verses,
            old_testament,
            new_testament,
            categories,
            top_themes,
        })
    }

    fn facets(&self) -> Result<Facets, DbError> {
        use crate::schema::{verse_themes, verses};

        let mut conn = self.conn()?;

        let mut categories: Vec<Category> = verses::table
            .select(verses::category)
            .distinct()
            .load(&mut conn)?;
        categories.sort_by_key(|c| c.as_str());

        let themes: Vec<String> = verse_themes::table
            .select(verse_themes::theme)
            .distinct()
            .order_by(verse_themes::theme.asc())
            .load(&mut conn)?;

        let books: Vec<String> = verses::table
            .select(verses::book)
            .distinct()
            .order_by(verses::book.asc())
            .load(&mut conn)?;

        Ok(Facets::new(categories, themes, books))
    }
}

/// Builds an FTS5 match expression from free text, or `None` if nothing
/// searchable is left.
fn match_expression(query: &str) -> Option<String> {
    lazy_static! {
        static ref NON_WORD: Regex = Regex::new(r"[^\w\s]+").unwrap();
    }

    let had_quote = query.contains('"');

    // Replace all characters that aren't word characters or space
    let cleaned = NON_WORD.replace_all(query, " ");
    let terms: Vec<&str> = cleaned.split_whitespace().collect();
    if terms.is_empty() {
        return None;
    }

    // Add back quotes safely if it had a quote before, and was removed.
    // This makes FTS5 query the string as a phrase.
    Some(if had_quote {
        format!("\"{}\"*", terms.join(" "))
    } else {
        terms
            .iter()
            .map(|t| format!("\"{t}\"*"))
            .collect::<Vec<_>>()
            .join(" OR ")
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::test_support::*;

    fn references(verses: &[Verse]) -> Vec<&str> {
        verses.iter().map(|v| v.reference.as_str()).collect()
    }

    #[test]
    fn match_expressions() {
        assert_eq!(match_expression("사랑"), Some("\"사랑\"*".to_string()));
        assert_eq!(
            match_expression("사랑, 믿음!"),
            Some("\"사랑\"* OR \"믿음\"*".to_string())
        );
        assert_eq!(
            match_expression("\"나의 목자\""),
            Some("\"나의 목자\"*".to_string())
        );
        assert_eq!(match_expression("  ?! "), None);
        assert_eq!(match_expression(""), None);
    }

    #[test]
    fn insert_skips_duplicates() {
        let drill = memory_drill();
        let batch = vec![
            NewVerse::new("창1:1", "태초에 하나님이 천지를 창조하시니라").unwrap(),
            NewVerse::new("요3:16", "하나님이 세상을 이처럼 사랑하사").unwrap(),
            NewVerse::new("창1:1", "중복된 구절").unwrap(),
        ];

        assert_eq!(drill.insert_verses(&batch).unwrap(), 2);
        assert_eq!(drill.insert_verses(&batch[..1]).unwrap(), 0);
        assert_eq!(
            drill.verse("창1:1").unwrap().unwrap().text,
            "태초에 하나님이 천지를 창조하시니라"
        );
    }

    #[test]
    fn lookup() {
        let drill = seeded_drill(SAMPLE_VERSES);

        let verse = drill.verse("요3:16").unwrap().unwrap();
        assert_eq!(verse.book, "요한복음");
        assert_eq!(verse.category, Category::Love);
        assert_eq!(verse.testament, Testament::New);
        assert_eq!(&verse.themes[..], &["사랑".to_string()]);
        assert!(verse.keywords.contains(&"사랑하사".to_string()));
        assert_eq!(verse.usage_count, 0);
        assert_eq!(verse.last_used, None);

        assert!(drill.verse("요3:17").unwrap().is_none());
    }

    #[test]
    fn full_text() {
        let drill = seeded_drill(SAMPLE_VERSES);
        let everything = VerseFilter::default();

        // Prefix matching reaches inflected words.
        let result = drill.search("사랑", &everything, 10).unwrap();
        assert_eq!(references(&result), vec!["요3:16"]);

        // Any word may match.
        let result = drill.search("희망 명철", &everything, 10).unwrap();
        let mut found = references(&result);
        found.sort();
        assert_eq!(found, vec!["렘29:11", "잠3:5"]);

        let new_only = VerseFilter {
            testament: Some(Testament::New),
            ..VerseFilter::default()
        };
        let result = drill.search("하나님", &new_only, 10).unwrap();
        let mut found = references(&result);
        found.sort();
        assert_eq!(found, vec!["빌4:6", "요3:16"]);

        let love_only = VerseFilter {
            category: Some(Category::Love),
            ..VerseFilter::default()
        };
        let result = drill.search("하나님", &love_only, 10).unwrap();
        assert_eq!(references(&result), vec!["요3:16"]);

        assert_eq!(drill.search("하나님", &everything, 2).unwrap().len(), 2);
        assert!(drill.search("!!!", &everything, 10).unwrap().is_empty());
    }

    #[test]
    fn full_text_phrase() {
        let drill = seeded_drill(SAMPLE_VERSES);

        let result = drill
            .search("\"함께 하심이라\"", &VerseFilter::default(), 10)
            .unwrap();
        assert_eq!(references(&result), vec!["시23:4"]);
    }

    #[test]
    fn full_text_ties_broken_by_usage() {
        let text = "여호와는 나의 목자시니 내게 부족함이 없으리로다";
        let drill = seeded_drill(&[("시23:1", text), ("시100:1", text)]);
        set_usage(&drill, "시100:1", 4);

        let result = drill.search("목자", &VerseFilter::default(), 10).unwrap();
        assert_eq!(references(&result), vec!["시100:1", "시23:1"]);
    }

    #[test]
    fn themes() {
        let drill = seeded_drill(SAMPLE_VERSES);

        // Equal usage: the most recently inserted verse comes first.
        let result = drill.themed(&["위로".to_string()], 10).unwrap();
        assert_eq!(references(&result), vec!["렘29:11", "시23:4"]);

        set_usage(&drill, "시23:4", 2);
        let result = drill.themed(&["위로".to_string()], 10).unwrap();
        assert_eq!(references(&result), vec!["시23:4", "렘29:11"]);

        let result = drill
            .themed(&["일".to_string(), "지혜".to_string(), "성실".to_string()], 10)
            .unwrap();
        let mut found = references(&result);
        found.sort();
        assert_eq!(found, vec!["빌4:6", "잠3:5", "전9:10"]);

        assert!(drill.themed(&[], 10).unwrap().is_empty());
        assert!(drill.themed(&["동행".to_string()], 10).unwrap().is_empty());
    }

    #[test]
    fn most_used_and_usage() {
        let drill = seeded_drill(&SAMPLE_VERSES[..4]);
        for (reference, count) in [("창1:1", 5), ("요3:16", 1), ("빌4:6", 9), ("시23:4", 3)] {
            set_usage(&drill, reference, count);
        }

        let result = drill.most_used(4).unwrap();
        assert_eq!(
            result.iter().map(|v| v.usage_count).collect::<Vec<_>>(),
            vec![9, 5, 3, 1]
        );

        let ids: Vec<i32> = result.iter().take(2).map(|v| v.id).collect();
        let now = Utc::now().naive_utc();
        assert_eq!(drill.record_usage(&ids, now).unwrap(), 2);
        assert_eq!(usage_of(&drill, "빌4:6"), 10);
        assert_eq!(usage_of(&drill, "창1:1"), 6);
        assert_eq!(usage_of(&drill, "요3:16"), 1);
        assert!(drill.verse("빌4:6").unwrap().unwrap().last_used.is_some());
    }

    #[test]
    fn category_and_sample() {
        let drill = seeded_drill(SAMPLE_VERSES);

        let result = drill.in_category(Category::Other, 10).unwrap();
        assert_eq!(references(&result), vec!["창1:1", "사41:10"]);

        let result = drill.sample(Some(Category::Other), 10).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|v| v.category == Category::Other));

        assert_eq!(drill.sample(None, 3).unwrap().len(), 3);
        assert_eq!(drill.sample(None, 100).unwrap().len(), SAMPLE_VERSES.len());
    }

    #[test]
    fn stats_and_facets() {
        let drill = seeded_drill(SAMPLE_VERSES);
        set_usage(&drill, "시23:4", 7);

        let stats = drill.stats().unwrap();
        assert_eq!(stats.total_verses, 8);
        assert_eq!(stats.old_testament, 6);
        assert_eq!(stats.new_testament, 2);
        assert_eq!(
            stats.categories[0],
            CategoryCount {
                category: Category::Other,
                count: 2
            }
        );
        assert_eq!(
            stats.categories.iter().map(|c| c.count).sum::<i64>(),
            stats.total_verses
        );
        assert_eq!(
            stats.top_themes[0],
            ThemeUsage {
                theme: "위로".to_string(),
                verse_count: 2,
                usage_count: 7
            }
        );

        let facets = drill.facets().unwrap();
        assert!(facets.books.contains(&"창세기".to_string()));
        assert_eq!(facets.books.len(), 8);
        assert!(facets.themes.contains(&"위로".to_string()));
        assert!(facets.categories.contains(&Category::Other));
        assert_eq!(facets.emotions.len(), 8);
        assert_eq!(facets.counseling_topics.len(), 7);
    }
}
