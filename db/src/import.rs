//! Bulk loading of verse data.

use std::fs;
use std::path::Path;

use log::{info, warn};
use rayon::prelude::*;
use serde_derive::Serialize;
use serde_json::Value;

use crate::models::NewVerse;
use crate::sword_drill::SwordDrillable;
use crate::DbError;

/// Outcome of an import run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Rows actually inserted.
    pub stored: usize,
    /// Well-formed entries whose reference was already stored.
    pub skipped: usize,
    /// Entries with a malformed reference or empty text.
    pub rejected: usize,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.stored + self.skipped + self.rejected
    }
}

/// Parses, classifies and stores `(reference, text)` pairs in batches of
/// `batch_size`, keeping their order.
///
/// Bad entries are logged and counted; they never fail the import. A store
/// failure stops the import and is returned.
pub fn load_verses<S>(
    store: &S,
    pairs: &[(String, String)],
    batch_size: usize,
) -> Result<ImportReport, DbError>
where
    S: SwordDrillable + ?Sized,
{
    let mut report = ImportReport::default();
    let batches = pairs.chunks(batch_size.max(1));
    let batch_count = batches.len();

    for (i, batch) in batches.enumerate() {
        let parsed: Vec<Result<NewVerse, DbError>> = batch
            .par_iter()
            .map(|(reference, text)| NewVerse::new(reference, text))
            .collect();

        let mut verses = Vec::with_capacity(parsed.len());
        for (entry, result) in batch.iter().zip(parsed) {
            match result {
                Ok(verse) => verses.push(verse),
                Err(e) => {
                    warn!("Skipping entry '{}': {}", entry.0, e);
                    report.rejected += 1;
                }
            }
        }

        let stored = store.insert_verses(&verses)?;
        report.stored += stored;
        report.skipped += verses.len() - stored;

        info!(
            "Imported batch {}/{} ({} stored so far)",
            i + 1,
            batch_count,
            report.stored
        );
    }

    Ok(report)
}

/// Reads a JSON object of `reference: text` entries, in file order.
pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Vec<(String, String)>, DbError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| DbError::Import {
        cause: format!("{}: {}", path.display(), e),
    })?;
    parse_json(&contents)
}

fn parse_json(contents: &str) -> Result<Vec<(String, String)>, DbError> {
    let value: Value = serde_json::from_str(contents).map_err(|e| DbError::Import {
        cause: e.to_string(),
    })?;

    let entries = match value {
        Value::Object(entries) => entries,
        _ => {
            return Err(DbError::Import {
                cause: "expected an object of reference to verse text".to_string(),
            })
        }
    };

    entries
        .into_iter()
        .map(|(reference, text)| match text {
            Value::String(text) => Ok((reference, text)),
            other => Err(DbError::Import {
                cause: format!("text for '{}' is not a string: {}", reference, other),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::test_support::*;

    fn owned(data: &[(&str, &str)]) -> Vec<(String, String)> {
        data.iter()
            .map(|(r, t)| (r.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn loads_in_small_batches() {
        let drill = memory_drill();
        let report = load_verses(&drill, &owned(SAMPLE_VERSES), 3).unwrap();

        assert_eq!(
            report,
            ImportReport {
                stored: 8,
                skipped: 0,
                rejected: 0
            }
        );
        assert_eq!(drill.stats().unwrap().total_verses, 8);

        let verse = drill.verse("빌4:6").unwrap().unwrap();
        assert_eq!(&verse.themes[..], &["용서", "기쁨", "기도", "일", "감사"]);
        assert_eq!(verse.category, Category::Forgiveness);
    }

    #[test]
    fn counts_bad_and_duplicate_entries() {
        let drill = seeded_drill(&SAMPLE_VERSES[..2]);
        let pairs = owned(&[
            ("창1:1", "태초에 하나님이 천지를 창조하시니라"),
            ("창1", "장만 있는 참조"),
            ("요3:17", "   "),
            ("요3:17", "하나님이 그 아들을 세상에 보내신 것은 세상을 심판하려 하심이 아니요"),
            ("0:0", "숫자뿐"),
        ]);

        let report = load_verses(&drill, &pairs, 2).unwrap();
        assert_eq!(report.stored, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.rejected, 3);
        assert_eq!(report.total(), pairs.len());
        assert_eq!(drill.stats().unwrap().total_verses, 3);
    }

    #[test]
    fn empty_input() {
        let drill = memory_drill();
        assert_eq!(load_verses(&drill, &[], 0).unwrap(), ImportReport::default());
    }

    #[test]
    fn json_keeps_file_order() {
        let json = r#"{"요3:16": "하나님이 세상을", "창1:1": "태초에", "시23:1": "여호와는"}"#;
        let pairs = parse_json(json).unwrap();
        let references: Vec<&str> = pairs.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(references, vec!["요3:16", "창1:1", "시23:1"]);
    }

    #[test]
    fn json_rejects_other_shapes() {
        assert!(matches!(parse_json("[1, 2]"), Err(DbError::Import { .. })));
        assert!(matches!(parse_json(r#"{"창1:1": 3}"#), Err(DbError::Import { .. })));
        assert!(matches!(parse_json("{"), Err(DbError::Import { .. })));
        assert!(matches!(
            read_json("/nonexistent/verses.json"),
            Err(DbError::Import { .. })
        ));
    }
}
