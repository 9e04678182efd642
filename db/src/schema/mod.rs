pub use self::auto::*;

table! {
    verses_fts (rowid) {
        rowid -> Integer,
        #[sql_name = "verses_fts"]
        document -> Text,
        search_text -> Text,
        rank -> Float,
    }
}

allow_tables_to_appear_in_same_query!(verses, verses_fts);

mod auto;
