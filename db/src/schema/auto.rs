table! {
    verse_themes (verse_id, theme) {
        verse_id -> Integer,
        theme -> Text,
    }
}

table! {
    verses (id) {
        id -> Integer,
        reference -> Text,
        book -> Text,
        chapter -> Integer,
        verse -> Integer,
        text -> Text,
        keywords -> Text,
        themes -> Text,
        category -> Text,
        testament -> Text,
        search_text -> Text,
        usage_count -> Integer,
        last_used -> Nullable<Timestamp>,
        created_at -> Timestamp,
    }
}

joinable!(verse_themes -> verses (verse_id));

allow_tables_to_appear_in_same_query!(verse_themes, verses,);
