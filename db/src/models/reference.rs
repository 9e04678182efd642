use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::{Match, Regex};
use serde_derive::Serialize;

use super::Testament;
use crate::DbError;

/// A book of the Bible as named by a Korean citation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Book {
    pub abbreviation: &'static str,
    pub name: &'static str,
    pub testament: Testament,
}

macro_rules! books {
    ($($testament:ident: $($abbr:literal => $name:literal),+;)+) => {
        [$($(Book { abbreviation: $abbr, name: $name, testament: Testament::$testament }),+),+]
    };
}

/// The 66 books of the Protestant canon, in canonical order.
pub static BOOKS: [Book; 66] = books! {
    Old:
        "창" => "창세기", "출" => "출애굽기", "레" => "레위기", "민" => "민수기",
        "신" => "신명기", "수" => "여호수아", "삿" => "사사기", "룻" => "룻기",
        "삼상" => "사무엘상", "삼하" => "사무엘하", "왕상" => "열왕기상", "왕하" => "열왕기하",
        "대상" => "역대상", "대하" => "역대하", "스" => "에스라", "느" => "느헤미야",
        "에" => "에스더", "욥" => "욥기", "시" => "시편", "잠" => "잠언",
        "전" => "전도서", "아" => "아가", "사" => "이사야", "렘" => "예레미야",
        "애" => "예레미야애가", "겔" => "에스겔", "단" => "다니엘", "호" => "호세아",
        "욜" => "요엘", "암" => "아모스", "옵" => "오바댜", "욘" => "요나",
        "미" => "미가", "나" => "나훔", "합" => "하박국", "습" => "스바냐",
        "학" => "학개", "슥" => "스가랴", "말" => "말라기";
    New:
        "마" => "마태복음", "막" => "마가복음", "눅" => "누가복음", "요" => "요한복음",
        "행" => "사도행전", "롬" => "로마서", "고전" => "고린도전서", "고후" => "고린도후서",
        "갈" => "갈라디아서", "엡" => "에베소서", "빌" => "빌립보서", "골" => "골로새서",
        "살전" => "데살로니가전서", "살후" => "데살로니가후서", "딤전" => "디모데전서",
        "딤후" => "디모데후서", "딛" => "디도서", "몬" => "빌레몬서", "히" => "히브리서",
        "약" => "야고보서", "벧전" => "베드로전서", "벧후" => "베드로후서", "요일" => "요한일서",
        "요이" => "요한이서", "요삼" => "요한삼서", "유" => "유다서", "계" => "요한계시록";
};

/// Looks up a book by its citation abbreviation.
pub fn find_book(abbreviation: &str) -> Option<&'static Book> {
    BOOKS.iter().find(|b| b.abbreviation == abbreviation)
}

/// Old Testament membership is decided by the book table; anything not
/// listed there, including unknown abbreviations, counts as New.
pub fn testament_of(abbreviation: &str) -> Testament {
    find_book(abbreviation)
        .map(|b| b.testament)
        .unwrap_or(Testament::New)
}

/// Model representing a single-verse citation such as `창1:1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// The abbreviation as written in the citation.
    pub abbreviation: String,
    /// Full book name, or the abbreviation itself when it is not in the book table.
    pub book: String,
    pub chapter: i32,
    pub verse: i32,
    pub testament: Testament,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}:{}", self.abbreviation, self.chapter, self.verse)
    }
}

impl FromStr for Reference {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Reference, Self::Err> {
        lazy_static! {
            static ref REF_RE: Regex = Regex::new(r"^([가-힣A-Za-z]+)(\d+):(\d+)$").unwrap();
        }

        let caps = REF_RE.captures(s).ok_or_else(|| invalid_reference(s))?;
        match (caps.get(1), caps.get(2), caps.get(3)) {
            (Some(abbreviation), Some(chapter), Some(verse)) => {
                let abbreviation = abbreviation.as_str();
                let book = find_book(abbreviation)
                    .map(|b| b.name)
                    .unwrap_or(abbreviation);

                Ok(Reference {
                    abbreviation: abbreviation.to_string(),
                    book: book.to_string(),
                    chapter: parse_num_match(chapter, s)?,
                    verse: parse_num_match(verse, s)?,
                    testament: testament_of(abbreviation),
                })
            }
            _ => Err(invalid_reference(s)),
        }
    }
}

/// Parses a compact citation; equivalent to `s.parse::<Reference>()`.
pub fn parse_reference(s: &str) -> Result<Reference, DbError> {
    s.parse()
}

/// Parse a [Match](regex::Match) into a positive i32.
fn parse_num_match(m: Match, reference: &str) -> Result<i32, DbError> {
    match m.as_str().parse::<i32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid_reference(reference)),
    }
}

/// Create an invalid reference error from the input.
fn invalid_reference(s: &str) -> DbError {
    DbError::InvalidReference {
        reference: s.to_string(),
    }
}
