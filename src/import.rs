//! Bulk post import from CSV.
//!
//! Each record is `title,tag,content` with no header row. A single bad
//! record rejects the whole file and nothing is inserted.

use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::{self as queries, limits, NewPost};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("The submitted file is empty.")]
    Empty,
    #[error("The file is not valid UTF-8 text.")]
    NotUtf8,
    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Line {line}: expected 3 fields (title, tag, content), found {found}.")]
    FieldCount { line: u64, found: usize },
    #[error("Line {line}: {field} may not be blank.")]
    Blank { line: u64, field: &'static str },
    #[error("Line {line}: {field} has more than {max} characters.")]
    TooLong {
        line: u64,
        field: &'static str,
        max: usize,
    },
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// One validated CSV record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedPost {
    pub title: String,
    pub tag: String,
    pub content: String,
}

fn check_field(
    line: u64,
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ImportError> {
    if value.trim().is_empty() {
        return Err(ImportError::Blank { line, field });
    }
    if value.chars().count() > max {
        return Err(ImportError::TooLong { line, field, max });
    }
    Ok(())
}

/// Parse and validate CSV data.
pub fn parse_posts_csv(data: &[u8]) -> Result<Vec<ImportedPost>, ImportError> {
    let text = std::str::from_utf8(data).map_err(|_| ImportError::NotUtf8)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(b',')
        .quote(b'"')
        .from_reader(text.as_bytes());

    let mut posts = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);

        if record.len() != 3 {
            return Err(ImportError::FieldCount {
                line,
                found: record.len(),
            });
        }

        let title = &record[0];
        let tag = &record[1];
        let content = &record[2];
        check_field(line, "title", title, limits::POST_TITLE)?;
        check_field(line, "tag", tag, limits::POST_TAG)?;

        posts.push(ImportedPost {
            title: title.to_string(),
            tag: tag.to_string(),
            content: content.to_string(),
        });
    }

    if posts.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(posts)
}

/// Import CSV data as unpublished posts of a blog, returning the number created.
pub async fn import_posts(
    pool: &SqlitePool,
    blog_id: i64,
    profile_id: i64,
    data: &[u8],
) -> Result<u64, ImportError> {
    let parsed = parse_posts_csv(data)?;
    let posts: Vec<NewPost> = parsed
        .into_iter()
        .map(|p| NewPost {
            blog_id,
            profile_id,
            title: p.title,
            tag: p.tag,
            content: p.content,
        })
        .collect();

    let created = queries::create_posts_batch(pool, &posts).await?;
    tracing::info!(blog_id, created, "Imported posts from CSV");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_csv() {
        let data = b"First,rust web,Hello world\n\"Quoted, title\",tag,\"multi\nline\"\n";
        let posts = parse_posts_csv(data).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "First");
        assert_eq!(posts[0].tag, "rust web");
        assert_eq!(posts[1].title, "Quoted, title");
        assert_eq!(posts[1].content, "multi\nline");
    }

    #[test]
    fn test_wrong_field_count_rejects_file() {
        let data = b"ok,tag,content\nmissing,fields\n";
        assert!(matches!(
            parse_posts_csv(data),
            Err(ImportError::FieldCount { found: 2, .. })
        ));
    }

    #[test]
    fn test_semicolon_file_is_one_field() {
        let data = b"title;tag;content\n";
        assert!(matches!(
            parse_posts_csv(data),
            Err(ImportError::FieldCount { found: 1, .. })
        ));
    }

    #[test]
    fn test_length_limits() {
        let title = "t".repeat(129);
        let data = format!("{title},tag,content\n");
        assert!(matches!(
            parse_posts_csv(data.as_bytes()),
            Err(ImportError::TooLong { field: "title", .. })
        ));

        let tag = "g".repeat(71);
        let data = format!("title,{tag},content\n");
        assert!(matches!(
            parse_posts_csv(data.as_bytes()),
            Err(ImportError::TooLong { field: "tag", .. })
        ));

        let data = format!("{},{},content\n", "t".repeat(128), "g".repeat(70));
        assert!(parse_posts_csv(data.as_bytes()).is_ok());
    }

    #[test]
    fn test_blank_and_empty() {
        assert!(matches!(
            parse_posts_csv(b" ,tag,content\n"),
            Err(ImportError::Blank { field: "title", .. })
        ));
        assert!(matches!(parse_posts_csv(b""), Err(ImportError::Empty)));
        assert!(matches!(
            parse_posts_csv(&[0xff, 0xfe, 0x00]),
            Err(ImportError::NotUtf8)
        ));
    }
}
