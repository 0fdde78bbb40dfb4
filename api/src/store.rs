//! Post and like persistence.
//!
//! `like_count` is never stored. Every read counts the rows in
//! `post_likes`, so the count cannot drift from the like records.

use kahani_shared::{LikeRecord, Post, PostView, SortOrder};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Columns for a [`PostView`]; `?1` is the viewer id or NULL.
const POST_VIEW_COLUMNS: &str = "
    p.id, p.title, p.content, p.image_url, p.author_id, p.author, p.created_at, p.comments,
    (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS like_count,
    CASE WHEN ?1 IS NULL THEN 0
         ELSE EXISTS(SELECT 1 FROM post_likes l WHERE l.post_id = p.id AND l.user_id = ?1)
    END AS is_liked";

fn post_view_from_row(row: &Row<'_>) -> rusqlite::Result<PostView> {
    let comments: String = row.get(7)?;
    Ok(PostView {
        post: Post {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            image_url: row.get(3)?,
            author_id: row.get(4)?,
            author: row.get(5)?,
            created_at: row.get(6)?,
            comments: serde_json::from_str(&comments).unwrap_or_default(),
            like_count: row.get(8)?,
        },
        is_liked: row.get(9)?,
    })
}

/// All posts in `sort` order, with `is_liked` computed for `viewer`.
///
/// Ties break on descending id.
pub fn load_feed(
    conn: &Connection,
    sort: SortOrder,
    viewer: Option<i64>,
) -> rusqlite::Result<Vec<PostView>> {
    let order = match sort {
        SortOrder::Newest => "p.created_at DESC, p.id DESC",
        SortOrder::MostLiked => "like_count DESC, p.id DESC",
    };
    let sql = format!("SELECT {POST_VIEW_COLUMNS} FROM posts p ORDER BY {order}");

    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params![viewer], post_view_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(posts)
}

pub fn post_view(
    conn: &Connection,
    post_id: i64,
    viewer: Option<i64>,
) -> rusqlite::Result<PostView> {
    let sql = format!("SELECT {POST_VIEW_COLUMNS} FROM posts p WHERE p.id = ?2");
    conn.query_row(&sql, params![viewer, post_id], post_view_from_row)
}

/// Inserts a post with no likes and no comments. The author name is copied
/// from the user row at this moment.
pub fn insert_post(
    conn: &Connection,
    author_id: i64,
    title: &str,
    content: &str,
    image_url: Option<&str>,
) -> rusqlite::Result<PostView> {
    let inserted = conn.execute(
        "INSERT INTO posts (author_id, author, title, content, image_url)
         SELECT id, display_name, ?2, ?3, ?4 FROM users WHERE id = ?1",
        params![author_id, title, content, image_url],
    )?;
    if inserted == 0 {
        return Err(rusqlite::Error::QueryReturnedNoRows);
    }

    let id = conn.last_insert_rowid();
    post_view(conn, id, Some(author_id))
}

pub fn has_liked(conn: &Connection, post_id: i64, user_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

/// Flips `user_id`'s like on a post and returns the post as they now see it.
///
/// `currently_liked` is the caller's cached state. When given, it decides
/// the direction without another lookup. The record change and the count
/// read share one transaction.
pub fn toggle_like(
    conn: &mut Connection,
    post_id: i64,
    user_id: i64,
    currently_liked: Option<bool>,
) -> rusqlite::Result<PostView> {
    let tx = conn.transaction()?;

    tx.query_row("SELECT id FROM posts WHERE id = ?1", [post_id], |row| {
        row.get::<_, i64>(0)
    })?;

    let liked = match currently_liked {
        Some(liked) => liked,
        None => has_liked(&tx, post_id, user_id)?,
    };

    if liked {
        tx.execute(
            "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
    } else {
        tx.execute(
            "INSERT OR IGNORE INTO post_likes (post_id, user_id) VALUES (?1, ?2)",
            params![post_id, user_id],
        )?;
    }

    let view = post_view(&tx, post_id, Some(user_id))?;
    tx.commit()?;
    Ok(view)
}

pub fn like_records(conn: &Connection, post_id: i64) -> rusqlite::Result<Vec<LikeRecord>> {
    let mut stmt = conn.prepare(
        "SELECT post_id, user_id, created_at FROM post_likes
         WHERE post_id = ?1
         ORDER BY created_at ASC, id ASC",
    )?;
    let records = stmt
        .query_map([post_id], |row| {
            Ok(LikeRecord {
                post_id: row.get(0)?,
                user_id: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}
