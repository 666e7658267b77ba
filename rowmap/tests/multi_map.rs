use rowmap::{
    command::Command,
    entity,
    error::{Error, MapResult},
    mem::{MemConnection, MemCursor, MemSlice},
    schema::ty::TypeId,
    value::Value,
    Mapper, Skip, SplitOn,
};

mod test_utils;

use test_utils::{col, Author, Post};

const TARGET: &str = "db://test";

fn post_author_slice(rows: Vec<Vec<Value>>) -> MemSlice {
    MemSlice::new(
        vec![
            col("id", TypeId::Int),
            col("title", TypeId::Text),
            col("views", TypeId::BigInt),
            col("id", TypeId::Int),
            col("name", TypeId::Text),
        ],
        rows,
    )
}

fn post_row(id: i32, title: &str, views: i64, author: Option<(i32, &str)>) -> Vec<Value> {
    let (aid, aname) = match author {
        Some((aid, aname)) => (Value::Int(aid), Value::Text(aname.into())),
        None => (Value::Null, Value::Null),
    };
    vec![
        Value::Int(id),
        Value::Text(title.into()),
        Value::BigInt(views),
        aid,
        aname,
    ]
}

#[tokio::test]
async fn joins_rows_across_the_split_boundary() -> MapResult<()> {
    test_utils::setup_tracing(None);

    let mapper = Mapper::new();
    let mut cursor = MemCursor::new(vec![post_author_slice(vec![
        post_row(1, "first", 10, Some((7, "ann"))),
        post_row(2, "second", 20, Some((8, "bob"))),
    ])]);

    let pairs: Vec<(Post, Option<Author>)> = mapper
        .fetch_joined(
            &mut cursor,
            &Command::text("select posts join authors"),
            TARGET,
            &SplitOn::default(),
            |pair: (Post, Option<Author>)| pair,
        )
        .await?;

    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].0.title, "first");
    assert_eq!(pairs[0].1.as_ref().map(|a| a.name.as_str()), Some("ann"));
    assert_eq!(pairs[1].1.as_ref().map(|a| a.id), Some(8));
    Ok(())
}

#[tokio::test]
async fn null_boundary_column_yields_no_secondary() -> MapResult<()> {
    let mapper = Mapper::new();
    let mut cursor = MemCursor::new(vec![post_author_slice(vec![
        post_row(1, "first", 10, Some((7, "ann"))),
        // Left outer join with no matching author.
        post_row(2, "orphan", 0, None),
    ])]);

    let pairs: Vec<(Post, Option<Author>)> = mapper
        .fetch_joined(
            &mut cursor,
            &Command::text("select posts left join authors"),
            TARGET,
            &SplitOn::default(),
            |pair: (Post, Option<Author>)| pair,
        )
        .await?;

    assert!(pairs[0].1.is_some());
    assert_eq!(pairs[1].0.title, "orphan");
    assert_eq!(pairs[1].1, None);
    Ok(())
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Tag {
    ref_id: i32,
    label: String,
}

entity!(Tag {
    ref_id: i32,
    label: String,
});

#[tokio::test]
async fn per_boundary_split_names() -> MapResult<()> {
    let mapper = Mapper::new();
    let mut cursor = MemCursor::single(
        vec![
            col("id", TypeId::Int),
            col("title", TypeId::Text),
            col("views", TypeId::BigInt),
            col("id", TypeId::Int),
            col("name", TypeId::Text),
            col("ref_id", TypeId::Int),
            col("label", TypeId::Text),
        ],
        vec![vec![
            Value::Int(1),
            Value::Text("first".into()),
            Value::BigInt(10),
            Value::Int(7),
            Value::Text("ann".into()),
            Value::Int(1),
            Value::Text("rust".into()),
        ]],
    );

    let rows: Vec<(Post, Option<Author>, Option<Tag>)> = mapper
        .fetch_joined(
            &mut cursor,
            &Command::text("select posts, authors, tags"),
            TARGET,
            &SplitOn::parse("id, ref_id"),
            |row: (Post, Option<Author>, Option<Tag>)| row,
        )
        .await?;

    let (post, author, tag) = &rows[0];
    assert_eq!(post.title, "first");
    assert_eq!(author.as_ref().map(|a| a.name.as_str()), Some("ann"));
    assert_eq!(tag.as_ref().map(|t| t.label.as_str()), Some("rust"));
    Ok(())
}

#[tokio::test]
async fn skip_slots_receive_no_column_range() -> MapResult<()> {
    let mapper = Mapper::new();
    let mut cursor = MemCursor::new(vec![post_author_slice(vec![post_row(
        1,
        "first",
        10,
        Some((7, "ann")),
    )])]);

    // The skipped slot consumes no boundary; the author still receives the
    // second column range.
    let rows: Vec<(Post, Option<Skip>, Option<Author>)> = mapper
        .fetch_joined(
            &mut cursor,
            &Command::text("select posts join authors"),
            TARGET,
            &SplitOn::default(),
            |row: (Post, Option<Skip>, Option<Author>)| row,
        )
        .await?;

    let (post, skipped, author) = &rows[0];
    assert_eq!(post.id, 1);
    assert_eq!(*skipped, None);
    assert_eq!(author.as_ref().map(|a| a.id), Some(7));
    Ok(())
}

#[tokio::test]
async fn the_primary_slot_cannot_be_skipped() {
    let mapper = Mapper::new();
    let mut cursor = MemCursor::new(vec![post_author_slice(vec![])]);

    let err = mapper
        .fetch_joined(
            &mut cursor,
            &Command::text("select"),
            TARGET,
            &SplitOn::default(),
            |row: (Skip, Option<Author>)| row,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch(_)));
}

#[tokio::test]
async fn unmatched_boundary_degrades_to_an_oversized_primary() -> MapResult<()> {
    let mapper = Mapper::new();
    let mut cursor = MemCursor::new(vec![post_author_slice(vec![post_row(
        1, "first", 10, None,
    )])]);

    let rows: Vec<(Post, Option<Author>)> = mapper
        .fetch_joined(
            &mut cursor,
            &Command::text("select"),
            TARGET,
            &SplitOn::single("no_such_column"),
            |row: (Post, Option<Author>)| row,
        )
        .await?;

    // Every column fed the primary; the secondary range is empty.
    assert_eq!(rows[0].0.id, 1);
    assert_eq!(rows[0].1, None);
    Ok(())
}

#[tokio::test]
async fn query_joined_over_a_connection() -> MapResult<()> {
    #[derive(Debug, PartialEq)]
    struct Enriched {
        post: Post,
        author_name: Option<String>,
    }

    let mapper = Mapper::new();
    let mut conn = MemConnection::new(
        "db://main",
        vec![post_author_slice(vec![
            post_row(1, "first", 10, Some((7, "ann"))),
            post_row(2, "orphan", 0, None),
        ])],
    );

    let enriched: Vec<Enriched> = mapper
        .query_joined(
            &mut conn,
            &Command::text("select posts left join authors"),
            &(),
            &SplitOn::default(),
            |(post, author): (Post, Option<Author>)| Enriched {
                post,
                author_name: author.map(|a| a.name),
            },
        )
        .await?;

    assert_eq!(enriched[0].author_name.as_deref(), Some("ann"));
    assert_eq!(enriched[1].author_name, None);
    Ok(())
}
