use std::sync::Arc;

use futures_util::StreamExt;
use rowmap::{
    command::Command,
    config::MapConfig,
    cursor::Cursor,
    entity,
    error::{Error, MapResult},
    exec::{
        compile::{FromRow, PlanCtx, RowFn},
        entity::{ConstructorDef, Entity, MemberDef, MemberType, MemberValue},
        row::Row,
    },
    mem::{MemConnection, MemCursor, MemSlice},
    schema::ty::TypeId,
    value::Value,
    Mapper,
};

mod test_utils;

use test_utils::{col, Author};

const TARGET: &str = "db://test";

fn author_cursor(rows: Vec<Vec<Value>>) -> MemCursor {
    MemCursor::single(vec![col("Id", TypeId::Int), col("Name", TypeId::Text)], rows)
}

#[tokio::test]
async fn fetch_all_materializes_every_row() -> MapResult<()> {
    test_utils::setup_tracing(None);

    let mapper = Mapper::new();
    let mut cursor = author_cursor(vec![
        vec![Value::Int(1), Value::Text("ann".into())],
        vec![Value::Int(2), Value::Text("bob".into())],
    ]);

    let authors: Vec<Author> = mapper
        .fetch_all(&mut cursor, &Command::text("select * from authors"), TARGET)
        .await?;
    assert_eq!(
        authors,
        vec![
            Author {
                id: 1,
                name: "ann".into()
            },
            Author {
                id: 2,
                name: "bob".into()
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn fetch_one_and_optional_over_an_empty_result() -> MapResult<()> {
    let mapper = Mapper::new();
    let cmd = Command::text("select * from authors where 1 = 0");

    let mut cursor = author_cursor(vec![]);
    let none: Option<Author> = mapper.fetch_optional(&mut cursor, &cmd, TARGET).await?;
    assert_eq!(none, None);

    let mut cursor = author_cursor(vec![]);
    let err = mapper.fetch_one::<Author>(&mut cursor, &cmd, TARGET).await;
    assert!(matches!(err, Err(Error::NoRows)));
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
struct Counter {
    hits: i32,
}

impl Default for Counter {
    fn default() -> Self {
        Counter { hits: 42 }
    }
}

entity!(Counter { hits: i32 });

#[tokio::test]
async fn null_assignment_is_skipped_by_default() -> MapResult<()> {
    let mapper = Mapper::new();
    let mut cursor = MemCursor::single(vec![col("hits", TypeId::Int)], vec![vec![Value::Null]]);

    let counters: Vec<Counter> = mapper
        .fetch_all(&mut cursor, &Command::text("select hits"), TARGET)
        .await?;
    // The member default survives the null column.
    assert_eq!(counters, vec![Counter { hits: 42 }]);
    Ok(())
}

#[tokio::test]
async fn null_assignment_overwrites_when_applied() -> MapResult<()> {
    let mapper = Mapper::with_config(MapConfig {
        apply_null_values: true,
        ..MapConfig::default()
    });
    let mut cursor = MemCursor::single(vec![col("hits", TypeId::Int)], vec![vec![Value::Null]]);

    let counters: Vec<Counter> = mapper
        .fetch_all(&mut cursor, &Command::text("select hits"), TARGET)
        .await?;
    assert_eq!(counters, vec![Counter { hits: 0 }]);
    Ok(())
}

#[tokio::test]
async fn scalar_targets_convert_from_the_column_type() -> MapResult<()> {
    let mapper = Mapper::new();
    let mut cursor = MemCursor::single(
        vec![col("views", TypeId::Int)],
        vec![vec![Value::Int(7)], vec![Value::Int(9)]],
    );

    // `i64` target over an `Int` column widens per value.
    let views: Vec<i64> = mapper
        .fetch_all(&mut cursor, &Command::text("select views"), TARGET)
        .await?;
    assert_eq!(views, vec![7, 9]);

    let mut cursor = MemCursor::single(
        vec![col("nick", TypeId::Text)],
        vec![vec![Value::Text("ann".into())], vec![Value::Null]],
    );
    let nicks: Vec<Option<String>> = mapper
        .fetch_all(&mut cursor, &Command::text("select nick"), TARGET)
        .await?;
    assert_eq!(nicks, vec![Some("ann".into()), None]);
    Ok(())
}

#[tokio::test]
async fn loose_rows_share_one_column_table() -> MapResult<()> {
    let mapper = Mapper::new();
    let mut cursor = author_cursor(vec![
        vec![Value::Int(1), Value::Text("ann".into())],
        vec![Value::Int(2), Value::Null],
    ]);

    let rows: Vec<Row> = mapper
        .fetch_all(&mut cursor, &Command::text("select * from authors"), TARGET)
        .await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].column_names(), vec!["Id".to_owned(), "Name".to_owned()]);

    assert_eq!(rows[0].get("Id"), Some(&Value::Int(1)));
    assert_eq!(rows[0].get("Name"), Some(&Value::Text("ann".into())));
    // A database null is a present `Value::Null`, not an absent column.
    assert_eq!(rows[1].get("Name"), Some(&Value::Null));

    // Every row of one result hangs off the same column table.
    assert!(Arc::ptr_eq(rows[0].table(), rows[1].table()));
    Ok(())
}

#[tokio::test]
async fn conversion_failures_name_the_column() {
    let mapper = Mapper::new();
    let mut cursor = MemCursor::single(
        vec![col("id", TypeId::Int), col("hits", TypeId::Text)],
        vec![vec![Value::Int(1), Value::Text("many".into())]],
    );

    #[derive(Debug, Default)]
    struct Wide {
        id: i32,
        hits: i32,
    }
    entity!(Wide { id: i32, hits: i32 });

    let err = mapper
        .fetch_all::<Wide>(&mut cursor, &Command::text("select"), TARGET)
        .await
        .unwrap_err();
    match err {
        Error::Column { ordinal, name, .. } => {
            assert_eq!(ordinal, 1);
            assert_eq!(name, "hits");
        }
        other => panic!("expected a column error, got {other}"),
    }
}

#[derive(Debug, Default)]
struct Naming {
    userid: i32,
}

entity!(Naming { userid: i32 });

#[tokio::test]
async fn underscore_matching_is_opt_in_end_to_end() -> MapResult<()> {
    let rows = || vec![vec![Value::Int(5)]];
    let cmd = Command::text("select user_id");

    let off = Mapper::new();
    let mut cursor = MemCursor::single(vec![col("user_id", TypeId::Int)], rows());
    let unmatched: Vec<Naming> = off.fetch_all(&mut cursor, &cmd, TARGET).await?;
    assert_eq!(unmatched[0].userid, 0);

    let on = Mapper::with_config(MapConfig {
        match_names_with_underscores: true,
        ..MapConfig::default()
    });
    let mut cursor = MemCursor::single(vec![col("user_id", TypeId::Int)], rows());
    let matched: Vec<Naming> = on.fetch_all(&mut cursor, &cmd, TARGET).await?;
    assert_eq!(matched[0].userid, 5);
    Ok(())
}

/// A target whose multi-parameter constructor marks the values it builds, so
/// the chosen construction path is observable.
#[derive(Debug, Default, PartialEq)]
struct Built {
    total: i64,
    via_ctor: bool,
}

impl Entity for Built {
    const NAME: &'static str = "Built";

    fn members() -> &'static [MemberDef<Self>] {
        static MEMBERS: std::sync::OnceLock<Vec<MemberDef<Built>>> = std::sync::OnceLock::new();
        MEMBERS.get_or_init(|| {
            vec![MemberDef {
                name: "total",
                ty: <i64 as MemberValue>::TYPE,
                set: |obj, v| {
                    obj.total = i64::from_value(v)?;
                    Ok(())
                },
            }]
        })
    }

    fn constructors() -> &'static [ConstructorDef<Self>] {
        static CTORS: std::sync::OnceLock<Vec<ConstructorDef<Built>>> = std::sync::OnceLock::new();
        CTORS.get_or_init(|| {
            vec![ConstructorDef {
                params: &[("total", MemberType::Scalar(TypeId::BigInt))],
                public: true,
                explicit: false,
                build: |mut values| {
                    let total = i64::from_value(values.pop().ok_or(Error::NoRows)?)?;
                    Ok(Built {
                        total,
                        via_ctor: true,
                    })
                },
            }]
        })
    }

    fn new_default() -> Option<Self> {
        Some(Built::default())
    }
}

impl FromRow for Built {
    fn compile(ctx: &PlanCtx<'_>) -> MapResult<RowFn<Self>> {
        rowmap::exec::compile::compile_entity::<Built>(ctx)
    }
}

#[tokio::test]
async fn matching_constructor_wins_over_the_setter_path() -> MapResult<()> {
    let mapper = Mapper::new();
    let cmd = Command::text("select total");

    // Exact positional agreement: the constructor is used.
    let mut cursor = MemCursor::single(vec![col("total", TypeId::BigInt)], vec![vec![
        Value::BigInt(10),
    ]]);
    let built: Vec<Built> = mapper.fetch_all(&mut cursor, &cmd, TARGET).await?;
    assert_eq!(
        built,
        vec![Built {
            total: 10,
            via_ctor: true
        }]
    );

    // Column type disagrees with the parameter: fall back to default
    // construction plus setters (which still coerce the value).
    let mut cursor = MemCursor::single(vec![col("total", TypeId::Int)], vec![vec![Value::Int(10)]]);
    let built: Vec<Built> = mapper.fetch_all(&mut cursor, &cmd, TARGET).await?;
    assert_eq!(
        built,
        vec![Built {
            total: 10,
            via_ctor: false
        }]
    );
    Ok(())
}

/// A target pinned to one explicit constructor, chosen regardless of the
/// projected columns.
#[derive(Debug, PartialEq)]
struct Audited {
    total: i64,
    label: String,
}

impl Entity for Audited {
    const NAME: &'static str = "Audited";

    fn members() -> &'static [MemberDef<Self>] {
        &[]
    }

    fn constructors() -> &'static [ConstructorDef<Self>] {
        static CTORS: std::sync::OnceLock<Vec<ConstructorDef<Audited>>> =
            std::sync::OnceLock::new();
        CTORS.get_or_init(|| {
            vec![ConstructorDef {
                params: &[
                    ("total", MemberType::Scalar(TypeId::BigInt)),
                    ("label", MemberType::Scalar(TypeId::Text)),
                ],
                public: true,
                explicit: true,
                build: |mut values| {
                    let label = String::from_value(values.pop().ok_or(Error::NoRows)?)?;
                    let total = i64::from_value(values.pop().ok_or(Error::NoRows)?)?;
                    Ok(Audited { total, label })
                },
            }]
        })
    }

    fn new_default() -> Option<Self> {
        None
    }
}

impl FromRow for Audited {
    fn compile(ctx: &PlanCtx<'_>) -> MapResult<RowFn<Self>> {
        rowmap::exec::compile::compile_entity::<Audited>(ctx)
    }
}

#[tokio::test]
async fn an_explicit_constructor_needs_enough_columns() -> MapResult<()> {
    let mapper = Mapper::new();
    let cmd = Command::text("select total");

    // A projection narrower than the constructor's parameter list fails at
    // plan-compile time, before any row is read.
    let mut cursor = MemCursor::single(
        vec![col("total", TypeId::BigInt)],
        vec![vec![Value::BigInt(10)]],
    );
    let err = mapper
        .fetch_all::<Audited>(&mut cursor, &cmd, TARGET)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch(_)));

    // With both columns present the constructor runs.
    let mut cursor = MemCursor::single(
        vec![col("total", TypeId::BigInt), col("label", TypeId::Text)],
        vec![vec![Value::BigInt(10), Value::Text("ok".into())]],
    );
    let audited: Vec<Audited> = mapper.fetch_all(&mut cursor, &cmd, TARGET).await?;
    assert_eq!(
        audited,
        vec![Audited {
            total: 10,
            label: "ok".into()
        }]
    );
    Ok(())
}

#[tokio::test]
async fn query_binds_parameters_and_materializes() -> MapResult<()> {
    let mapper = Mapper::new();
    let mut conn = MemConnection::new(
        "db://main",
        vec![MemSlice::new(
            vec![col("id", TypeId::Int), col("name", TypeId::Text)],
            vec![vec![Value::Int(1), Value::Text("ann".into())]],
        )],
    );

    let params: Vec<(String, Value)> = vec![("min_id".into(), Value::Int(1))];
    let authors: Vec<Author> = mapper
        .query(
            &mut conn,
            &Command::text("select * from authors where id >= :min_id"),
            &params,
        )
        .await?;
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].name, "ann");

    let bound = &conn.bind_log[0];
    assert_eq!(bound.entries().len(), 1);
    assert_eq!(bound.entries()[0].name, "min_id");
    assert_eq!(bound.entries()[0].value, Value::Int(1));
    Ok(())
}

#[tokio::test]
async fn fetch_lazy_yields_rows_one_at_a_time() -> MapResult<()> {
    let mapper = Mapper::new();
    let mut cursor = author_cursor(vec![
        vec![Value::Int(1), Value::Text("ann".into())],
        vec![Value::Int(2), Value::Text("bob".into())],
    ]);

    let mut fetch = mapper
        .fetch_lazy::<Author>(&mut cursor, &Command::text("select"), TARGET)
        .await?;
    assert_eq!(fetch.next().await?.map(|a| a.id), Some(1));
    assert_eq!(fetch.next().await?.map(|a| a.id), Some(2));
    assert_eq!(fetch.next().await?, None);
    // Exhaustion is sticky.
    assert_eq!(fetch.next().await?, None);
    Ok(())
}

#[tokio::test]
async fn fetch_lazy_adapts_into_a_stream() -> MapResult<()> {
    let mapper = Mapper::new();
    let mut cursor = author_cursor(vec![
        vec![Value::Int(1), Value::Text("ann".into())],
        vec![Value::Int(2), Value::Text("bob".into())],
    ]);

    let fetch = mapper
        .fetch_lazy::<Author>(&mut cursor, &Command::text("select"), TARGET)
        .await?;
    let stream = fetch.into_stream();
    futures_util::pin_mut!(stream);

    let mut ids = Vec::new();
    while let Some(author) = stream.next().await {
        ids.push(author?.id);
    }
    assert_eq!(ids, vec![1, 2]);
    Ok(())
}

#[tokio::test]
async fn dispose_drains_the_cursor() -> MapResult<()> {
    let mapper = Mapper::new();
    let mut cursor = MemCursor::new(vec![
        MemSlice::new(
            vec![col("id", TypeId::Int), col("name", TypeId::Text)],
            vec![
                vec![Value::Int(1), Value::Text("ann".into())],
                vec![Value::Int(2), Value::Text("bob".into())],
            ],
        ),
        MemSlice::new(vec![col("n", TypeId::Int)], vec![vec![Value::Int(3)]]),
    ]);

    let mut fetch = mapper
        .fetch_lazy::<Author>(&mut cursor, &Command::text("select"), TARGET)
        .await?;
    assert!(fetch.next().await?.is_some());
    fetch.dispose().await?;

    // Rows and trailing result slices were consumed.
    assert!(!cursor.read().await?);
    assert!(!cursor.next_result().await?);
    Ok(())
}

#[tokio::test]
async fn fetch_all_drains_trailing_result_slices() -> MapResult<()> {
    let mapper = Mapper::new();
    let mut cursor = MemCursor::new(vec![
        MemSlice::new(
            vec![col("id", TypeId::Int), col("name", TypeId::Text)],
            vec![vec![Value::Int(1), Value::Text("ann".into())]],
        ),
        MemSlice::new(vec![col("n", TypeId::Int)], vec![vec![Value::Int(3)]]),
    ]);

    let authors: Vec<Author> = mapper
        .fetch_all(&mut cursor, &Command::text("select"), TARGET)
        .await?;
    assert_eq!(authors.len(), 1);
    assert!(!cursor.next_result().await?);
    Ok(())
}
