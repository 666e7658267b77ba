#![allow(dead_code)]

use rowmap::{
    entity,
    schema::{column::ColumnDef, ty::TypeId},
};

/// Sets up tracing subscriber.
pub fn setup_tracing(level: Option<&str>) {
    use tracing_subscriber::{
        fmt::{format::FmtSpan, layer},
        layer::SubscriberExt,
        util::SubscriberInitExt,
        EnvFilter,
    };

    let filter_layer = level
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or("warn".into()));
    let fmt_layer = layer().with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .ok();
}

pub fn col(name: &str, ty: TypeId) -> ColumnDef {
    ColumnDef::new(name, ty)
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Author {
    pub id: i32,
    pub name: String,
}

entity!(Author {
    id: i32,
    name: String,
});

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub views: i64,
}

entity!(Post {
    id: i32,
    title: String,
    views: i64,
});
