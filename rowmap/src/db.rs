//! The mapper facade: execution drivers over cursors and connections.
//!
//! Every driver follows the same pipeline: snapshot the column schema,
//! obtain a compiled transform (through the plan cache unless the command
//! opted out), pull rows, apply the transform per row, and leave the cursor
//! drained past any remaining result slices. The only suspension points are
//! the cursor's `read`/`next_result` calls; transforms themselves never
//! block.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use futures_util::stream::{self, Stream};
use tracing::{instrument, warn};

use crate::{
    cache::{identity::QueryIdentity, plan::PlanCache},
    command::Command,
    config::MapConfig,
    cursor::{Connection, Cursor, CursorOptions},
    error::{Error, MapResult},
    exec::{
        compile::{FromRow, PlanCtx, RowFn},
        multi::{MultiMap, SplitOn},
        Executor,
    },
    handlers::TypeHandlerRegistry,
    params::{BindRequest, Params},
    schema::column::ResultSchema,
};

fn snapshot(cursor: &dyn Cursor) -> ResultSchema {
    ResultSchema::from_view(cursor)
}

/// Leaves the cursor clean for the connection's next command.
async fn drain(cursor: &mut dyn Cursor) -> MapResult<()> {
    while cursor.next_result().await? {}
    Ok(())
}

/// The materialization engine.
///
/// A `Mapper` owns its plan cache, type-handler registry and configuration;
/// independent mappers share nothing. It holds no connection: cursor-level
/// drivers (`fetch_*`) work over an already-executed cursor, and
/// connection-level drivers (`query*`) bind parameters and execute first.
pub struct Mapper {
    cache: PlanCache,
    handlers: TypeHandlerRegistry,
    config: MapConfig,
    /// Set once a driver rejects cursor optimizations; never cleared.
    downgraded: AtomicBool,
}

impl Mapper {
    pub fn new() -> Mapper {
        Mapper::with_config(MapConfig::default())
    }

    pub fn with_config(config: MapConfig) -> Mapper {
        Mapper {
            cache: PlanCache::new(config.plan_cache_capacity),
            handlers: TypeHandlerRegistry::new(),
            config,
            downgraded: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn handlers(&self) -> &TypeHandlerRegistry {
        &self.handlers
    }

    pub fn plan_cache(&self) -> &PlanCache {
        &self.cache
    }

    /// Whether a driver rejection has permanently downgraded this mapper to
    /// default cursor options.
    pub fn optimizations_downgraded(&self) -> bool {
        self.downgraded.load(Ordering::Relaxed)
    }

    /// Resolves the transform for a single-target mapping, consulting the
    /// plan cache unless the command opted out.
    async fn plan_single<T: FromRow>(
        &self,
        schema: &ResultSchema,
        cmd: &Command,
        target: &str,
        params: Option<std::any::TypeId>,
        slice: usize,
    ) -> MapResult<RowFn<T>> {
        let live = schema.fingerprint();
        let build = || T::compile(&PlanCtx::full(schema, &self.config, &self.handlers));
        if !cmd.cached {
            return build();
        }
        let identity = QueryIdentity::single::<T>(cmd, target, params, slice);
        let entry = self.cache.entry(identity).await;
        entry.plan_for(live, build)
    }

    async fn collect<T: FromRow>(
        &self,
        cursor: &mut dyn Cursor,
        cmd: &Command,
        target: &str,
        params: Option<std::any::TypeId>,
    ) -> MapResult<Vec<T>> {
        let schema = snapshot(&*cursor);
        let transform = self.plan_single::<T>(&schema, cmd, target, params, 0).await?;
        let mut out = Vec::new();
        while cursor.read().await? {
            out.push(transform(&*cursor)?);
        }
        drain(cursor).await?;
        Ok(out)
    }

    async fn first<T: FromRow>(
        &self,
        cursor: &mut dyn Cursor,
        cmd: &Command,
        target: &str,
        params: Option<std::any::TypeId>,
    ) -> MapResult<Option<T>> {
        let schema = snapshot(&*cursor);
        let transform = self.plan_single::<T>(&schema, cmd, target, params, 0).await?;
        let head = if cursor.read().await? {
            Some(transform(&*cursor)?)
        } else {
            None
        };
        while cursor.read().await? {}
        drain(cursor).await?;
        Ok(head)
    }

    async fn joined<M, R, F>(
        &self,
        cursor: &mut dyn Cursor,
        cmd: &Command,
        target: &str,
        params: Option<std::any::TypeId>,
        split: &SplitOn,
        combine: &mut F,
    ) -> MapResult<Vec<R>>
    where
        M: MultiMap,
        F: FnMut(M) -> R,
    {
        let schema = snapshot(&*cursor);
        let live = schema.fingerprint();
        let build = || M::compile(&PlanCtx::full(&schema, &self.config, &self.handlers), split);
        let transforms = if cmd.cached {
            let (primary, secondaries) = M::type_ids();
            let identity = QueryIdentity::new(cmd, target, primary, params, secondaries, 0);
            let entry = self.cache.entry(identity).await;
            entry.plan_for(live, build)?
        } else {
            build()?
        };
        let mut out = Vec::new();
        while cursor.read().await? {
            out.push(combine(M::read_row(&*cursor, &transforms)?));
        }
        drain(cursor).await?;
        Ok(out)
    }

    /// Materializes every row of the cursor's first result slice, then
    /// drains any remaining slices.
    #[instrument(skip_all, fields(sql = %cmd.sql))]
    pub async fn fetch_all<T: FromRow>(
        &self,
        cursor: &mut dyn Cursor,
        cmd: &Command,
        target: &str,
    ) -> MapResult<Vec<T>> {
        self.collect(cursor, cmd, target, None).await
    }

    /// Materializes the first row, if any. The rest of the result is
    /// consumed and discarded so the cursor is left clean.
    #[instrument(skip_all, fields(sql = %cmd.sql))]
    pub async fn fetch_optional<T: FromRow>(
        &self,
        cursor: &mut dyn Cursor,
        cmd: &Command,
        target: &str,
    ) -> MapResult<Option<T>> {
        self.first(cursor, cmd, target, None).await
    }

    /// Like [`fetch_optional`](Mapper::fetch_optional), but an empty result
    /// is [`Error::NoRows`].
    #[instrument(skip_all, fields(sql = %cmd.sql))]
    pub async fn fetch_one<T: FromRow>(
        &self,
        cursor: &mut dyn Cursor,
        cmd: &Command,
        target: &str,
    ) -> MapResult<T> {
        self.first(cursor, cmd, target, None)
            .await?
            .ok_or(Error::NoRows)
    }

    /// Multi-maps every row into a value tuple and applies `combine` to
    /// each. The combine closure runs outside the plan cache, so one cached
    /// transform set serves any closure.
    #[instrument(skip_all, fields(sql = %cmd.sql))]
    pub async fn fetch_joined<M, R, F>(
        &self,
        cursor: &mut dyn Cursor,
        cmd: &Command,
        target: &str,
        split: &SplitOn,
        mut combine: F,
    ) -> MapResult<Vec<R>>
    where
        M: MultiMap,
        F: FnMut(M) -> R,
    {
        self.joined(cursor, cmd, target, None, split, &mut combine)
            .await
    }

    /// Compiles the transform eagerly and returns a lazy row-at-a-time
    /// executor borrowing the cursor.
    #[instrument(skip_all, fields(sql = %cmd.sql))]
    pub async fn fetch_lazy<'c, T: FromRow>(
        &self,
        cursor: &'c mut dyn Cursor,
        cmd: &Command,
        target: &str,
    ) -> MapResult<Fetch<'c, T>> {
        let schema = snapshot(&*cursor);
        let transform = self.plan_single::<T>(&schema, cmd, target, None, 0).await?;
        Ok(Fetch {
            cursor,
            transform,
            done: false,
        })
    }

    /// Wraps a multi-result cursor for slice-by-slice consumption.
    pub fn fetch_grid<'g>(
        &'g self,
        cursor: &'g mut dyn Cursor,
        cmd: Command,
        target: impl Into<String>,
    ) -> Grid<'g> {
        Grid {
            mapper: self,
            cursor,
            cmd,
            target: target.into(),
            slice: 0,
            finished: false,
        }
    }

    fn options_for(&self) -> CursorOptions {
        if self.config.allow_cursor_optimizations && !self.downgraded.load(Ordering::Relaxed) {
            CursorOptions {
                single_result: true,
                sequential: false,
            }
        } else {
            CursorOptions::default()
        }
    }

    /// Builds the outbound bind request, through the cached binder when the
    /// command participates in the plan cache.
    async fn bind_params<P: Params>(
        &self,
        identity: Option<QueryIdentity>,
        params: &P,
    ) -> BindRequest {
        let mut req = BindRequest::new();
        match identity {
            Some(identity) => {
                let entry = self.cache.entry(identity).await;
                let binder =
                    entry.binder(|| Arc::new(|p: &dyn Params, req: &mut BindRequest| p.bind(req)));
                binder(params, &mut req);
            }
            None => params.bind(&mut req),
        }
        req
    }

    fn note_downgrade(&self, reason: &str) {
        warn!(reason, "driver rejected cursor optimizations, downgrading permanently");
        self.downgraded.store(true, Ordering::Relaxed);
    }

    /// Binds, executes and materializes every row over a connection.
    ///
    /// On [`Error::UnsupportedCursorOptions`] the mapper permanently
    /// downgrades to default cursor options and transparently retries this
    /// one call.
    #[instrument(skip_all, fields(sql = %cmd.sql))]
    pub async fn query<T, P>(
        &self,
        conn: &mut dyn Connection,
        cmd: &Command,
        params: &P,
    ) -> MapResult<Vec<T>>
    where
        T: FromRow,
        P: Params,
    {
        let target = conn.target().to_owned();
        let key = Some(params.type_key());
        let identity = cmd
            .cached
            .then(|| QueryIdentity::single::<T>(cmd, &target, key, 0));
        let bind = self.bind_params(identity, params).await;
        let options = self.options_for();
        match self
            .query_attempt::<T>(conn, cmd, &target, key, &bind, options)
            .await
        {
            Err(Error::UnsupportedCursorOptions(reason))
                if options != CursorOptions::default() =>
            {
                self.note_downgrade(&reason);
                self.query_attempt::<T>(conn, cmd, &target, key, &bind, CursorOptions::default())
                    .await
            }
            other => other,
        }
    }

    async fn query_attempt<T: FromRow>(
        &self,
        conn: &mut dyn Connection,
        cmd: &Command,
        target: &str,
        key: Option<std::any::TypeId>,
        bind: &BindRequest,
        options: CursorOptions,
    ) -> MapResult<Vec<T>> {
        let mut cursor = conn.execute(cmd, bind, options).await?;
        self.collect(&mut *cursor, cmd, target, key).await
    }

    /// Binds, executes and materializes the first row; an empty result is
    /// [`Error::NoRows`]. Downgrades like [`query`](Mapper::query).
    #[instrument(skip_all, fields(sql = %cmd.sql))]
    pub async fn query_one<T, P>(
        &self,
        conn: &mut dyn Connection,
        cmd: &Command,
        params: &P,
    ) -> MapResult<T>
    where
        T: FromRow,
        P: Params,
    {
        self.query_optional(conn, cmd, params)
            .await?
            .ok_or(Error::NoRows)
    }

    #[instrument(skip_all, fields(sql = %cmd.sql))]
    pub async fn query_optional<T, P>(
        &self,
        conn: &mut dyn Connection,
        cmd: &Command,
        params: &P,
    ) -> MapResult<Option<T>>
    where
        T: FromRow,
        P: Params,
    {
        let target = conn.target().to_owned();
        let key = Some(params.type_key());
        let identity = cmd
            .cached
            .then(|| QueryIdentity::single::<T>(cmd, &target, key, 0));
        let bind = self.bind_params(identity, params).await;
        let options = self.options_for();
        match self
            .first_attempt::<T>(conn, cmd, &target, key, &bind, options)
            .await
        {
            Err(Error::UnsupportedCursorOptions(reason))
                if options != CursorOptions::default() =>
            {
                self.note_downgrade(&reason);
                self.first_attempt::<T>(conn, cmd, &target, key, &bind, CursorOptions::default())
                    .await
            }
            other => other,
        }
    }

    async fn first_attempt<T: FromRow>(
        &self,
        conn: &mut dyn Connection,
        cmd: &Command,
        target: &str,
        key: Option<std::any::TypeId>,
        bind: &BindRequest,
        options: CursorOptions,
    ) -> MapResult<Option<T>> {
        let mut cursor = conn.execute(cmd, bind, options).await?;
        self.first(&mut *cursor, cmd, target, key).await
    }

    /// Binds, executes and multi-maps every row over a connection.
    /// Downgrades like [`query`](Mapper::query).
    #[instrument(skip_all, fields(sql = %cmd.sql))]
    pub async fn query_joined<M, R, F, P>(
        &self,
        conn: &mut dyn Connection,
        cmd: &Command,
        params: &P,
        split: &SplitOn,
        mut combine: F,
    ) -> MapResult<Vec<R>>
    where
        M: MultiMap,
        F: FnMut(M) -> R,
        P: Params,
    {
        let target = conn.target().to_owned();
        let key = Some(params.type_key());
        let identity = cmd.cached.then(|| {
            let (primary, secondaries) = M::type_ids();
            QueryIdentity::new(cmd, &target, primary, key, secondaries, 0)
        });
        let bind = self.bind_params(identity, params).await;
        let options = self.options_for();
        match self
            .joined_attempt::<M, R, F>(conn, cmd, &target, key, &bind, options, split, &mut combine)
            .await
        {
            Err(Error::UnsupportedCursorOptions(reason))
                if options != CursorOptions::default() =>
            {
                self.note_downgrade(&reason);
                self.joined_attempt::<M, R, F>(
                    conn,
                    cmd,
                    &target,
                    key,
                    &bind,
                    CursorOptions::default(),
                    split,
                    &mut combine,
                )
                .await
            }
            other => other,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn joined_attempt<M, R, F>(
        &self,
        conn: &mut dyn Connection,
        cmd: &Command,
        target: &str,
        key: Option<std::any::TypeId>,
        bind: &BindRequest,
        options: CursorOptions,
        split: &SplitOn,
        combine: &mut F,
    ) -> MapResult<Vec<R>>
    where
        M: MultiMap,
        F: FnMut(M) -> R,
    {
        let mut cursor = conn.execute(cmd, bind, options).await?;
        self.joined(&mut *cursor, cmd, target, key, split, combine)
            .await
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Mapper::new()
    }
}

/// A lazy, row-at-a-time executor over a borrowed cursor.
///
/// The transform is compiled (and cached) up front; each [`next`](Fetch::next)
/// awaits one row. Dropping the value mid-result abandons the cursor
/// wherever it stands; [`dispose`](Fetch::dispose) drains it first.
pub struct Fetch<'c, T> {
    cursor: &'c mut dyn Cursor,
    transform: RowFn<T>,
    done: bool,
}

impl<'c, T: FromRow> Fetch<'c, T> {
    /// The next materialized row, or `None` once the slice is exhausted.
    /// Exhaustion drains any remaining result slices.
    pub async fn next(&mut self) -> MapResult<Option<T>> {
        if self.done {
            return Ok(None);
        }
        if self.cursor.read().await? {
            (self.transform)(&*self.cursor).map(Some)
        } else {
            self.done = true;
            drain(self.cursor).await?;
            Ok(None)
        }
    }

    /// Abandons the remaining rows, consuming them so the underlying cursor
    /// is left clean.
    pub async fn dispose(mut self) -> MapResult<()> {
        if !self.done {
            self.done = true;
            while self.cursor.read().await? {}
            drain(self.cursor).await?;
        }
        Ok(())
    }

    /// Adapts the executor into a [`Stream`] of materialized rows.
    pub fn into_stream(self) -> impl Stream<Item = MapResult<T>> + Send + 'c {
        stream::try_unfold(self, |mut fetch| async move {
            let item = fetch.next().await?;
            Ok(item.map(|item| (item, fetch)))
        })
    }
}

#[async_trait::async_trait]
impl<T: FromRow> Executor for Fetch<'_, T> {
    type Item = T;

    async fn next(&mut self) -> MapResult<Option<T>> {
        Fetch::next(self).await
    }
}

/// In-order access to the result slices of a multi-result response.
///
/// Each [`next_slice`](Grid::next_slice) call materializes one whole slice;
/// the slice index participates in the plan-cache identity, so a grid's
/// shapes are cached per position. Reading past the last slice is
/// [`Error::GridConsumed`].
pub struct Grid<'g> {
    mapper: &'g Mapper,
    cursor: &'g mut dyn Cursor,
    cmd: Command,
    target: String,
    slice: usize,
    finished: bool,
}

impl Grid<'_> {
    /// Materializes the current result slice and advances to the next.
    pub async fn next_slice<T: FromRow>(&mut self) -> MapResult<Vec<T>> {
        if self.finished {
            return Err(Error::GridConsumed);
        }
        let schema = snapshot(&*self.cursor);
        let transform = self
            .mapper
            .plan_single::<T>(&schema, &self.cmd, &self.target, None, self.slice)
            .await?;
        let mut out = Vec::new();
        while self.cursor.read().await? {
            out.push(transform(&*self.cursor)?);
        }
        self.slice += 1;
        if !self.cursor.next_result().await? {
            self.finished = true;
        }
        Ok(out)
    }

    /// Whether every slice has been consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consumes and discards any remaining slices.
    pub async fn finish(mut self) -> MapResult<()> {
        while !self.finished {
            while self.cursor.read().await? {}
            if !self.cursor.next_result().await? {
                self.finished = true;
            }
        }
        Ok(())
    }
}
