//! Multi-mapping: one flat row, several materialized values.
//!
//! The splitter partitions the schema's columns into contiguous ranges at
//! named boundary columns, compiles one transform per mapped tuple slot
//! (every slot after the first guarded by the missing-secondary rule), and
//! reads each row into a value tuple. The user's combine function is applied
//! by the driver, outside the cache, so one cached transform set serves any
//! combine closure.

use std::{any, ops::Range};

use tracing::trace;

use crate::{
    cursor::RowView,
    error::{Error, MapResult},
    exec::compile::{compile_guarded, FromRow, PlanCtx, RowFn},
    schema::column::ResultSchema,
};

/// The boundary column name(s) marking where one target's columns end and
/// the next begin.
///
/// A single name is reused for every boundary; a comma-separated list
/// assigns one name per boundary position, the last name covering any
/// remaining boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOn {
    names: Vec<String>,
}

impl SplitOn {
    pub fn single(name: impl Into<String>) -> SplitOn {
        SplitOn {
            names: vec![name.into()],
        }
    }

    /// Parses `"id"` or `"id,owner_id,ref"`.
    pub fn parse(raw: &str) -> SplitOn {
        let names: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
        if names.is_empty() {
            SplitOn::default()
        } else {
            SplitOn { names }
        }
    }

    /// The boundary name for the given boundary position (0 separates slots
    /// 0 and 1, and so on).
    pub fn name_for(&self, boundary: usize) -> &str {
        let i = boundary.min(self.names.len() - 1);
        &self.names[i]
    }
}

impl Default for SplitOn {
    fn default() -> Self {
        SplitOn::single("id")
    }
}

/// Partitions the schema into exactly `slots` contiguous ranges.
///
/// Each boundary is found by scanning forward from just past the current
/// slice's start for the next column case-insensitively equal to the
/// boundary name. A boundary that never occurs degrades to an oversized
/// final slice (and empty trailing ranges), which is a caller error in
/// practice but not a fatal one.
pub fn split_ranges(schema: &ResultSchema, split: &SplitOn, slots: usize) -> Vec<Range<usize>> {
    let n = schema.len();
    let mut ranges = Vec::with_capacity(slots);
    let mut start = 0_usize;
    for boundary in 0..slots.saturating_sub(1) {
        let name = split.name_for(boundary);
        let next = (start + 1..n)
            .find(|&i| schema.columns[i].name.eq_ignore_ascii_case(name))
            .unwrap_or(n);
        ranges.push(start..next);
        start = next;
    }
    ranges.push(start..n);
    trace!(?ranges, slots, "partitioned columns");
    ranges
}

/// The do-not-map sentinel: a tuple position carrying this type receives no
/// column range, no transform, and is always `None` in the value tuple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Skip;

impl FromRow for Skip {
    const MAPPED: bool = false;

    fn compile(_ctx: &PlanCtx<'_>) -> MapResult<RowFn<Self>> {
        Err(Error::ShapeMismatch(
            "the do-not-map sentinel has no transform".into(),
        ))
    }
}

/// A multi-map value tuple: the primary value plus one `Option` per
/// secondary slot (a `None` secondary is the null-object result of the
/// missing-secondary rule, or a `Skip` slot).
///
/// Implemented for arities 2 through 15.
pub trait MultiMap: Sized {
    /// The cached per-slice transform set.
    type Transforms: Clone + Send + Sync + 'static;

    /// The primary target type and the ordered secondary target types, as
    /// they appear in the plan-cache identity.
    fn type_ids() -> (any::TypeId, Vec<any::TypeId>);

    /// Splits the context's schema and compiles one transform per mapped
    /// slot. The first slice is compiled plain; every subsequent slice is
    /// guarded by the missing-secondary rule.
    fn compile(ctx: &PlanCtx<'_>, split: &SplitOn) -> MapResult<Self::Transforms>;

    /// Materializes the current row into the value tuple.
    fn read_row(row: &dyn RowView, transforms: &Self::Transforms) -> MapResult<Self>;
}

macro_rules! multi_map_tuple {
    ($($S:ident),+) => {
        impl<P, $($S),+> MultiMap for (P, $(Option<$S>),+)
        where
            P: FromRow,
            $($S: FromRow),+
        {
            type Transforms = (RowFn<P>, $(Option<RowFn<Option<$S>>>),+);

            fn type_ids() -> (any::TypeId, Vec<any::TypeId>) {
                (
                    any::TypeId::of::<P>(),
                    vec![$(any::TypeId::of::<$S>()),+],
                )
            }

            fn compile(ctx: &PlanCtx<'_>, split: &SplitOn) -> MapResult<Self::Transforms> {
                if !P::MAPPED {
                    return Err(Error::ShapeMismatch(
                        "the primary multi-map slot cannot be the do-not-map sentinel".into(),
                    ));
                }
                let slots = 1 $(+ usize::from($S::MAPPED))+;
                let ranges = split_ranges(ctx.schema, split, slots);
                let mut next = 0_usize;
                let mut take = || {
                    let range = ranges[next].clone();
                    next += 1;
                    range
                };
                let primary = {
                    let r = take();
                    P::compile(&ctx.narrowed(r.start, r.end - r.start))?
                };
                Ok((
                    primary,
                    $(if $S::MAPPED {
                        let r = take();
                        if r.is_empty() {
                            // Unmatched boundary degraded to an empty range.
                            None
                        } else {
                            Some(compile_guarded::<$S>(&ctx.narrowed(r.start, r.end - r.start))?)
                        }
                    } else {
                        None
                    }),+
                ))
            }

            fn read_row(row: &dyn RowView, transforms: &Self::Transforms) -> MapResult<Self> {
                #[allow(non_snake_case)]
                let (primary, $($S),+) = transforms;
                Ok((
                    primary(row)?,
                    $(match $S {
                        Some(transform) => transform(row)?,
                        None => None,
                    }),+
                ))
            }
        }
    };
}

multi_map_tuple!(B);
multi_map_tuple!(B, C);
multi_map_tuple!(B, C, D);
multi_map_tuple!(B, C, D, E);
multi_map_tuple!(B, C, D, E, F);
multi_map_tuple!(B, C, D, E, F, G);
multi_map_tuple!(B, C, D, E, F, G, H);
multi_map_tuple!(B, C, D, E, F, G, H, I);
multi_map_tuple!(B, C, D, E, F, G, H, I, J);
multi_map_tuple!(B, C, D, E, F, G, H, I, J, K);
multi_map_tuple!(B, C, D, E, F, G, H, I, J, K, L);
multi_map_tuple!(B, C, D, E, F, G, H, I, J, K, L, M);
multi_map_tuple!(B, C, D, E, F, G, H, I, J, K, L, M, N);
multi_map_tuple!(B, C, D, E, F, G, H, I, J, K, L, M, N, O);
