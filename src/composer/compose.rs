use chrono::NaiveDateTime;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::composer::types::{
    Composition, CompositionRequest, FetchOptions, FilterBounds, Line, PanelSeries, SummaryTable,
};
use crate::error::ComposerError;
use crate::store::DataStore;

/// Splits a component argument such as `"ZZ,ZN"` into its pairs.
pub fn parse_components(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// A nonzero `requested` window selects just that one; otherwise every
/// configured window is used.
pub fn resolve_mov_stacks(requested: Option<u32>, configured: &[u32]) -> Vec<u32> {
    match requested {
        Some(n) if n != 0 => vec![n],
        _ => configured.to_vec(),
    }
}

/// dv/v is plotted as a sign-inverted percentage.
pub fn to_dvv_percent(value: f64) -> f64 {
    value * -100.0
}

pub fn panel_title(mov_stack: u32) -> String {
    if mov_stack == 1 {
        "1 Day".to_string()
    } else {
        format!("{} Days Moving Window", mov_stack)
    }
}

pub fn figure_title(components: &[String], filter_id: u32, bounds: FilterBounds) -> String {
    format!(
        "{}, Filter {} ({:.2} - {:.2} Hz)",
        components.join(","),
        filter_id,
        bounds.low,
        bounds.high
    )
}

/// Looks up filter cutoffs, falling back to `0.0 - 0.0` when unknown.
pub async fn lookup_filter_bounds<S: DataStore + ?Sized>(store: &S, filter_id: u32) -> FilterBounds {
    match store.fetch_filter_bounds(filter_id).await {
        Ok(Some(bounds)) => bounds,
        Ok(None) => {
            debug!(filter_id, "Filter not registered, using zero bounds");
            FilterBounds::default()
        }
        Err(e) => {
            warn!(filter_id, error = %e, "Filter lookup failed, using zero bounds");
            FilterBounds::default()
        }
    }
}

/// Fetches one summary table, treating absence, store errors, empty tables
/// and timeouts alike as "no data".
async fn fetch_table<S: DataStore + ?Sized>(
    store: &S,
    components: &str,
    filter_id: u32,
    mov_stack: u32,
    options: &FetchOptions,
) -> Option<SummaryTable> {
    let fetch = store.fetch_summary_table(components, filter_id, mov_stack);
    match tokio::time::timeout(options.timeout, fetch).await {
        Ok(Ok(Some(table))) if !table.is_empty() => Some(table),
        Ok(Ok(_)) => {
            debug!(components, filter_id, mov_stack, "No dv/v data, skipping");
            None
        }
        Ok(Err(e)) => {
            warn!(components, filter_id, mov_stack, error = %e, "Summary fetch failed, skipping");
            None
        }
        Err(_) => {
            warn!(
                components,
                filter_id,
                mov_stack,
                timeout_secs = options.timeout.as_secs_f64(),
                "Summary fetch timed out, skipping"
            );
            None
        }
    }
}

/// Fetches every (window, component) table concurrently.
///
/// The result is indexed `[window][component]` in request order.
async fn fetch_all<S: DataStore + 'static>(
    store: Arc<S>,
    request: &CompositionRequest,
    options: &FetchOptions,
) -> Result<Vec<Vec<Option<SummaryTable>>>, ComposerError> {
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    // Dropping the set on an early return aborts the fetches still in flight.
    let mut tasks = JoinSet::new();

    for (w, &mov_stack) in request.mov_stacks.iter().enumerate() {
        for (c, components) in request.components.iter().enumerate() {
            let store = store.clone();
            let sem = semaphore.clone();
            let options = options.clone();
            let components = components.clone();
            let filter_id = request.filter_id;

            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = sem.acquire_owned().await.ok();
                let table =
                    fetch_table(store.as_ref(), &components, filter_id, mov_stack, &options).await;
                (w, c, table)
            });
        }
    }

    let mut grid: Vec<Vec<Option<SummaryTable>>> = request
        .mov_stacks
        .iter()
        .map(|_| vec![None; request.components.len()])
        .collect();

    while let Some(joined) = tasks.join_next().await {
        let (w, c, table) = joined?;
        grid[w][c] = table;
    }

    Ok(grid)
}

/// Turns one table into overlay lines for the requested curves.
fn table_lines(component: &str, table: &SummaryTable, request: &CompositionRequest) -> Vec<Line> {
    request
        .curves
        .iter()
        .filter_map(|&curve| {
            let Some(values) = table.column(curve.column()) else {
                debug!(component, curve = curve.column(), "Curve missing from table");
                return None;
            };
            Some(Line {
                component: component.to_string(),
                curve,
                label: format!("{}: {}", component, curve.column()),
                dates: table.index().to_vec(),
                values: values.iter().copied().map(to_dvv_percent).collect(),
            })
        })
        .collect()
}

/// Composes the dv/v panels for every requested window and component pair.
///
/// Missing tables are skipped. The span of the first table that contributes a
/// line to the earliest window with any lines becomes the horizontal range of
/// every other panel.
///
/// # Errors
///
/// [`ComposerError::NoVariantsRequested`] if `request.mov_stacks` is empty,
/// [`ComposerError::FetchTaskFailed`] if a fetch task panicked.
#[tracing::instrument(skip_all, fields(filter_id = request.filter_id, windows = request.mov_stacks.len()))]
pub async fn compose<S: DataStore + 'static>(
    store: Arc<S>,
    request: &CompositionRequest,
    options: &FetchOptions,
) -> Result<Composition, ComposerError> {
    if request.mov_stacks.is_empty() {
        return Err(ComposerError::NoVariantsRequested);
    }

    let bounds = lookup_filter_bounds(store.as_ref(), request.filter_id).await;
    let grid = fetch_all(store, request, options).await?;

    let mut panels = Vec::with_capacity(request.mov_stacks.len());
    let mut shared: Option<(usize, (NaiveDateTime, NaiveDateTime))> = None;

    for (i, (&mov_stack, tables)) in request.mov_stacks.iter().zip(&grid).enumerate() {
        let mut lines = Vec::new();

        for (components, table) in request.components.iter().zip(tables) {
            let Some(table) = table else {
                continue;
            };
            let drawn = table_lines(components, table, request);
            if shared.is_none() && !drawn.is_empty() {
                shared = table.span().map(|span| (i, span));
            }
            lines.extend(drawn);
        }

        debug!(mov_stack, lines = lines.len(), "Panel assembled");
        panels.push(PanelSeries {
            index: i,
            mov_stack,
            title: panel_title(mov_stack),
            lines,
            x_range: None,
        });
    }

    if let Some((source, range)) = shared {
        for panel in panels.iter_mut().filter(|p| p.index != source) {
            panel.x_range = Some(range);
        }
    }

    let line_count: usize = panels.iter().map(|p| p.lines.len()).sum();
    info!(panels = panels.len(), lines = line_count, "Composition complete");

    Ok(Composition {
        title: figure_title(&request.components, request.filter_id, bounds),
        filter_id: request.filter_id,
        bounds,
        panels,
    })
}
