//! Search handlers: a single page, or a live view with `--watch`.

use tokio::io::{AsyncBufReadExt, BufReader};

use handover_core::{CategoryFilter, LiveSnapshot, SearchCriteria, SearchDebouncer, SearchPage};

use crate::cli::SearchArgs;
use crate::error::CliError;
use crate::output;

use super::Context;
use super::listings::ListingRow;

fn criteria_from(args: &SearchArgs) -> SearchCriteria {
    SearchCriteria::new()
        .with_text(args.text.clone().unwrap_or_default())
        .with_category(CategoryFilter::from(args.category))
        .with_condition(args.condition.map(Into::into))
        .with_sort(args.sort.into())
        .with_page(args.page)
}

fn render_page(ctx: &Context<'_>, page: &SearchPage) -> Result<String, CliError> {
    output::render_single(
        ctx.global.output,
        page,
        |p| {
            if p.items.is_empty() {
                return ctx.palette.muted("No listings match.");
            }
            let rows: Vec<ListingRow> = p.items.iter().map(ListingRow::from).collect();
            let table = output::render_table(&rows);
            format!(
                "{table}\n{}",
                ctx.palette.muted(&format!(
                    "Page {} of {} · {} result{}",
                    p.page,
                    p.page_count().max(1),
                    p.total,
                    if p.total == 1 { "" } else { "s" }
                ))
            )
        },
        |p| {
            p.items
                .iter()
                .map(|l| l.id.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        },
    )
}

// ── One-shot ────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context<'_>, args: &SearchArgs) -> Result<(), CliError> {
    let page = ctx.marketplace.search(&criteria_from(args)).await?;
    output::print_output(&render_page(ctx, &page)?, ctx.global.quiet);
    Ok(())
}

// ── Live ────────────────────────────────────────────────────────────

fn render_snapshot(ctx: &Context<'_>, snapshot: &LiveSnapshot) -> Result<(), CliError> {
    let mut header = format!("Search: \"{}\" in {}", snapshot.criteria.text, snapshot.criteria.category);
    if !snapshot.connected {
        header.push_str(" (offline)");
    }
    output::print_status(&ctx.palette.heading(&header), ctx.global.quiet);
    if let Some(ref error) = snapshot.last_error {
        output::print_status(
            &ctx.palette
                .notification(handover_core::NotificationKind::Error, &format!("Refresh failed: {error}")),
            ctx.global.quiet,
        );
    }
    output::print_output(&render_page(ctx, &snapshot.page)?, ctx.global.quiet);
    Ok(())
}

/// Keep the result current from the realtime channel. Each stdin line
/// becomes the new search text (debounced); Ctrl-C or EOF stops.
pub async fn watch(ctx: &Context<'_>, args: &SearchArgs) -> Result<(), CliError> {
    let mut criteria = criteria_from(args);
    let mut live = ctx.marketplace.live_search(criteria.clone()).await?;
    render_snapshot(ctx, &live.latest())?;

    let (mut debouncer, mut debounced) = SearchDebouncer::new(ctx.marketplace.config().debounce);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line(), if stdin_open => match line? {
                Some(text) => {
                    criteria = criteria.with_text(text.trim()).with_page(1);
                    debouncer.submit(criteria.clone());
                }
                None => stdin_open = false,
            },
            Some(next) = debounced.recv() => live.set_criteria(next),
            snapshot = live.changed() => match snapshot {
                Some(snapshot) => render_snapshot(ctx, &snapshot)?,
                None => break,
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use handover_core::{Category, Condition, SortKey};

    use crate::cli::{Cli, Command};

    fn args(argv: &[&str]) -> SearchArgs {
        let mut full = vec!["handover", "search"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).map(|c| c.command) {
            Ok(Command::Search(args)) => args,
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn flags_become_criteria() {
        let c = criteria_from(&args(&[
            "oak chair",
            "--category",
            "furniture",
            "--condition",
            "like-new",
            "--sort",
            "title-asc",
            "--page",
            "2",
        ]));
        assert_eq!(c.text, "oak chair");
        assert_eq!(c.category, CategoryFilter::Only(Category::Furniture));
        assert_eq!(c.condition, Some(Condition::LikeNew));
        assert_eq!(c.sort, SortKey::TitleAsc);
        assert_eq!(c.page(), 2);
    }

    #[test]
    fn defaults_search_everything_newest_first() {
        let c = criteria_from(&args(&[]));
        assert_eq!(c, SearchCriteria::new());
    }

    #[test]
    fn page_zero_is_rejected() {
        assert!(Cli::try_parse_from(["handover", "search", "--page", "0"]).is_err());
    }
}
