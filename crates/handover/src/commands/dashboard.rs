//! Dashboard: the signed-in donor's listings with totals.

use handover_core::Dashboard;

use crate::error::CliError;
use crate::output::{self, Palette};

use super::Context;
use super::listings::ListingRow;
use super::util;

fn detail(d: &Dashboard, palette: &Palette) -> String {
    let stats = format!(
        "Total: {}   Active: {}   Completed: {}   Beneficiaries: {}",
        d.stats.total, d.stats.active, d.stats.completed, d.stats.beneficiaries
    );
    if d.items.is_empty() {
        return format!(
            "{}\n{}",
            palette.heading(&stats),
            palette.muted("You have not posted any listings yet.")
        );
    }
    let rows: Vec<ListingRow> = d.items.iter().map(ListingRow::from).collect();
    format!("{}\n{}", palette.heading(&stats), output::render_table(&rows))
}

pub async fn handle(ctx: &Context<'_>) -> Result<(), CliError> {
    util::sign_in(ctx).await?;
    let dashboard = ctx.marketplace.dashboard().await?;
    let out = output::render_single(
        ctx.global.output,
        &dashboard,
        |d| detail(d, ctx.palette),
        |d| {
            d.items
                .iter()
                .map(|l| l.id.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&out, ctx.global.quiet);
    Ok(())
}
