//! Listing command handlers.

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Tabled;

use handover_core::{
    Command as CoreCommand, CommandResult, Listing, ListingDetail, ListingDraft, ListingId,
    PhotoUpload, UploadProgress,
};

use crate::cli::{CreateArgs, EditArgs, ListingsArgs, ListingsCommand};
use crate::error::CliError;
use crate::output::{self, Palette};

use super::Context;
use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct ListingRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Condition")]
    condition: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Posted")]
    posted: String,
}

impl From<&Listing> for ListingRow {
    fn from(l: &Listing) -> Self {
        Self {
            id: l.id.to_string(),
            title: output::truncate(&l.title, 32),
            category: l.category.to_string(),
            condition: l.condition.label().to_owned(),
            status: l.status.to_string(),
            location: output::truncate(&l.location, 24),
            posted: l.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

fn listing_summary(l: &Listing) -> Vec<String> {
    let mut lines = vec![
        format!("ID:          {}", l.id),
        format!("Title:       {}", l.title),
        format!("Category:    {}", l.category),
        format!("Condition:   {} ({})", l.condition.label(), l.condition.description()),
        format!("Status:      {}", l.status),
        format!("Location:    {}", l.location),
        format!(
            "Pickup:      {}",
            l.pickup_instructions.as_deref().unwrap_or("-")
        ),
    ];
    if !l.tags.is_empty() {
        lines.push(format!("Tags:        {}", l.tags.join(", ")));
    }
    if let Some(ref d) = l.dimensions {
        lines.push(format!(
            "Dimensions:  {} x {} x {} {}",
            d.length, d.width, d.height, d.unit
        ));
    }
    lines.push(format!(
        "Posted:      {} ({})",
        l.created_at.format("%Y-%m-%d %H:%M"),
        output::age(l.created_at, chrono::Utc::now())
    ));
    for (i, url) in l.photos.iter().enumerate() {
        lines.push(format!("Photo {}:     {url}", i + 1));
    }
    lines
}

fn detail(d: &ListingDetail, palette: &Palette) -> String {
    let mut lines = vec![palette.heading(&d.listing.title)];
    lines.extend(listing_summary(&d.listing));
    lines.push(format!(
        "Donor:       {} ({:.1}★, {} review{})",
        d.owner.display_name(),
        d.owner_rating,
        d.review_count,
        if d.review_count == 1 { "" } else { "s" }
    ));
    if d.is_favorite {
        lines.push(palette.accent("♥ In your favorites"));
    }
    lines.push(String::new());
    lines.push(d.listing.description.clone());

    if !d.reviews.is_empty() {
        lines.push(String::new());
        lines.push(palette.heading("Reviews"));
        for r in &d.reviews {
            let who = r
                .reviewer
                .as_ref()
                .and_then(|p| p.full_name.as_deref())
                .unwrap_or("Anonymous");
            lines.push(format!(
                "  {}  {who}: {}",
                "★".repeat(usize::from(r.rating.min(5))),
                r.comment.as_deref().unwrap_or("")
            ));
        }
    }
    if !d.related.is_empty() {
        lines.push(String::new());
        lines.push(palette.heading("Related"));
        for r in &d.related {
            lines.push(format!(
                "  {}  {} {}",
                palette.muted(r.id.as_str()),
                r.title,
                palette.status(r.status)
            ));
        }
    }
    lines.join("\n")
}

// ── Drafts ──────────────────────────────────────────────────────────

fn create_draft(args: &CreateArgs) -> Result<ListingDraft, CliError> {
    let mut draft: ListingDraft = match args.from_file {
        Some(ref path) => util::read_json_file(path)?,
        None => ListingDraft::default(),
    };
    if let Some(ref v) = args.title {
        draft.title.clone_from(v);
    }
    if let Some(ref v) = args.description {
        draft.description.clone_from(v);
    }
    if let Some(c) = args.category {
        draft.category = handover_core::CategoryFilter::from(c).category();
    }
    if let Some(c) = args.condition {
        draft.condition = c.into();
    }
    if let Some(ref v) = args.location {
        draft.location.clone_from(v);
    }
    if args.pickup.is_some() {
        draft.pickup_instructions.clone_from(&args.pickup);
    }
    if !args.tags.is_empty() {
        draft.tags.clone_from(&args.tags);
    }
    if let Some(ref raw) = args.dimensions {
        draft.dimensions = Some(util::parse_dimensions(raw, &args.unit)?);
    }
    Ok(draft)
}

fn draft_from(listing: &Listing) -> ListingDraft {
    ListingDraft {
        title: listing.title.clone(),
        description: listing.description.clone(),
        category: Some(listing.category),
        condition: listing.condition,
        status: listing.status,
        location: listing.location.clone(),
        pickup_instructions: listing.pickup_instructions.clone(),
        tags: listing.tags.clone(),
        dimensions: listing.dimensions.clone(),
    }
}

fn edit_draft(listing: &Listing, args: &EditArgs) -> Result<ListingDraft, CliError> {
    let mut draft = draft_from(listing);
    if let Some(ref v) = args.title {
        draft.title.clone_from(v);
    }
    if let Some(ref v) = args.description {
        draft.description.clone_from(v);
    }
    if let Some(c) = args.category {
        draft.category = handover_core::CategoryFilter::from(c).category();
    }
    if let Some(c) = args.condition {
        draft.condition = c.into();
    }
    if let Some(s) = args.status {
        draft.status = s.into();
    }
    if let Some(ref v) = args.location {
        draft.location.clone_from(v);
    }
    if args.pickup.is_some() {
        draft.pickup_instructions.clone_from(&args.pickup);
    }
    if args.clear_tags {
        draft.tags.clear();
    } else if !args.tags.is_empty() {
        draft.tags.clone_from(&args.tags);
    }
    if let Some(ref raw) = args.dimensions {
        draft.dimensions = Some(util::parse_dimensions(raw, &args.unit)?);
    }
    Ok(draft)
}

/// Photo URLs left after dropping the 1-based positions in `remove`.
fn kept_photos(photos: &[String], remove: &[u32]) -> Result<Vec<String>, CliError> {
    for &pos in remove {
        let in_range = usize::try_from(pos).is_ok_and(|p| (1..=photos.len()).contains(&p));
        if !in_range {
            return Err(CliError::Validation {
                field: "remove-photo".into(),
                reason: format!("listing has {} photo(s), no photo #{pos}", photos.len()),
            });
        }
    }
    Ok(photos
        .iter()
        .enumerate()
        .filter(|(i, _)| !remove.iter().any(|&pos| usize::try_from(pos).is_ok_and(|p| p == i + 1)))
        .map(|(_, url)| url.clone())
        .collect())
}

// ── Upload progress ─────────────────────────────────────────────────

fn progress_bar(photos: &[PhotoUpload], quiet: bool) -> Option<(ProgressBar, UploadProgress)> {
    if photos.is_empty() {
        return None;
    }
    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(100)
    };
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:30}] {pos:>3}%")
            .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("=> ")),
    );
    let total: usize = photos.iter().map(|p| p.bytes.len()).sum();
    bar.set_message(format!(
        "Uploading {} photo(s), {}",
        photos.len(),
        bytesize::ByteSize::b(u64::try_from(total).unwrap_or(u64::MAX))
    ));
    let reporter = bar.clone();
    let progress = UploadProgress::new(move |pct| reporter.set_position(u64::from(pct)));
    Some((bar, progress))
}

async fn run_write(
    ctx: &Context<'_>,
    cmd: CoreCommand,
    photos: &[PhotoUpload],
) -> Result<CommandResult, CliError> {
    let (bar, progress) = progress_bar(photos, ctx.global.quiet).unzip();
    let result = ctx.marketplace.execute_with_progress(cmd, progress).await;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    Ok(result?)
}

fn print_listing(ctx: &Context<'_>, listing: &Listing) -> Result<(), CliError> {
    let out = output::render_single(
        ctx.global.output,
        listing,
        |l| listing_summary(l).join("\n"),
        |l| l.id.to_string(),
    )?;
    output::print_output(&out, ctx.global.quiet);
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub async fn handle(ctx: &Context<'_>, args: ListingsArgs) -> Result<(), CliError> {
    match args.command {
        ListingsCommand::Show { id } => {
            // Favorites are only known for a signed-in viewer; browsing
            // anonymously is fine.
            if ctx.email.is_some() && handover_config::resolve_password(ctx.profile_name).is_some() {
                util::sign_in(ctx).await?;
            }
            let found = ctx.marketplace.listing_detail(&ListingId::from(id)).await?;
            let out = output::render_single(
                ctx.global.output,
                &found,
                |d| detail(d, ctx.palette),
                |d| d.listing.id.to_string(),
            )?;
            output::print_output(&out, ctx.global.quiet);
            Ok(())
        }

        ListingsCommand::Create(args) => {
            let draft = create_draft(&args)?;
            let photos = util::read_photos(&args.photos)?;
            util::sign_in(ctx).await?;

            let cmd = CoreCommand::CreateListing {
                draft,
                photos: photos.clone(),
            };
            if let CommandResult::Created(listing) = run_write(ctx, cmd, &photos).await? {
                output::print_status(
                    &ctx.palette.notification(
                        handover_core::NotificationKind::Success,
                        &format!("Listing posted: {}", listing.id),
                    ),
                    ctx.global.quiet,
                );
                print_listing(ctx, &listing)?;
            }
            Ok(())
        }

        ListingsCommand::Edit(args) => {
            let new_photos = util::read_photos(&args.photos)?;
            util::sign_in(ctx).await?;

            let id = ListingId::from(args.id.clone());
            let current = ctx.marketplace.listing_detail(&id).await?.listing;
            let draft = edit_draft(&current, &args)?;
            let keep_photos = kept_photos(&current.photos, &args.remove_photos)?;

            let cmd = CoreCommand::UpdateListing {
                id,
                draft,
                keep_photos,
                new_photos: new_photos.clone(),
            };
            if let CommandResult::Updated(listing) = run_write(ctx, cmd, &new_photos).await? {
                output::print_status(
                    &ctx.palette.notification(
                        handover_core::NotificationKind::Success,
                        "Listing updated",
                    ),
                    ctx.global.quiet,
                );
                print_listing(ctx, &listing)?;
            }
            Ok(())
        }

        ListingsCommand::Delete { id } => {
            if !util::confirm(
                &format!("Delete listing {id} and its photos?"),
                "delete a listing",
                ctx.global.yes,
            )? {
                return Ok(());
            }
            util::sign_in(ctx).await?;

            let cmd = CoreCommand::DeleteListing {
                id: ListingId::from(id),
            };
            if let CommandResult::Deleted { id, photos_removed } = run_write(ctx, cmd, &[]).await? {
                output::print_status(
                    &ctx.palette.notification(
                        handover_core::NotificationKind::Success,
                        &format!("Deleted {id} ({photos_removed} photo(s) removed)"),
                    ),
                    ctx.global.quiet,
                );
            }
            Ok(())
        }

        ListingsCommand::Favorite { id } => {
            util::sign_in(ctx).await?;
            let id = ListingId::from(id);
            let favorite = ctx.marketplace.toggle_favorite(id.clone()).await?;
            let out = output::render_single(
                ctx.global.output,
                &serde_json::json!({ "id": id, "favorite": favorite }),
                |_| {
                    if favorite {
                        ctx.palette.accent(&format!("♥ {id} added to favorites"))
                    } else {
                        format!("{id} removed from favorites")
                    }
                },
                |_| favorite.to_string(),
            )?;
            output::print_output(&out, ctx.global.quiet);
            Ok(())
        }
    }
}
