use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::commands::{self, AppContext, MediaChanges};
use crate::config::AppConfig;
use crate::database::{FilterCriterion, MediaFilters, MediaType, MetaKind, NewEpisode, SourceInfo};
use crate::error::AppError;
use crate::templates::TemplateKind;

#[derive(Parser)]
#[command(name = "media-catalog", version, about = "Personal movie and TV series catalog")]
pub struct Cli {
    /// Directory holding config.yaml and .env
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct FilterArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    director: Option<String>,
    #[arg(long)]
    actor: Option<String>,
    #[arg(long)]
    genre: Option<String>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    watched: Option<bool>,
    #[arg(long)]
    to_burn: Option<bool>,
    #[arg(long)]
    year: Option<i64>,
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    edition: Option<String>,
    #[arg(long)]
    quality: Option<String>,
    #[arg(long)]
    disc: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add titles (arguments, or one per line from --file)
    Add {
        media_type: MediaType,
        titles: Vec<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List records matching the filters
    List {
        media_type: MediaType,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Show one record with genres, languages and cast
    Show {
        media_type: MediaType,
        id: i64,
        /// Only list episodes of this season (series)
        #[arg(long)]
        season: Option<i64>,
    },
    /// Show one episode
    ShowEpisode { id: i64 },
    /// Update fields given as column=value
    Update {
        media_type: MediaType,
        id: i64,
        fields: Vec<String>,
        /// Comma separated; an empty string clears all genres
        #[arg(long)]
        genres: Option<String>,
        #[arg(long)]
        languages: Option<String>,
        #[arg(long)]
        lookup_source: Option<String>,
        #[arg(long)]
        source_url: Option<String>,
        /// Episode to update together with the series
        #[arg(long)]
        episode: Option<i64>,
        #[arg(long = "episode-field")]
        episode_fields: Vec<String>,
    },
    /// Apply the same column=value changes to many records
    BulkUpdate {
        media_type: MediaType,
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<i64>,
        fields: Vec<String>,
        /// Genre to add to every record
        #[arg(long)]
        genre: Option<String>,
    },
    Delete {
        media_type: MediaType,
        id: i64,
    },
    DeleteEpisodes {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Mark episodes of a series watched, or unwatched with --unwatched
    WatchEpisodes {
        series_id: i64,
        /// Comma separated episode ids
        #[arg(long, value_delimiter = ',')]
        ids: Vec<i64>,
        #[arg(long)]
        unwatched: bool,
        /// Also set the series itself
        #[arg(long)]
        series: bool,
    },
    AddEpisode {
        series_id: i64,
        season: i64,
        episode: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        plot: Option<String>,
        #[arg(long)]
        release_date: Option<String>,
    },
    /// Search a lookup template for a title
    Search {
        media_type: MediaType,
        title: String,
        #[arg(long)]
        template: Option<String>,
    },
    /// Fetch details by online id and merge them into a local record
    Fetch {
        media_type: MediaType,
        online_id: String,
        /// Local record that receives the fetched details
        #[arg(long = "into", value_name = "LOCAL_ID", required_unless_present = "preview")]
        local_id: Option<i64>,
        #[arg(long)]
        template: Option<String>,
        #[arg(long)]
        no_poster: bool,
        /// Print the fetched details without saving
        #[arg(long)]
        preview: bool,
    },
    Export {
        media_type: MediaType,
        path: PathBuf,
        #[arg(long, default_value = "CSV")]
        template: String,
    },
    Import {
        media_type: MediaType,
        path: PathBuf,
        #[arg(long, default_value = "CSV")]
        template: String,
        /// Column mapping as source=catalog, repeatable
        #[arg(long = "map")]
        column_map: Vec<String>,
    },
    Publish {
        media_type: MediaType,
        #[arg(long)]
        template: Option<String>,
    },
    /// Manage genres, languages, sources, editions and qualities
    Meta {
        #[command(subcommand)]
        command: MetaCommand,
    },
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// List registered templates
    Templates {
        #[arg(long)]
        kind: Option<TemplateKind>,
    },
}

#[derive(Subcommand)]
pub enum MetaCommand {
    List { kind: MetaKind },
    Add { kind: MetaKind, name: String },
    Remove { kind: MetaKind, name: String },
    /// Make the table hold exactly the given names
    Sync { kind: MetaKind, names: Vec<String> },
    Actors,
    Discs { media_type: MediaType },
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    Get { key: String },
    Set { key: String, value: String },
    List,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn progress(message: &str) {
    eprintln!("{}", message);
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Resolve a metadata name (case-insensitive) to its id.
fn meta_id(ctx: &AppContext, kind: MetaKind, name: &str) -> Result<i64, AppError> {
    commands::list_meta_values(ctx, kind)?
        .into_iter()
        .find(|v| v.name.eq_ignore_ascii_case(name.trim()))
        .map(|v| v.id)
        .ok_or_else(|| AppError::NotFound(format!("{} '{}'", kind, name)))
}

impl FilterArgs {
    fn to_filters(&self, ctx: &AppContext) -> Result<MediaFilters, AppError> {
        let mut filters = MediaFilters::new();
        if let Some(title) = &self.title {
            filters.set(FilterCriterion::Title(title.clone()));
        }
        if let Some(director) = &self.director {
            filters.set(FilterCriterion::Director(director.clone()));
        }
        if let Some(actor) = &self.actor {
            filters.set(FilterCriterion::Actor(actor.clone()));
        }
        if let Some(genre) = &self.genre {
            filters.set(FilterCriterion::Genre(meta_id(ctx, MetaKind::Genre, genre)?));
        }
        if let Some(language) = &self.language {
            filters.set(FilterCriterion::Language(meta_id(ctx, MetaKind::Language, language)?));
        }
        if let Some(watched) = self.watched {
            filters.set(FilterCriterion::Watched(watched));
        }
        if let Some(to_burn) = self.to_burn {
            filters.set(FilterCriterion::ToBurn(to_burn));
        }
        if let Some(year) = self.year {
            filters.set(FilterCriterion::Year(year));
        }
        if let Some(source) = &self.source {
            filters.set(FilterCriterion::Source(meta_id(ctx, MetaKind::Source, source)?));
        }
        if let Some(edition) = &self.edition {
            filters.set(FilterCriterion::Edition(meta_id(ctx, MetaKind::Edition, edition)?));
        }
        if let Some(quality) = &self.quality {
            filters.set(FilterCriterion::Quality(meta_id(ctx, MetaKind::Quality, quality)?));
        }
        if let Some(disc) = &self.disc {
            filters.set(FilterCriterion::BackupDisc(disc.clone()));
        }
        Ok(filters)
    }
}

pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let config = AppConfig::load(&cli.project_dir)?;
    let ctx = AppContext::open(config)?;

    match cli.command {
        Command::Add { media_type, mut titles, file } => {
            if let Some(file) = file {
                titles.extend(std::fs::read_to_string(file)?.lines().map(str::to_string));
            }
            print_json(&commands::add_media(&ctx, media_type, &titles)?)
        }
        Command::List { media_type, filters } => {
            let filters = filters.to_filters(&ctx)?;
            print_json(&commands::list_media(&ctx, media_type, &filters)?)
        }
        Command::Show { media_type, id, season } => match (media_type, season) {
            (MediaType::Series, Some(season)) => {
                print_json(&commands::list_episodes(&ctx, id, Some(season))?)
            }
            _ => print_json(&commands::get_media_details(&ctx, media_type, id)?),
        },
        Command::ShowEpisode { id } => print_json(&commands::get_episode_details(&ctx, id)?),
        Command::Update {
            media_type,
            id,
            fields,
            genres,
            languages,
            lookup_source,
            source_url,
            episode,
            episode_fields,
        } => {
            let source = match (lookup_source, source_url) {
                (None, None) => None,
                (lookup_source, source_url) => Some(SourceInfo {
                    lookup_source: lookup_source.unwrap_or_default(),
                    source_url: source_url.unwrap_or_default(),
                }),
            };
            let episode = match episode {
                Some(episode_id) => Some((episode_id, commands::parse_assignments(&episode_fields)?)),
                None if !episode_fields.is_empty() => {
                    return Err(AppError::Validation("--episode-field needs --episode".to_string()));
                }
                None => None,
            };
            let changes = MediaChanges {
                fields: commands::parse_assignments(&fields)?,
                source,
                episode,
                genres: genres.as_deref().map(split_names),
                languages: languages.as_deref().map(split_names),
            };
            print_json(&commands::update_media(&ctx, media_type, id, changes)?)
        }
        Command::BulkUpdate { media_type, ids, fields, genre } => {
            let fields = commands::parse_assignments(&fields)?;
            print_json(&commands::bulk_update_media(&ctx, media_type, ids, &fields, genre)?)
        }
        Command::Delete { media_type, id } => {
            if commands::delete_media(&ctx, media_type, id)? {
                println!("Deleted {} {}", media_type, id);
                Ok(())
            } else {
                Err(AppError::NotFound(format!("{} {}", media_type, id)))
            }
        }
        Command::DeleteEpisodes { ids } => {
            let deleted = commands::delete_episodes(&ctx, &ids)?;
            println!("Deleted {} episodes", deleted);
            Ok(())
        }
        Command::WatchEpisodes {
            series_id,
            ids,
            unwatched,
            series,
        } => print_json(&commands::set_episodes_watched(&ctx, series_id, &ids, !unwatched, series)?),
        Command::AddEpisode {
            series_id,
            season,
            episode,
            title,
            plot,
            release_date,
        } => {
            let episode = NewEpisode {
                season,
                episode,
                title,
                plot,
                release_date,
            };
            let id = commands::add_episode(&ctx, series_id, &episode)?;
            println!("Added episode {}", id);
            Ok(())
        }
        Command::Search { media_type, title, template } => {
            let hits = commands::search_media(&ctx, template.as_deref(), media_type, &title, progress).await?;
            print_json(&hits)
        }
        Command::Fetch {
            media_type,
            local_id,
            online_id,
            template,
            no_poster,
            preview,
        } => {
            let local_id = match (preview, local_id) {
                (false, Some(local_id)) => local_id,
                (false, None) => {
                    return Err(AppError::Validation("--into is required unless previewing".to_string()))
                }
                (true, _) => {
                    let fetched =
                        commands::fetch_details(&ctx, template.as_deref(), media_type, &online_id, progress).await?;
                    return print_json(&fetched);
                }
            };
            let report = commands::fetch_and_save(
                &ctx,
                template.as_deref(),
                media_type,
                local_id,
                &online_id,
                !no_poster,
                progress,
            )
            .await?;
            print_json(&report)
        }
        Command::Export { media_type, path, template } => {
            let written = commands::export_media(&ctx, &template, media_type, &path)?;
            println!("Exported {} rows to {}", written, path.display());
            Ok(())
        }
        Command::Import {
            media_type,
            path,
            template,
            column_map,
        } => {
            let column_map = commands::parse_column_map(&column_map)?;
            print_json(&commands::import_media(&ctx, &template, media_type, &path, &column_map)?)
        }
        Command::Publish { media_type, template } => {
            print_json(&commands::publish_media(&ctx, template.as_deref(), media_type)?)
        }
        Command::Meta { command } => match command {
            MetaCommand::List { kind } => print_json(&commands::list_meta_values(&ctx, kind)?),
            MetaCommand::Add { kind, name } => {
                let id = commands::add_meta_value(&ctx, kind, &name)?;
                println!("{} '{}' has id {}", kind, name.trim(), id);
                Ok(())
            }
            MetaCommand::Remove { kind, name } => commands::remove_meta_value(&ctx, kind, &name),
            MetaCommand::Sync { kind, names } => print_json(&commands::sync_meta_values(&ctx, kind, &names)?),
            MetaCommand::Actors => print_json(&commands::list_actors(&ctx)?),
            MetaCommand::Discs { media_type } => print_json(&commands::list_discs(&ctx, media_type)?),
        },
        Command::Settings { command } => match command {
            SettingsCommand::Get { key } => {
                println!("{}", commands::get_setting(&ctx, &key)?.unwrap_or_default());
                Ok(())
            }
            SettingsCommand::Set { key, value } => commands::set_setting(&ctx, &key, &value),
            SettingsCommand::List => print_json(&commands::get_all_settings(&ctx)?),
        },
        Command::Templates { kind } => print_json(&commands::list_templates(&ctx, kind)),
    }
}
