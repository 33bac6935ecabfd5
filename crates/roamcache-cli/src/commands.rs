//! Command handlers.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing::{debug, info, warn};

use roamcache_core::auth::{CredentialStore, Session};
use roamcache_core::geo::Coordinate;
use roamcache_core::models::{NewReview, PlaceFilter};
use roamcache_core::network::{HttpProbe, ManualProbe, NetworkMonitor, ReachabilityProbe};
use roamcache_core::offline::{MutationOutcome, OfflineRepository};
use roamcache_core::storage::FileStore;
use roamcache_core::{ApiClient, Config, OfflineSync};

use crate::output;
use crate::{CacheCommands, Cli, Commands, FavoriteCommands, QueueCommands};

/// Everything a command needs, assembled once per invocation.
pub struct App {
    config: Config,
    session: Session,
    sync: OfflineSync,
}

impl App {
    pub async fn open(cli: &Cli) -> Result<Self> {
        let config = Config::load().context("Failed to load config")?;
        let data_dir = config.data_dir()?;

        let mut session = Session::new(data_dir.clone());
        if let Err(e) = session.load() {
            warn!(error = %e, "Ignoring unreadable session");
        }

        let mut client = ApiClient::new(cli.api_url.as_deref().unwrap_or(&config.api_base_url))?;
        if let Some(username) = session.username() {
            match CredentialStore::get_token(username) {
                Ok(token) => client.set_token(token),
                Err(e) => debug!(error = %e, "No stored token"),
            }
        }

        let store = Arc::new(FileStore::open(&data_dir).context("Failed to open local store")?);
        let probe: Arc<dyn ReachabilityProbe> = if cli.offline {
            Arc::new(ManualProbe::new(false))
        } else {
            Arc::new(HttpProbe::new(config.reachability_url())?)
        };
        let network = NetworkMonitor::with_interval(probe, config.poll_interval());
        // Establish the real state before the first read
        network.tick().await;

        let sync = OfflineSync::new(Arc::new(client), store, network);
        // Actions queued by an earlier offline run go out before anything new
        if let Some(report) = sync.replay_pending().await {
            info!(
                replayed = report.replayed,
                failed = report.failed,
                remaining = report.remaining,
                "Replayed actions queued while offline"
            );
        }
        Ok(Self {
            config,
            session,
            sync,
        })
    }

    fn repo(&self) -> &OfflineRepository {
        self.sync.repository()
    }
}

pub async fn login(cli: &Cli, username: Option<&str>) -> Result<()> {
    let mut config = Config::load().context("Failed to load config")?;
    let username = match username.or(config.last_username.as_deref()) {
        Some(name) => name.to_string(),
        None => bail!("No username given and no previous login to reuse"),
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", username))
        .context("Failed to read password")?;

    let client = ApiClient::new(cli.api_url.as_deref().unwrap_or(&config.api_base_url))?;
    let data = client.authenticate(&username, &password).await?;
    CredentialStore::store_token(&data.username, &data.token)?;

    let mut session = Session::new(config.data_dir()?);
    println!(
        "Logged in as {} (session valid for {} days)",
        data.username,
        data.days_until_expiry()
    );
    config.last_username = Some(data.username.clone());
    session.update(data);
    session.save()?;
    config.save()?;
    Ok(())
}

pub fn logout() -> Result<()> {
    let config = Config::load().context("Failed to load config")?;
    let mut session = Session::new(config.data_dir()?);
    if let Err(e) = session.load() {
        warn!(error = %e, "Ignoring unreadable session");
    }
    if let Some(username) = session.username() {
        if let Err(e) = CredentialStore::delete(username) {
            warn!(error = %e, "Failed to remove token from keychain");
        }
    }
    session.clear()?;
    println!("Logged out.");
    Ok(())
}

fn report_mutation<T>(outcome: &MutationOutcome<T>, done: &str) {
    match outcome {
        MutationOutcome::Applied(_) => println!("{}", done),
        MutationOutcome::Queued(queued) => println!(
            "Offline: queued as {} and will be sent when the connection returns.",
            queued.id
        ),
    }
}

pub async fn dispatch(app: &App, cli: &Cli) -> Result<()> {
    let json = cli.json;
    match &cli.command {
        Commands::Login { .. } | Commands::Logout => bail!("Login and logout do not need a session"),

        Commands::Status => status(app, json).await,

        Commands::Places {
            city,
            category,
            search,
            limit,
        } => {
            let filter = PlaceFilter {
                city: city.clone(),
                category: category.clone(),
                search: search.clone(),
                limit: *limit,
            };
            let places = app.repo().places(&filter).await?;
            if json {
                return output::print_json(&places);
            }
            output::print_places(&places);
            Ok(())
        }

        Commands::Place { id } => {
            let place = app.repo().place(*id).await?;
            if json {
                return output::print_json(&place);
            }
            output::print_place(&place);
            Ok(())
        }

        Commands::Popular { limit } => {
            let places = app.repo().popular(*limit).await?;
            if json {
                return output::print_json(&places);
            }
            output::print_places(&places);
            Ok(())
        }

        Commands::Nearby { lat, lng, radius } => {
            let places = app.repo().nearby(Coordinate::new(*lat, *lng), *radius).await?;
            if json {
                return output::print_json(&places);
            }
            output::print_places(&places);
            Ok(())
        }

        Commands::Routes { place } => {
            let routes = app.repo().routes(*place).await?;
            if json {
                return output::print_json(&routes);
            }
            output::print_routes(&routes);
            Ok(())
        }

        Commands::Route { id } => {
            let route = app.repo().route(*id).await?;
            if json {
                return output::print_json(&route);
            }
            output::print_route(&route);
            Ok(())
        }

        Commands::Itineraries => {
            let itineraries = app.repo().itineraries().await?;
            if json {
                return output::print_json(&itineraries);
            }
            output::print_itineraries(&itineraries);
            Ok(())
        }

        Commands::Itinerary { id } => {
            let itinerary = app.repo().itinerary(*id).await?;
            if json {
                return output::print_json(&itinerary);
            }
            output::print_itinerary(&itinerary);
            Ok(())
        }

        Commands::Favorites => {
            let favorites = app.repo().favorites().await?;
            if json {
                return output::print_json(&favorites);
            }
            output::print_favorites(&favorites);
            Ok(())
        }

        Commands::Visited => {
            let visits = app.repo().visited().await?;
            if json {
                return output::print_json(&visits);
            }
            output::print_visited(&visits);
            Ok(())
        }

        Commands::Favorite(FavoriteCommands::Add { place_id }) => {
            let outcome = app.repo().add_favorite(*place_id).await?;
            report_mutation(&outcome, "Added to favorites.");
            Ok(())
        }

        Commands::Favorite(FavoriteCommands::Remove { place_id }) => {
            let outcome = app.repo().remove_favorite(*place_id).await?;
            report_mutation(&outcome, "Removed from favorites.");
            Ok(())
        }

        Commands::Visit { place_id } => {
            let outcome = app.repo().mark_visited(*place_id).await?;
            report_mutation(&outcome, "Marked as visited.");
            Ok(())
        }

        Commands::Review {
            place_id,
            rating,
            comment,
        } => {
            let review = NewReview {
                place_id: *place_id,
                rating: *rating,
                comment: comment.clone(),
            };
            let outcome = app.repo().create_review(review).await?;
            report_mutation(&outcome, "Review posted.");
            Ok(())
        }

        Commands::Sync => match app.sync.sync_now().await {
            Some(report) => {
                println!(
                    "Replayed {} action(s), {} failed, {} still queued.",
                    report.replayed, report.failed, report.remaining
                );
                Ok(())
            }
            None => bail!("Offline: nothing was sent"),
        },

        Commands::Queue(QueueCommands::List) => {
            let pending = app.sync.queue().pending().await;
            if json {
                return output::print_json(&pending);
            }
            output::print_queue(&pending);
            Ok(())
        }

        Commands::Queue(QueueCommands::Clear) => {
            let count = app.sync.queue().len().await;
            app.sync.queue().clear().await?;
            println!("Discarded {} queued action(s).", count);
            Ok(())
        }

        Commands::Cache(CacheCommands::List) => {
            let cache = app.sync.cache();
            let entries = cache.entries().await?;
            let now = cache.now();
            if json {
                return output::print_json(&entries);
            }
            output::print_cache_entries(&entries, now);
            Ok(())
        }

        Commands::Cache(CacheCommands::Clear) => {
            let removed = app.repo().clear_cache().await?;
            println!("Removed {} cached resource(s).", removed);
            Ok(())
        }

        Commands::SaveOffline => {
            let report = app.repo().save_for_offline().await?;
            println!(
                "Saved {} places, {} routes, {} itineraries ({} with details), {} favorites, {} visited.",
                report.places,
                report.routes,
                report.itineraries,
                report.itinerary_details,
                report.favorites,
                report.visited
            );
            if !report.is_complete() {
                println!("Could not save: {}", report.failed.join(", "));
            }
            Ok(())
        }

        Commands::Watch => watch(app).await,
    }
}

async fn status(app: &App, json: bool) -> Result<()> {
    let online = app.sync.network().is_online();
    let queued = app.sync.queue().len().await;
    let cached = app.sync.cache().entries().await?.len();
    let session = app.session.data.as_ref();

    if json {
        return output::print_json(&json!({
            "online": online,
            "apiBaseUrl": app.config.api_base_url,
            "user": session.map(|s| s.username.as_str()),
            "sessionDaysLeft": session.map(|s| s.days_until_expiry()),
            "queued": queued,
            "cached": cached,
        }));
    }

    println!("Network:  {}", if online { "online" } else { "offline" });
    println!("Backend:  {}", app.config.api_base_url);
    match session {
        Some(s) => println!("User:     {} ({} days left)", s.username, s.days_until_expiry()),
        None => println!("User:     not logged in"),
    }
    println!("Queued:   {} action(s)", queued);
    println!("Cached:   {} resource(s)", cached);
    Ok(())
}

async fn watch(app: &App) -> Result<()> {
    let network = app.sync.network();
    let queue = app.sync.queue();

    let network_listener = network.subscribe(|online| {
        println!("Network is now {}", if online { "online" } else { "offline" });
    });
    let queue_listener = queue.subscribe(|len| println!("Queue length: {}", len));
    app.sync.start();

    println!(
        "Watching connectivity every {}s ({} queued). Press Ctrl-C to stop.",
        network.interval().as_secs(),
        queue.len().await
    );
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;

    app.sync.stop();
    queue.unsubscribe(queue_listener);
    network.unsubscribe(network_listener);
    Ok(())
}
