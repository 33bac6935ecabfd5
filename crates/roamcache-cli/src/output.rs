//! Terminal rendering for command results.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use roamcache_core::cache::CacheEntryInfo;
use roamcache_core::models::{Favorite, Itinerary, Place, Route, Visit};
use roamcache_core::queue::QueuedAction;
use roamcache_core::utils::{format_distance, format_rating, truncate_string};

/// Column widths
const NAME_WIDTH: usize = 32;
const LOCATION_WIDTH: usize = 24;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn print_places(places: &[Place]) {
    if places.is_empty() {
        println!("No places found.");
        return;
    }
    for place in places {
        let distance = place.distance.map(format_distance).unwrap_or_default();
        println!(
            "{:>6}  {:<name$}  {:<loc$}  {:>7}  {}",
            place.id,
            truncate_string(&place.name, NAME_WIDTH),
            truncate_string(&place.location_display(), LOCATION_WIDTH),
            format_rating(place.rating),
            distance,
            name = NAME_WIDTH,
            loc = LOCATION_WIDTH,
        );
    }
}

pub fn print_place(place: &Place) {
    println!("{} (#{})", place.name, place.id);
    let location = place.location_display();
    if !location.is_empty() {
        println!("  Location: {}", location);
    }
    if let Some(ref category) = place.category {
        println!("  Category: {}", category);
    }
    match place.review_count {
        Some(count) => println!("  Rating:   {} ({} reviews)", format_rating(place.rating), count),
        None => println!("  Rating:   {}", format_rating(place.rating)),
    }
    println!("  Position: {:.5}, {:.5}", place.latitude, place.longitude);
    if let Some(ref description) = place.description {
        println!();
        println!("{}", description);
    }
}

pub fn print_routes(routes: &[Route]) {
    if routes.is_empty() {
        println!("No routes found.");
        return;
    }
    for route in routes {
        println!(
            "{:>6}  {:<name$}  {:>3} stops  {:>8}  {}",
            route.id,
            truncate_string(&route.name, NAME_WIDTH),
            route.stop_count(),
            route.duration_display(),
            route.distance_km.map(format_distance).unwrap_or_default(),
            name = NAME_WIDTH,
        );
    }
}

pub fn print_route(route: &Route) {
    println!("{} (#{})", route.name, route.id);
    if let Some(ref city) = route.city {
        println!("  City:     {}", city);
    }
    println!("  Duration: {}", route.duration_display());
    if let Some(km) = route.distance_km {
        println!("  Distance: {}", format_distance(km));
    }
    let stops: Vec<String> = route.place_ids.iter().map(|id| format!("#{}", id)).collect();
    println!("  Stops:    {}", stops.join(" -> "));
    if let Some(ref description) = route.description {
        println!();
        println!("{}", description);
    }
}

pub fn print_itineraries(itineraries: &[Itinerary]) {
    if itineraries.is_empty() {
        println!("No itineraries saved.");
        return;
    }
    for itinerary in itineraries {
        println!(
            "{:>6}  {:<name$}  {}",
            itinerary.id,
            truncate_string(&itinerary.title, NAME_WIDTH),
            itinerary.summary(),
            name = NAME_WIDTH,
        );
    }
}

pub fn print_itinerary(itinerary: &Itinerary) {
    println!("{} (#{})", itinerary.title, itinerary.id);
    let summary = itinerary.summary();
    if !summary.is_empty() {
        println!("  {}", summary);
    }
    if let Some(created) = itinerary.created_at {
        println!("  Created {}", local_time(created));
    }
    if let Some(ref content) = itinerary.content {
        println!();
        println!("{}", content);
    }
}

fn place_label(place_id: i64, place: Option<&Place>) -> String {
    match place {
        Some(place) => format!("{:>6}  {}", place_id, truncate_string(&place.name, NAME_WIDTH)),
        None => format!("{:>6}", place_id),
    }
}

pub fn print_favorites(favorites: &[Favorite]) {
    if favorites.is_empty() {
        println!("No favorites yet.");
        return;
    }
    for favorite in favorites {
        println!("{}", place_label(favorite.place_id, favorite.place.as_ref()));
    }
}

pub fn print_visited(visits: &[Visit]) {
    if visits.is_empty() {
        println!("No visited places yet.");
        return;
    }
    for visit in visits {
        let when = visit.visited_at.map(local_time).unwrap_or_default();
        println!("{}  {}", place_label(visit.place_id, visit.place.as_ref()), when);
    }
}

pub fn print_queue(actions: &[QueuedAction]) {
    if actions.is_empty() {
        println!("Offline queue is empty.");
        return;
    }
    for queued in actions {
        println!(
            "{:<24}  {:<16}  place #{:<6}  {}",
            queued.id,
            queued.kind().as_str(),
            queued.action.place_id(),
            local_time(queued.created_at),
        );
    }
}

pub fn print_cache_entries(entries: &[CacheEntryInfo], now: DateTime<Utc>) {
    if entries.is_empty() {
        println!("Cache is empty.");
        return;
    }
    for entry in entries {
        println!(
            "{:<12}  {:<36}  {:>8}",
            entry.kind.as_str(),
            truncate_string(&entry.id, 36),
            entry.expires_display(now),
        );
    }
}
