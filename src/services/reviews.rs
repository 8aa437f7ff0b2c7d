use chrono::Utc;
use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::Track;
use crate::core::{DataSphereError, Result};
use crate::services::progress::{track_progress_percentage, UserProgress};
use crate::services::storage::{reviews_key, ClientStore};

const AUTHORS: [(&str, &str, &str); 6] = [
    (
        "Sarah M.",
        "Casablanca",
        "Excellent cours, très clair et pratique. J'ai pu appliquer les concepts dès le lendemain.",
    ),
    (
        "Karim B.",
        "Rabat",
        "La pédagogie est top. Les exemples sont pertinents pour le marché marocain.",
    ),
    (
        "Youssef T.",
        "Tanger",
        "Un peu dense par moments, mais la qualité est au rendez-vous. Je recommande.",
    ),
    (
        "Amina L.",
        "Marrakech",
        "La meilleure ressource francophone que j'ai trouvée sur ce sujet. Merci !",
    ),
    (
        "Thomas D.",
        "Paris",
        "Très structuré. Les quiz aident vraiment à valider les acquis.",
    ),
    (
        "Sofia E.",
        "Lyon",
        "J'ai adoré l'approche concrète. Pas de blabla inutile.",
    ),
];

/// Number of reviews shown on a track page
pub const DISPLAYED_REVIEWS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: String,
    pub author: String,
    pub city: String,
    pub date: String,
    pub rating: u8,
    pub comment: String,
}

/// Testimonials shown for every track
pub fn generate_reviews<R: Rng>(track_id: &str, rng: &mut R) -> Vec<Review> {
    AUTHORS
        .iter()
        .enumerate()
        .map(|(i, (author, city, comment))| Review {
            id: format!("{}-rev-{}", track_id, i),
            author: author.to_string(),
            city: city.to_string(),
            date: format!("Il y a {} jours", rng.gen_range(1..=10)),
            rating: if i == 2 { 4 } else { 5 },
            comment: comment.to_string(),
        })
        .collect()
}

fn stored_reviews(store: &ClientStore, track_id: &str) -> Vec<Review> {
    match store.get_json::<Vec<Review>>(&reviews_key(track_id)) {
        Ok(reviews) => reviews.unwrap_or_default(),
        Err(e) => {
            warn!("Ignoring unreadable reviews for {}: {}", track_id, e);
            Vec::new()
        }
    }
}

/// Visitor reviews, newest first, followed by the generated ones
pub fn list_reviews<R: Rng>(store: &ClientStore, track_id: &str, rng: &mut R) -> Vec<Review> {
    let mut reviews = stored_reviews(store, track_id);
    reviews.extend(generate_reviews(track_id, rng));
    reviews
}

/// Reviews open only once every lesson of the track is completed
pub fn reviews_locked(track: &Track, progress: &UserProgress) -> bool {
    track_progress_percentage(track, progress) < 100
}

pub fn add_review(
    store: &ClientStore,
    track: &Track,
    progress: &UserProgress,
    rating: u8,
    comment: &str,
) -> Result<Review> {
    if reviews_locked(track, progress) {
        return Err(DataSphereError::ValidationError(
            "Terminez le cours pour laisser un avis".to_string(),
        ));
    }
    if !(1..=5).contains(&rating) {
        return Err(DataSphereError::ValidationError(
            "La note doit être comprise entre 1 et 5.".to_string(),
        ));
    }
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(DataSphereError::ValidationError(
            "Le commentaire est requis.".to_string(),
        ));
    }

    let review = Review {
        id: Utc::now().timestamp_millis().to_string(),
        author: "Vous (Apprenant)".to_string(),
        city: "Maroc".to_string(),
        date: "À l'instant".to_string(),
        rating,
        comment: comment.to_string(),
    };

    let mut reviews = stored_reviews(store, &track.id);
    reviews.insert(0, review.clone());
    store.set_json(&reviews_key(&track.id), &reviews)?;

    info!("New {}-star review for {}", rating, track.id);
    Ok(review)
}

/// Mean rating rounded to one decimal
pub fn average_rating(reviews: &[Review]) -> f64 {
    let sum: u32 = reviews.iter().map(|r| r.rating as u32).sum();
    let mean = sum as f64 / reviews.len().max(1) as f64;
    (mean * 10.0).round() / 10.0
}
