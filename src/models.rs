use serde::{Deserialize, Serialize};

use crate::entities::movie;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovieDetail {
    pub id: i32,
    pub name: String,
    pub date: String,
    pub score: f64,
    pub genre: String,
    pub overview: String,
    pub crew: String,
    pub orig_title: String,
    pub status: String,
    pub orig_lang: String,
    pub budget: f64,
    pub revenue: f64,
    pub country: String,
}

impl From<movie::Model> for MovieDetail {
    fn from(m: movie::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            date: m.date,
            score: m.score,
            genre: m.genre,
            overview: m.overview,
            crew: m.crew,
            orig_title: m.orig_title,
            status: m.status,
            orig_lang: m.orig_lang,
            budget: m.budget,
            revenue: m.revenue,
            country: m.country,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovieList {
    pub movies: Vec<MovieDetail>,
    pub prev_page: Option<String>,
    pub next_page: Option<String>,
    pub total_pages: u64,
    pub total_items: u64,
}
