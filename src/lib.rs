pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod extract;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod seeder;

use crate::db::Db;

pub struct AppState {
    pub db: Db,
}
