use std::{io::Read, path::PathBuf};

use anyhow::Context;
use jiff::civil::Date;
use sea_orm::{ActiveValue, ConnectionTrait, EntityTrait, Set, TransactionTrait};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{db::Db, entities::movie};

/// Rows per `INSERT` statement; keeps the bound parameter count well under
/// SQLite's limit.
const INSERT_BATCH: usize = 500;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeedOutcome {
    AlreadyPopulated,
    Inserted(usize),
}

/// Loads the `movies` table from a CSV export.
#[derive(Clone, Debug)]
pub struct CsvSeeder {
    path: PathBuf,
}

impl CsvSeeder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn is_db_populated<C: ConnectionTrait>(db: &C) -> anyhow::Result<bool> {
        Ok(movie::Entity::find().one(db).await?.is_some())
    }

    /// Seeds only when the table is empty. The emptiness check is repeated
    /// inside the insert transaction, so concurrent callers seed at most once.
    pub async fn seed_if_empty(&self, db: &Db) -> anyhow::Result<SeedOutcome> {
        if Self::is_db_populated(db.conn()).await? {
            debug!(path = %self.path.display(), "movies already present, skipping seed");
            return Ok(SeedOutcome::AlreadyPopulated);
        }

        let records = self.load().await?;
        match insert_records(db, records, true).await? {
            Some(inserted) => {
                info!(path = %self.path.display(), inserted, "seeded movies");
                Ok(SeedOutcome::Inserted(inserted))
            },
            None => {
                debug!(path = %self.path.display(), "movies seeded concurrently, skipping");
                Ok(SeedOutcome::AlreadyPopulated)
            },
        }
    }

    /// Parses the whole file, then inserts every row in one transaction.
    pub async fn seed(&self, db: &Db) -> anyhow::Result<usize> {
        let records = self.load().await?;
        let inserted = insert_records(db, records, false).await?.unwrap_or_default();
        info!(path = %self.path.display(), inserted, "seeded movies");
        Ok(inserted)
    }

    async fn load(&self) -> anyhow::Result<Vec<MovieRecord>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&path)
                .with_context(|| format!("opening {}", path.display()))?;
            parse_records(file).with_context(|| format!("parsing {}", path.display()))
        })
        .await
        .context("CSV parser task panicked")?
    }
}

#[derive(Debug, Deserialize)]
struct MovieRecord {
    #[serde(default)]
    id: Option<i32>,
    #[serde(alias = "names")]
    name: String,
    #[serde(alias = "date_x")]
    date: String,
    score: f64,
    genre: String,
    overview: String,
    crew: String,
    orig_title: String,
    status: String,
    orig_lang: String,
    #[serde(alias = "budget_x")]
    budget: f64,
    revenue: f64,
    country: String,
}

impl MovieRecord {
    fn into_active_model(self) -> anyhow::Result<movie::ActiveModel> {
        let date = normalize_date(&self.date)
            .with_context(|| format!("invalid date {:?} for {:?}", self.date, self.name))?;
        Ok(movie::ActiveModel {
            id: self.id.map_or(ActiveValue::NotSet, Set),
            name: Set(self.name),
            date: Set(date),
            score: Set(self.score),
            genre: Set(self.genre),
            overview: Set(self.overview),
            crew: Set(self.crew),
            orig_title: Set(self.orig_title),
            status: Set(self.status),
            orig_lang: Set(self.orig_lang),
            budget: Set(self.budget),
            revenue: Set(self.revenue),
            country: Set(self.country),
        })
    }
}

fn parse_records<R: Read>(reader: R) -> anyhow::Result<Vec<MovieRecord>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for row in rdr.deserialize::<MovieRecord>() {
        records.push(row?);
    }

    let with_id = records.iter().filter(|r| r.id.is_some()).count();
    if with_id != 0 && with_id != records.len() {
        anyhow::bail!("id must be given for every row or for none ({with_id} of {})", records.len());
    }
    Ok(records)
}

/// Accepts `MM/DD/YYYY` (the export format) or ISO `YYYY-MM-DD`.
fn normalize_date(raw: &str) -> anyhow::Result<String> {
    let date = match Date::strptime("%m/%d/%Y", raw) {
        Ok(date) => date,
        Err(_) => raw.parse::<Date>()?,
    };
    Ok(date.to_string())
}

/// Inserts every record in one transaction. With `only_if_empty`, returns
/// `None` without writing when the table already has rows.
async fn insert_records(
    db: &Db,
    records: Vec<MovieRecord>,
    only_if_empty: bool,
) -> anyhow::Result<Option<usize>> {
    let models = records
        .into_iter()
        .map(MovieRecord::into_active_model)
        .collect::<anyhow::Result<Vec<_>>>()?;

    let txn = db.conn().begin().await?;
    if only_if_empty && CsvSeeder::is_db_populated(&txn).await? {
        txn.rollback().await?;
        return Ok(None);
    }
    for batch in models.chunks(INSERT_BATCH) {
        movie::Entity::insert_many(batch.to_vec()).exec(&txn).await?;
    }
    txn.commit().await?;

    Ok(Some(models.len()))
}

#[cfg(test)]
pub(crate) const FIXTURE_CSV: &str =
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/movies.csv");
