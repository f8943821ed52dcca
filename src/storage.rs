use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::types::{Item, Result, Source};

/// Persistence contract for sources, as the poll job consumes it.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn list_active(&self) -> Result<Vec<Source>>;
    async fn upsert(&self, source: &Source) -> Result<()>;
}

/// Persistence contract for items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn upsert(&self, item: &Item) -> Result<()>;
}

pub struct PgSourceStore {
    db: PgPool,
}

impl PgSourceStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get(&self, url: &str) -> Result<Option<Source>> {
        let row = sqlx::query(
            "SELECT url, title, active, created, modified, published FROM sources WHERE url = $1",
        )
        .bind(url)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(source_from_row).transpose()
    }

    /// Registers a new source with an epoch watermark, so the first poll run
    /// sees every item as new. Existing sources are left untouched.
    pub async fn add(&self, url: &str, title: &str) -> Result<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sources (url, title, active, created, modified, published)
            VALUES ($1, $2, TRUE, $3, $3, $4)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(url)
        .bind(title)
        .bind(now)
        .bind(DateTime::<Utc>::UNIX_EPOCH)
        .execute(&self.db)
        .await?;

        info!("Added source: {}", url);
        Ok(())
    }

    pub async fn delete(&self, urls: &[String]) -> Result<()> {
        sqlx::query("DELETE FROM sources WHERE url = ANY($1)")
            .bind(urls)
            .execute(&self.db)
            .await?;

        info!("Deleted {} sources", urls.len());
        Ok(())
    }

    pub async fn activate(&self, urls: &[String], active: bool) -> Result<()> {
        sqlx::query("UPDATE sources SET active = $1, modified = $2 WHERE url = ANY($3)")
            .bind(active)
            .bind(Utc::now())
            .bind(urls)
            .execute(&self.db)
            .await?;

        debug!("Set active = {} on {} sources", active, urls.len());
        Ok(())
    }
}

#[async_trait]
impl SourceStore for PgSourceStore {
    async fn list_active(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query(
            "SELECT url, title, active, created, modified, published FROM sources WHERE active = TRUE ORDER BY created",
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(source_from_row).collect()
    }

    async fn upsert(&self, source: &Source) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sources (url, title, active, created, modified, published)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (url) DO UPDATE SET
                title = EXCLUDED.title,
                published = EXCLUDED.published,
                modified = EXCLUDED.modified,
                active = EXCLUDED.active
            "#,
        )
        .bind(&source.url)
        .bind(&source.title)
        .bind(source.active)
        .bind(source.created)
        .bind(source.modified)
        .bind(source.published)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

pub struct PgItemStore {
    db: PgPool,
}

impl PgItemStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Items published after `after`, newest first.
    pub async fn list_after(&self, after: DateTime<Utc>) -> Result<Vec<Item>> {
        let rows = sqlx::query(
            r#"
            SELECT link, resource_id, title, description, content, author, image, created, published
            FROM items
            WHERE published > $1
            ORDER BY published DESC
            "#,
        )
        .bind(after)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(item_from_row).collect()
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn upsert(&self, item: &Item) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO items (link, resource_id, title, description, content, author, image, created, published)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (link) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                content = EXCLUDED.content,
                author = EXCLUDED.author,
                image = EXCLUDED.image,
                published = EXCLUDED.published
            "#,
        )
        .bind(&item.link)
        .bind(&item.resource_id)
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.content)
        .bind(&item.author)
        .bind(&item.image)
        .bind(item.created)
        .bind(item.published)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

fn source_from_row(row: &PgRow) -> Result<Source> {
    Ok(Source {
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        active: row.try_get("active")?,
        created: row.try_get("created")?,
        modified: row.try_get("modified")?,
        published: row.try_get("published")?,
    })
}

fn item_from_row(row: &PgRow) -> Result<Item> {
    Ok(Item {
        link: row.try_get("link")?,
        resource_id: row.try_get("resource_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        content: row.try_get("content")?,
        author: row.try_get("author")?,
        image: row.try_get("image")?,
        created: row.try_get("created")?,
        published: row.try_get("published")?,
    })
}
