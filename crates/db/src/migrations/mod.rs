//! Database migrations.
//!
//! Schema migrations for the forum store. Written with the portable schema
//! builder so they run on both `PostgreSQL` and `SQLite`.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_user_table;
mod m20250101_000002_create_category_table;
mod m20250101_000003_create_post_table;
mod m20250101_000004_create_poll_tables;
mod m20250101_000005_create_petition_tables;
mod m20250101_000006_create_comment_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_user_table::Migration),
            Box::new(m20250101_000002_create_category_table::Migration),
            Box::new(m20250101_000003_create_post_table::Migration),
            Box::new(m20250101_000004_create_poll_tables::Migration),
            Box::new(m20250101_000005_create_petition_tables::Migration),
            Box::new(m20250101_000006_create_comment_tables::Migration),
        ]
    }
}
