pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20260214_000001_engagement_tables;
mod m20260215_000001_tracking_references;
mod m20260218_000001_event_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260214_000001_engagement_tables::Migration),
            Box::new(m20260215_000001_tracking_references::Migration),
            Box::new(m20260218_000001_event_indexes::Migration),
        ]
    }
}
