use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(pk_auto(Movies::Id))
                    .col(string(Movies::Name))
                    .col(string(Movies::Date))
                    .col(double(Movies::Score))
                    .col(string(Movies::Genre))
                    .col(text(Movies::Overview))
                    .col(text(Movies::Crew))
                    .col(string(Movies::OrigTitle))
                    .col(string(Movies::Status))
                    .col(string(Movies::OrigLang))
                    .col(double(Movies::Budget))
                    .col(double(Movies::Revenue))
                    .col(string(Movies::Country))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Id,
    Name,
    Date,
    Score,
    Genre,
    Overview,
    Crew,
    OrigTitle,
    Status,
    OrigLang,
    Budget,
    Revenue,
    Country,
}
