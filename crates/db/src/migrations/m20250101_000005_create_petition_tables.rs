//! Create petition and petition_signature tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Petition::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Petition::PostId)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Petition::Target).string_len(200).not_null())
                    .col(ColumnDef::new(Petition::Goal).integer().not_null())
                    .col(
                        ColumnDef::new(Petition::Signatures)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Petition::Deadline)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Petition::IsSuccessful)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Petition::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_petition_post")
                            .from(Petition::Table, Petition::PostId)
                            .to(Post::Table, Post::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One signature per (petition, user)
        manager
            .create_table(
                Table::create()
                    .table(PetitionSignature::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PetitionSignature::PostId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PetitionSignature::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PetitionSignature::Comment).text().null())
                    .col(
                        ColumnDef::new(PetitionSignature::IsAnonymous)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PetitionSignature::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(PetitionSignature::PostId)
                            .col(PetitionSignature::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_petition_signature_petition")
                            .from(PetitionSignature::Table, PetitionSignature::PostId)
                            .to(Petition::Table, Petition::PostId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_petition_signature_user")
                            .from(PetitionSignature::Table, PetitionSignature::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (post_id, created_at) - newest-first signature listing
        manager
            .create_index(
                Index::create()
                    .name("idx_petition_signature_post_created_at")
                    .table(PetitionSignature::Table)
                    .col(PetitionSignature::PostId)
                    .col(PetitionSignature::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PetitionSignature::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Petition::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Petition {
    Table,
    PostId,
    Target,
    Goal,
    Signatures,
    Deadline,
    IsSuccessful,
    CreatedAt,
}

#[derive(Iden)]
enum PetitionSignature {
    Table,
    PostId,
    UserId,
    Comment,
    IsAnonymous,
    CreatedAt,
}

#[derive(Iden)]
enum Post {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
