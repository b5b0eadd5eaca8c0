use sqlx::Row;

use crate::db::{to_count, Store, StoreError};
use crate::planning::{LearningResource, MediaType, SkillProfile};

pub async fn list_resources(store: &Store) -> Result<Vec<LearningResource>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT "id", "title", "mediaType", "language", "wordCount"
        FROM "learning_resources"
        ORDER BY "id"
        "#,
    )
    .fetch_all(store.pool())
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let media: String = row.try_get("mediaType")?;
        let media_type = MediaType::parse(&media)
            .ok_or_else(|| StoreError::Serialization(format!("unknown media type {media}")))?;
        out.push(LearningResource {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            media_type,
            language: row.try_get("language")?,
            word_count: to_count(row.try_get("wordCount")?),
        });
    }

    Ok(out)
}

pub async fn upsert_resource(store: &Store, resource: &LearningResource) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO "learning_resources" ("id", "title", "mediaType", "language", "wordCount")
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT ("id") DO UPDATE SET
            "title" = excluded."title",
            "mediaType" = excluded."mediaType",
            "language" = excluded."language",
            "wordCount" = excluded."wordCount"
        "#,
    )
    .bind(&resource.id)
    .bind(&resource.title)
    .bind(resource.media_type.as_str())
    .bind(&resource.language)
    .bind(i64::from(resource.word_count))
    .execute(store.pool())
    .await?;

    Ok(())
}

pub async fn list_skills(store: &Store) -> Result<Vec<SkillProfile>, StoreError> {
    let rows = sqlx::query(
        r#"SELECT "id", "title", "language" FROM "learning_skills" ORDER BY "id""#,
    )
    .fetch_all(store.pool())
    .await?;

    rows.iter()
        .map(|row| -> Result<SkillProfile, StoreError> {
            Ok(SkillProfile {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                language: row.try_get("language")?,
            })
        })
        .collect()
}

pub async fn upsert_skill(store: &Store, skill: &SkillProfile) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO "learning_skills" ("id", "title", "language")
        VALUES (?, ?, ?)
        ON CONFLICT ("id") DO UPDATE SET
            "title" = excluded."title",
            "language" = excluded."language"
        "#,
    )
    .bind(&skill.id)
    .bind(&skill.title)
    .bind(&skill.language)
    .execute(store.pool())
    .await?;

    Ok(())
}
