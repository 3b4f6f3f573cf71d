//! Database Integration Tests
//!
//! Run against a live `PostgreSQL`; `sqlx::test` provisions a fresh
//! database per test and applies the migrations.

#[cfg(test)]
mod postgres_tests {
    use super::super::*;
    use crate::permissions::ClubRole;
    use sqlx::PgPool;

    // ========================================================================
    // User Tests
    // ========================================================================

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_create_and_find_user(pool: PgPool) {
        let user = create_user(&pool, "testuser", "Test User", "Test@Example.com", "hash")
            .await
            .expect("Failed to create user");

        assert_eq!(user.username, "testuser");
        assert!(!user.is_superuser);

        let found = find_user_by_id(&pool, user.id)
            .await
            .expect("Query failed")
            .expect("User not found");
        assert_eq!(found.username, "testuser");

        // Email lookup ignores case
        let found = find_user_by_email(&pool, "test@example.com")
            .await
            .expect("Query failed")
            .expect("User not found");
        assert_eq!(found.id, user.id);

        assert!(username_exists(&pool, "testuser").await.unwrap());
        assert!(email_exists(&pool, "TEST@example.com").await.unwrap());
    }

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_username_uniqueness(pool: PgPool) {
        create_user(&pool, "dup", "A", "a@example.com", "hash")
            .await
            .expect("First user should be created");
        let result = create_user(&pool, "dup", "B", "b@example.com", "hash").await;
        assert!(result.is_err(), "Duplicate username should fail");
    }

    // ========================================================================
    // Membership Tests
    // ========================================================================

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_roster_ordered_by_role(pool: PgPool) {
        let owner = create_user(&pool, "owner", "Zed", "owner@example.com", "hash")
            .await
            .unwrap();
        let member = create_user(&pool, "member", "Amy", "member@example.com", "hash")
            .await
            .unwrap();

        let (club_id,): (uuid::Uuid,) = sqlx::query_as(
            "INSERT INTO clubs (code, name, approved) VALUES ('chess', 'Chess', TRUE) RETURNING id",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        for (user_id, role) in [(member.id, ClubRole::Member), (owner.id, ClubRole::Owner)] {
            sqlx::query("INSERT INTO memberships (club_id, user_id, role) VALUES ($1, $2, $3)")
                .bind(club_id)
                .bind(user_id)
                .bind(role)
                .execute(&pool)
                .await
                .unwrap();
        }

        let roster = list_members(&pool, club_id).await.unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].username, "owner");
        assert_eq!(roster[0].role, ClubRole::Owner);

        let emails = member_emails(&pool, club_id).await.unwrap();
        assert!(emails.contains(&"member@example.com".to_string()));

        let found = find_member(&pool, club_id, "member").await.unwrap().unwrap();
        assert_eq!(found.role, ClubRole::Member);
        assert_eq!(found.title, "Member");
    }

    #[sqlx::test]
    #[ignore] // Requires PostgreSQL
    async fn test_one_membership_per_user_and_club(pool: PgPool) {
        let user = create_user(&pool, "solo", "Solo", "solo@example.com", "hash")
            .await
            .unwrap();
        let (club_id,): (uuid::Uuid,) =
            sqlx::query_as("INSERT INTO clubs (code, name) VALUES ('go', 'Go') RETURNING id")
                .fetch_one(&pool)
                .await
                .unwrap();

        let insert = "INSERT INTO memberships (club_id, user_id) VALUES ($1, $2)";
        sqlx::query(insert)
            .bind(club_id)
            .bind(user.id)
            .execute(&pool)
            .await
            .unwrap();
        let second = sqlx::query(insert)
            .bind(club_id)
            .bind(user.id)
            .execute(&pool)
            .await;
        assert!(second.is_err(), "Second membership should violate uniqueness");
    }
}
