//! Unit of Work Tests
//!
//! Tests for:
//! - Visibility before and after commit
//! - Rollback, explicit and on drop
//! - The transactional helper
//! - Repositories outliving their transaction

mod common;

use rk_authz::{Application, AuthzError, Role};

use common::{organization, role, scope, scope_names, setup};

#[tokio::test]
async fn test_commit_makes_writes_visible() {
    let t = setup().await;
    let org = organization(&t.db).await;
    let manage = scope(&t.db, &org, "manage").await;

    let tx = t.db.begin_transaction().await.unwrap();
    let owner = role(&tx, &org, "owner").await;
    tx.roles().add_scope(&owner, &manage).await.unwrap();

    // Visible inside the transaction, not outside it.
    assert_eq!(tx.roles().load(owner.role_id).await.unwrap().name, "owner");
    assert_eq!(scope_names(&tx.roles().list_scopes(&owner).await.unwrap()), vec!["manage"]);
    assert!(t.db.roles().load(owner.role_id).await.unwrap_err().is_not_found());

    tx.commit().await.unwrap();

    let loaded = t.db.roles().load(owner.role_id).await.unwrap();
    assert_eq!(loaded.name, "owner");
    let scopes = t.db.roles().list_scopes(&loaded).await.unwrap();
    assert_eq!(scope_names(&scopes), vec!["manage"]);
}

#[tokio::test]
async fn test_rollback_discards_role_and_grant() {
    let t = setup().await;
    let org = organization(&t.db).await;
    let manage = scope(&t.db, &org, "manage").await;

    let tx = t.db.begin_transaction().await.unwrap();
    let owner = role(&tx, &org, "owner").await;
    tx.roles().add_scope(&owner, &manage).await.unwrap();
    tx.rollback().await.unwrap();

    assert!(t.db.roles().load(owner.role_id).await.unwrap_err().is_not_found());
    assert!(t.db.roles().list().await.unwrap().is_empty());
    assert!(t.db.roles().list_scopes(&owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dropped_transaction_rolls_back() {
    let t = setup().await;
    let org = organization(&t.db).await;

    let owner = {
        let tx = t.db.begin_transaction().await.unwrap();
        role(&tx, &org, "owner").await
    };

    assert!(t.db.roles().exists(owner.role_id).await.unwrap_err().is_not_found());
    assert!(t.db.roles().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_repositories_fail_after_completion() {
    let t = setup().await;
    let org = organization(&t.db).await;

    let tx = t.db.begin_transaction().await.unwrap();
    let roles = tx.roles();
    let owner = role(&tx, &org, "owner").await;
    tx.commit().await.unwrap();

    let err = roles.load(owner.role_id).await.unwrap_err();
    assert!(matches!(err, AuthzError::Internal { .. }));
    assert!(err.to_string().contains("transaction already completed"));

    let mut viewer = Role::new(&org, "viewer");
    assert!(roles.create(&mut viewer).await.is_err());
}

#[tokio::test]
async fn test_transactional_commits_on_ok() {
    let t = setup().await;
    let org = organization(&t.db).await;

    let org_for_tx = org.clone();
    let owner = t
        .db
        .transactional(move |tx| {
            Box::pin(async move {
                let mut owner = Role::new(&org_for_tx, "owner");
                tx.roles().create(&mut owner).await?;
                Ok(owner)
            })
        })
        .await
        .unwrap();

    let loaded = t.db.roles().lookup("owner", "identity/organization").await.unwrap();
    assert_eq!(loaded.role_id, owner.role_id);
}

#[tokio::test]
async fn test_transactional_rolls_back_on_err() {
    let t = setup().await;
    let org = organization(&t.db).await;

    let org_for_tx = org.clone();
    let result: Result<(), AuthzError> = t
        .db
        .transactional(move |tx| {
            Box::pin(async move {
                let mut owner = Role::new(&org_for_tx, "owner");
                tx.roles().create(&mut owner).await?;
                // Second create with the same name violates the live-name index.
                let mut duplicate = Role::new(&org_for_tx, "owner");
                tx.roles().create(&mut duplicate).await?;
                Ok(())
            })
        })
        .await;

    assert!(result.unwrap_err().is_unique_violation());
    assert!(t.db.roles().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_repositories_of_one_transaction_share_it() {
    let t = setup().await;

    let tx = t.db.begin_transaction().await.unwrap();
    let org = organization(&tx).await;
    let manage = scope(&tx, &org, "manage").await;
    let owner = role(&tx, &org, "owner").await;
    tx.roles().add_scope(&owner, &manage).await.unwrap();

    let found = tx
        .resource_type_scopes()
        .lookup("identity/organization", "manage")
        .await
        .unwrap();
    assert_eq!(found.resource_type_scope_id, manage.resource_type_scope_id);

    tx.commit().await.unwrap();
    assert_eq!(t.db.resource_types().list().await.unwrap().len(), 1);
}
