//! Provisioning Tests

mod common;

use rk_authz::{Application, ProvisionReport, Provisioner};
use rk_config::{ProvisioningConfig, ResourceTypeSeed, RoleSeed, ScopeSeed};

use common::{organization, role, scope, scope_names, setup};

fn team_config() -> ProvisioningConfig {
    ProvisioningConfig {
        enabled: true,
        resource_types: vec![ResourceTypeSeed {
            name: "identity/team".to_string(),
            description: Some("A team inside an organization".to_string()),
            scopes: vec![ScopeSeed::new("join"), ScopeSeed::new("manage")],
            roles: vec![
                RoleSeed {
                    name: "lead".to_string(),
                    scopes: vec!["join".to_string(), "manage".to_string()],
                },
                RoleSeed {
                    name: "member".to_string(),
                    scopes: vec!["join".to_string()],
                },
            ],
        }],
    }
}

#[tokio::test]
async fn test_default_config_creates_organization_owner() {
    let t = setup().await;

    let report = Provisioner::provision(&t.db, &ProvisioningConfig::default())
        .await
        .unwrap();
    assert_eq!(
        report,
        ProvisionReport {
            resource_types: 1,
            scopes: 2,
            roles: 1,
            grants: 2,
        }
    );

    let owner = t.db.roles().lookup("owner", "identity/organization").await.unwrap();
    let scopes = t.db.roles().list_scopes(&owner).await.unwrap();
    assert_eq!(scope_names(&scopes), vec!["manage", "view"]);
}

#[tokio::test]
async fn test_provisioning_twice_creates_once() {
    let t = setup().await;
    let config = team_config();

    let first = Provisioner::provision(&t.db, &config).await.unwrap();
    assert_eq!(first.roles, 2);
    assert_eq!(first.grants, 3);

    let second = Provisioner::provision(&t.db, &config).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(t.db.roles().list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_existing_records_are_completed() {
    let t = setup().await;
    let org = organization(&t.db).await;
    let manage = scope(&t.db, &org, "manage").await;
    let owner = role(&t.db, &org, "owner").await;
    t.db.roles().add_scope(&owner, &manage).await.unwrap();

    let report = Provisioner::provision(&t.db, &ProvisioningConfig::default())
        .await
        .unwrap();
    assert_eq!(
        report,
        ProvisionReport {
            resource_types: 0,
            scopes: 1,
            roles: 0,
            grants: 1,
        }
    );

    let scopes = t.db.roles().list_scopes(&owner).await.unwrap();
    assert_eq!(scope_names(&scopes), vec!["manage", "view"]);
}

#[tokio::test]
async fn test_disabled_provisioning_does_nothing() {
    let t = setup().await;
    let mut config = ProvisioningConfig::default();
    config.enabled = false;

    let report = Provisioner::provision(&t.db, &config).await.unwrap();
    assert!(report.is_empty());
    assert!(t.db.resource_types().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failure_keeps_nothing() {
    let t = setup().await;
    let mut config = team_config();
    config.resource_types[0].roles[1].scopes.push("archive".to_string());

    let err = Provisioner::provision(&t.db, &config).await.unwrap_err();
    assert!(err.to_string().contains("archive"));

    assert!(t.db.resource_types().list().await.unwrap().is_empty());
    assert!(t.db.roles().list().await.unwrap().is_empty());

    // The failed run released its transaction.
    let report = Provisioner::provision(&t.db, &team_config()).await.unwrap();
    assert_eq!(report.resource_types, 1);
    assert_eq!(report.grants, 3);
}

#[tokio::test]
async fn test_provision_in_leaves_the_decision_to_the_caller() {
    let t = setup().await;

    let tx = t.db.begin_transaction().await.unwrap();
    let report = Provisioner::provision_in(&tx, &team_config()).await.unwrap();
    assert_eq!(report.resource_types, 1);
    assert_eq!(tx.roles().list().await.unwrap().len(), 2);
    tx.rollback().await.unwrap();

    assert!(t.db.roles().list().await.unwrap().is_empty());
}
