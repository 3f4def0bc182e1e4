//! Workspace lifecycle integration tests

mod common;

use common::{perm, subject, TestServicesBuilder};
use pretty_assertions::assert_eq;
use workspace_acl::config::roles::{ROLE_ADMINISTRATOR, ROLE_DEVELOPER, ROLE_VIEWER};
use workspace_acl::domain::{CreateWorkspaceInput, ResourceKind, UpdateWorkspaceInput};
use workspace_acl::error::AppError;

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_sets_slug_email_and_links_owner() {
    let builder = TestServicesBuilder::new();
    builder.seed_user("alice@example.com", true).await;
    let service = builder.build_workspace_service();

    let workspace = service
        .create(
            CreateWorkspaceInput {
                name: "Really good org".to_string(),
                domain: Some("example.com".to_string()),
                website: Some("https://example.com".to_string()),
            },
            "alice@example.com",
        )
        .await
        .unwrap();

    assert_eq!(workspace.slug, "really-good-org");
    assert_eq!(workspace.email, Some(subject("alice@example.com")));
    assert!(!workspace.is_auto_generated);
    assert_eq!(workspace.members.len(), 1);
    assert_eq!(workspace.members[0].role, ROLE_ADMINISTRATOR);

    let user = builder.user("alice@example.com").await.unwrap();
    assert!(user.workspace_ids.contains(&workspace.id));
}

#[tokio::test]
async fn test_create_allows_duplicate_names() {
    let builder = TestServicesBuilder::new();
    let first = builder.create_workspace("alice@example.com").await;
    let second = builder.create_workspace("alice@example.com").await;

    assert_ne!(first.id, second.id);
    assert_eq!(first.slug, second.slug);
    assert_eq!(
        builder
            .user("alice@example.com")
            .await
            .unwrap()
            .workspace_ids
            .len(),
        2
    );
}

#[tokio::test]
async fn test_create_default_workspace() {
    let builder = TestServicesBuilder::new();
    builder.seed_user("api_user", true).await;
    let service = builder.build_workspace_service();

    let workspace = service.create_default("api_user").await.unwrap();
    assert_eq!(workspace.name, "api_user's apps");
    assert!(workspace.is_auto_generated);
}

#[tokio::test]
async fn test_create_requires_existing_owner() {
    let builder = TestServicesBuilder::new();
    let service = builder.build_workspace_service();

    let result = service
        .create(
            CreateWorkspaceInput {
                name: "Orphan".to_string(),
                ..Default::default()
            },
            "nobody@example.com",
        )
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_create_rejects_blank_name() {
    let builder = TestServicesBuilder::new();
    builder.seed_user("alice@example.com", true).await;
    let service = builder.build_workspace_service();

    let result = service
        .create(
            CreateWorkspaceInput {
                name: "   ".to_string(),
                ..Default::default()
            },
            "alice@example.com",
        )
        .await;
    assert!(matches!(result, Err(AppError::InvalidParameter(_))));
}

// ============================================================================
// Update
// ============================================================================

#[tokio::test]
async fn test_update_name_moves_slug_not_policies() {
    let builder = TestServicesBuilder::new();
    let workspace = builder.create_workspace("alice@example.com").await;
    let service = builder.build_workspace_service();

    let updated = service
        .update(
            workspace.id,
            UpdateWorkspaceInput {
                name: Some("New Name".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "New Name");
    assert_eq!(updated.slug, "new-name");
    assert_eq!(updated.policies, workspace.policies);
    assert_eq!(updated.version, workspace.version + 1);
}

#[tokio::test]
async fn test_update_only_domain() {
    let builder = TestServicesBuilder::new();
    let workspace = builder.create_workspace("alice@example.com").await;
    let service = builder.build_workspace_service();

    let updated = service
        .update(
            workspace.id,
            UpdateWorkspaceInput {
                domain: Some("abc.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, workspace.name);
    assert_eq!(updated.domain.as_deref(), Some("abc.com"));
}

#[tokio::test]
async fn test_update_rejects_empty_name() {
    let builder = TestServicesBuilder::new();
    let workspace = builder.create_workspace("alice@example.com").await;
    let service = builder.build_workspace_service();

    let result = service
        .update(
            workspace.id,
            UpdateWorkspaceInput {
                name: Some(" ".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::InvalidParameter(_))));
    assert_eq!(builder.workspace(workspace.id).await.name, "Test Workspace");
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_requires_manage_permission() {
    let builder = TestServicesBuilder::new();
    let workspace = builder.create_workspace("alice@example.com").await;
    builder
        .build_membership_service()
        .add_or_invite_member(workspace.id, "bob@example.com", ROLE_DEVELOPER)
        .await
        .unwrap();

    let service = builder.build_workspace_service();
    let result = service.delete(workspace.id, "bob@example.com").await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(service.get(workspace.id).await.is_ok());
}

#[tokio::test]
async fn test_delete_with_dependents_unsupported() {
    let builder = TestServicesBuilder::new();
    let workspace = builder.create_workspace("alice@example.com").await;
    builder
        .add_dependent(workspace.id, ResourceKind::Application)
        .await;

    let service = builder.build_workspace_service();
    let result = service.delete(workspace.id, "alice@example.com").await;
    assert!(matches!(result, Err(AppError::UnsupportedOperation(_))));
}

#[tokio::test]
async fn test_delete_empty_workspace() {
    let builder = TestServicesBuilder::new();
    let workspace = builder.create_workspace("alice@example.com").await;
    builder
        .build_membership_service()
        .add_or_invite_member(workspace.id, "bob@example.com", ROLE_VIEWER)
        .await
        .unwrap();

    let service = builder.build_workspace_service();
    service
        .delete(workspace.id, "alice@example.com")
        .await
        .unwrap();

    assert!(matches!(
        service.get(workspace.id).await,
        Err(AppError::ContainerNotFound(_))
    ));
    for id in ["alice@example.com", "bob@example.com"] {
        let user = builder.user(id).await.unwrap();
        assert!(!user.workspace_ids.contains(&workspace.id));
    }
}

// ============================================================================
// Roles and Dependents
// ============================================================================

#[tokio::test]
async fn test_assignable_roles_follow_hierarchy() {
    let builder = TestServicesBuilder::new();
    let workspace = builder.create_workspace("alice@example.com").await;
    builder
        .build_membership_service()
        .add_or_invite_member(workspace.id, "carol@example.com", ROLE_VIEWER)
        .await
        .unwrap();
    let service = builder.build_workspace_service();

    let admin = service
        .assignable_roles(workspace.id, "alice@example.com")
        .await
        .unwrap();
    assert_eq!(admin.len(), 3);
    assert!(admin.contains_key(ROLE_DEVELOPER));

    let viewer = service
        .assignable_roles(workspace.id, "carol@example.com")
        .await
        .unwrap();
    assert_eq!(viewer.keys().collect::<Vec<_>>(), vec![ROLE_VIEWER]);
    assert!(!viewer[ROLE_VIEWER].is_empty());

    let stranger = service
        .assignable_roles(workspace.id, "mallory@example.com")
        .await;
    assert!(matches!(stranger, Err(AppError::MemberNotFound { .. })));
}

#[tokio::test]
async fn test_new_dependent_inherits_translated_policies() {
    let builder = TestServicesBuilder::new();
    let workspace = builder.create_workspace("alice@example.com").await;
    builder
        .build_membership_service()
        .add_or_invite_member(workspace.id, "carol@example.com", ROLE_VIEWER)
        .await
        .unwrap();

    let datasource = builder
        .add_dependent(workspace.id, ResourceKind::Datasource)
        .await;
    let app = builder
        .add_dependent(workspace.id, ResourceKind::Application)
        .await;

    let alice = subject("alice@example.com");
    let carol = subject("carol@example.com");
    assert!(datasource
        .policies
        .contains(&perm("execute:datasource"), &alice));
    assert!(datasource.policies.permissions_of(&carol).is_empty());
    assert!(app.policies.contains(&perm("read:application"), &carol));
    assert!(!app.policies.contains(&perm("manage:application"), &carol));

    let service = builder.build_workspace_service();
    assert_eq!(service.dependents(workspace.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_workspace_is_not_a_dependent_kind() {
    let builder = TestServicesBuilder::new();
    let workspace = builder.create_workspace("alice@example.com").await;
    let service = builder.build_workspace_service();

    let result = service
        .add_dependent(
            workspace.id,
            workspace_acl::domain::CreateResourceInput {
                kind: ResourceKind::Workspace,
                name: "nested".to_string(),
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::InvalidParameter(_))));
}

// ============================================================================
// Access Queries
// ============================================================================

#[tokio::test]
async fn test_list_accessible_workspaces_and_resources() {
    let builder = TestServicesBuilder::new();
    let shared = builder.create_workspace("alice@example.com").await;
    builder.create_workspace("alice@example.com").await;
    let app = builder
        .add_dependent(shared.id, ResourceKind::Application)
        .await;
    builder
        .build_membership_service()
        .add_or_invite_member(shared.id, "carol@example.com", ROLE_VIEWER)
        .await
        .unwrap();
    let service = builder.build_workspace_service();

    let readable = service
        .list_accessible("carol@example.com", "read:workspace")
        .await
        .unwrap();
    assert_eq!(readable.len(), 1);
    assert_eq!(readable[0].id, shared.id);

    let managed = service
        .list_accessible("carol@example.com", "manage:workspace")
        .await
        .unwrap();
    assert!(managed.is_empty());

    assert_eq!(
        service
            .list_accessible("alice@example.com", "manage:workspace")
            .await
            .unwrap()
            .len(),
        2
    );

    let apps = service
        .list_accessible_resources("carol@example.com", "read:application")
        .await
        .unwrap();
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].id, app.id);
}
