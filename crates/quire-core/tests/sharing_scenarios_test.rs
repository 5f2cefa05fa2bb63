//! End-to-end sharing and access-control scenarios against the in-memory store.
//!
//! Covers ownership vs. shared read/write, duplicate-share prevention,
//! permission changes, idempotent revoke, cascade delete, and the
//! visibility set used by list and search.

use quire_core::mock::MemoryStore;
use quire_core::{
    AccessLevel, CreateNoteRequest, ErrorKind, NotePatch, NoteService, OwnerSharePolicy,
    Pagination, Permission, ServiceConfig, ShareRequest,
};
use uuid::Uuid;

struct Fixture {
    store: MemoryStore,
    service: NoteService,
    owner: Uuid,
    alice: Uuid,
    bob: Uuid,
}

fn setup() -> Fixture {
    setup_with(ServiceConfig::default())
}

fn setup_with(config: ServiceConfig) -> Fixture {
    let store = MemoryStore::new();
    let owner = store.add_user("olivia", "olivia@example.com");
    let alice = store.add_user("alice", "alice@example.com");
    let bob = store.add_user("bob", "bob@example.com");
    let service = store.service(config);
    Fixture {
        store,
        service,
        owner,
        alice,
        bob,
    }
}

fn new_note(title: &str, content: &str, tags: &[&str]) -> CreateNoteRequest {
    CreateNoteRequest {
        title: title.to_string(),
        content: content.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

async fn create(f: &Fixture, owner: Uuid, title: &str) -> Uuid {
    f.service
        .create_note(owner, new_note(title, "body", &[]))
        .await
        .expect("Failed to create note")
        .id
}

// =============================================================================
// OWNERSHIP AND GRANTS
// =============================================================================

#[tokio::test]
async fn test_owner_shares_then_duplicate_share_fails() {
    let f = setup();
    let note_id = create(&f, f.owner, "Plan").await;
    let note = f.store.fetch_note(note_id).unwrap();

    assert_eq!(
        f.service.access().resolve(&note, f.owner).await.unwrap(),
        AccessLevel::Owner
    );

    let view = f
        .service
        .share_note(note_id, f.owner, f.alice, Permission::Read)
        .await
        .unwrap();
    assert_eq!(view.permission_of(f.alice), Some(Permission::Read));
    assert_eq!(
        f.service.access().resolve(&note, f.alice).await.unwrap(),
        AccessLevel::Read
    );

    let err = f
        .service
        .share_note(note_id, f.owner, f.alice, Permission::Write)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyShared);
    assert_eq!(err.to_string(), "Note is already shared with this user");

    // The failed attempt must not have overwritten the grant
    let view = f.service.get_note(note_id, f.owner).await.unwrap();
    assert_eq!(view.permission_of(f.alice), Some(Permission::Read));
    assert_eq!(view.shared_users.len(), 1);
}

#[tokio::test]
async fn test_reader_cannot_update_until_escalated() {
    let f = setup();
    let note_id = create(&f, f.owner, "Draft").await;
    f.service
        .share_note(note_id, f.owner, f.alice, Permission::Read)
        .await
        .unwrap();

    let patch = NotePatch {
        title: Some("x".to_string()),
        ..Default::default()
    };
    let err = f
        .service
        .update_note(note_id, f.alice, patch.clone())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    assert_eq!(err.status_code(), 401);

    f.service
        .update_sharing(note_id, f.owner, f.alice, Permission::Write)
        .await
        .unwrap();

    let updated = f.service.update_note(note_id, f.alice, patch).await.unwrap();
    assert_eq!(updated.title, "x");
}

#[tokio::test]
async fn test_reader_update_always_denied_for_every_field() {
    let f = setup();
    let note_id = create(&f, f.owner, "Locked").await;
    f.service
        .share_note(note_id, f.owner, f.alice, Permission::Read)
        .await
        .unwrap();

    let patches = [
        NotePatch {
            title: Some("t".to_string()),
            ..Default::default()
        },
        NotePatch {
            content: Some("c".to_string()),
            ..Default::default()
        },
        NotePatch {
            tags: Some(vec!["t".to_string()]),
            ..Default::default()
        },
        NotePatch {
            is_archived: Some(true),
            ..Default::default()
        },
        NotePatch::default(),
    ];

    for patch in patches {
        let err = f
            .service
            .update_note(note_id, f.alice, patch)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    }

    let view = f.service.get_note(note_id, f.owner).await.unwrap();
    assert_eq!(view.title, "Locked");
    assert!(!view.is_archived);
}

#[tokio::test]
async fn test_stranger_cannot_read_existing_note() {
    let f = setup();
    let note_id = create(&f, f.bob, "Private").await;

    let err = f.service.get_note(note_id, f.alice).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    assert_eq!(err.to_string(), "Not authorized to access this note");
}

#[tokio::test]
async fn test_missing_note_is_not_found() {
    let f = setup();
    let err = f
        .service
        .get_note(Uuid::new_v4(), f.alice)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_writer_cannot_share_or_delete() {
    let f = setup();
    let note_id = create(&f, f.owner, "Team").await;
    f.service
        .share_note(note_id, f.owner, f.alice, Permission::Write)
        .await
        .unwrap();

    let err = f
        .service
        .share_note(note_id, f.alice, f.bob, Permission::Read)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    assert_eq!(err.to_string(), "Only the owner can share this note");

    let err = f.service.delete_note(note_id, f.alice).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    assert_eq!(err.to_string(), "Only the owner can delete this note");

    let err = f
        .service
        .update_sharing(note_id, f.alice, f.alice, Permission::Write)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);

    let err = f
        .service
        .remove_sharing(note_id, f.alice, f.alice)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);

    // A writer may still edit
    let view = f
        .service
        .update_note(
            note_id,
            f.alice,
            NotePatch {
                content: Some("edited".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(view.content, "edited");
}

#[tokio::test]
async fn test_share_with_owner_rejected_by_default() {
    let f = setup();
    let note_id = create(&f, f.owner, "Mine").await;

    let err = f
        .service
        .share_note(note_id, f.owner, f.owner, Permission::Write)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyShared);
    assert_eq!(f.store.grant_count(note_id), 0);
}

#[tokio::test]
async fn test_share_with_owner_ignored_under_ignore_policy() {
    let f = setup_with(ServiceConfig::default().owner_share_policy(OwnerSharePolicy::Ignore));
    let note_id = create(&f, f.owner, "Mine").await;

    let view = f
        .service
        .share_note(note_id, f.owner, f.owner, Permission::Write)
        .await
        .unwrap();
    assert!(view.shared_users.is_empty());
    assert_eq!(f.store.grant_count(note_id), 0);
}

#[tokio::test]
async fn test_share_with_unknown_user_is_not_found() {
    let f = setup();
    let note_id = create(&f, f.owner, "Plan").await;

    let err = f
        .service
        .share_note(note_id, f.owner, Uuid::new_v4(), Permission::Read)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), "User not found");
}

#[tokio::test]
async fn test_invalid_permission_literal() {
    let f = setup();
    let note_id = create(&f, f.owner, "Plan").await;

    let req = ShareRequest {
        user_id: f.alice,
        permission: "admin".to_string(),
    };
    let err = f
        .service
        .share_note_request(note_id, f.owner, &req)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPermission);
    assert_eq!(err.status_code(), 400);
    assert_eq!(f.store.grant_count(note_id), 0);

    let req = ShareRequest {
        user_id: f.alice,
        permission: "write".to_string(),
    };
    let view = f
        .service
        .share_note_request(note_id, f.owner, &req)
        .await
        .unwrap();
    assert_eq!(view.permission_of(f.alice), Some(Permission::Write));
}

#[tokio::test]
async fn test_update_share_moves_both_directions() {
    let f = setup();
    let note_id = create(&f, f.owner, "Flip").await;
    f.service
        .share_note(note_id, f.owner, f.alice, Permission::Write)
        .await
        .unwrap();

    let view = f
        .service
        .update_sharing(note_id, f.owner, f.alice, Permission::Read)
        .await
        .unwrap();
    assert_eq!(view.permission_of(f.alice), Some(Permission::Read));

    let view = f
        .service
        .update_sharing(note_id, f.owner, f.alice, Permission::Write)
        .await
        .unwrap();
    assert_eq!(view.permission_of(f.alice), Some(Permission::Write));
}

#[tokio::test]
async fn test_update_share_without_grant_is_not_shared() {
    let f = setup();
    let note_id = create(&f, f.owner, "Solo").await;

    let err = f
        .service
        .update_sharing(note_id, f.owner, f.alice, Permission::Write)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotShared);
    assert_eq!(err.to_string(), "User is not shared with this note");
}

#[tokio::test]
async fn test_update_share_bumps_grant_not_note() {
    let f = setup();
    let note_id = create(&f, f.owner, "Stamp").await;
    f.service
        .share_note(note_id, f.owner, f.alice, Permission::Read)
        .await
        .unwrap();

    let note_before = f.store.fetch_note(note_id).unwrap();
    let grant_before = f.store.fetch_grant(note_id, f.alice).unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    f.service
        .update_sharing(note_id, f.owner, f.alice, Permission::Write)
        .await
        .unwrap();

    let grant_after = f.store.fetch_grant(note_id, f.alice).unwrap();
    assert!(grant_after.updated_at > grant_before.updated_at);
    assert_eq!(grant_after.created_at, grant_before.created_at);
    assert_eq!(f.store.fetch_note(note_id).unwrap().updated_at, note_before.updated_at);
}

#[tokio::test]
async fn test_revoke_is_idempotent() {
    let f = setup();
    let note_id = create(&f, f.owner, "Temp").await;
    f.service
        .share_note(note_id, f.owner, f.alice, Permission::Read)
        .await
        .unwrap();

    let view = f
        .service
        .remove_sharing(note_id, f.owner, f.alice)
        .await
        .unwrap();
    assert!(view.shared_users.is_empty());

    // Second revoke and revoke of a never-granted user both succeed
    f.service
        .remove_sharing(note_id, f.owner, f.alice)
        .await
        .unwrap();
    f.service
        .remove_sharing(note_id, f.owner, f.bob)
        .await
        .unwrap();

    let err = f.service.get_note(note_id, f.alice).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
}

#[tokio::test]
async fn test_grant_can_be_recreated_after_revoke() {
    let f = setup();
    let note_id = create(&f, f.owner, "Cycle").await;

    f.service
        .share_note(note_id, f.owner, f.alice, Permission::Read)
        .await
        .unwrap();
    f.service
        .remove_sharing(note_id, f.owner, f.alice)
        .await
        .unwrap();
    let view = f
        .service
        .share_note(note_id, f.owner, f.alice, Permission::Write)
        .await
        .unwrap();
    assert_eq!(view.permission_of(f.alice), Some(Permission::Write));
}

// =============================================================================
// CASCADE DELETE
// =============================================================================

#[tokio::test]
async fn test_delete_cascades_grants() {
    let f = setup();
    let note_id = create(&f, f.owner, "Doomed").await;
    f.service
        .share_note(note_id, f.owner, f.alice, Permission::Read)
        .await
        .unwrap();
    f.service
        .share_note(note_id, f.owner, f.bob, Permission::Write)
        .await
        .unwrap();
    assert_eq!(f.store.grant_count(note_id), 2);

    f.service.delete_note(note_id, f.owner).await.unwrap();

    assert_eq!(f.store.grant_count(note_id), 0);
    for user in [f.owner, f.alice, f.bob] {
        let err = f.service.get_note(note_id, user).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    let err = f
        .service
        .remove_sharing(note_id, f.owner, f.alice)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// =============================================================================
// NOTE FIELDS
// =============================================================================

#[tokio::test]
async fn test_create_returns_owner_summary() {
    let f = setup();
    let view = f
        .service
        .create_note(f.owner, new_note("Hello", "World", &["a", " a", "b", ""]))
        .await
        .unwrap();

    assert_eq!(view.owner.id, f.owner);
    assert_eq!(view.owner.username, "olivia");
    assert_eq!(view.owner.email, "olivia@example.com");
    assert_eq!(view.tags, vec!["a", "b"]);
    assert!(!view.is_archived);
    assert!(view.shared_users.is_empty());
}

#[tokio::test]
async fn test_create_rejects_empty_content() {
    let f = setup();
    let err = f
        .service
        .create_note(f.owner, new_note("Title", "   ", &[]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_partial_update_keeps_omitted_fields() {
    let f = setup();
    let view = f
        .service
        .create_note(f.owner, new_note("Title", "Content", &["keep"]))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let updated = f
        .service
        .update_note(
            view.id,
            f.owner,
            NotePatch {
                is_archived: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.is_archived);
    assert_eq!(updated.title, "Title");
    assert_eq!(updated.content, "Content");
    assert_eq!(updated.tags, vec!["keep"]);
    assert!(updated.updated_at > view.updated_at);
    assert_eq!(updated.created_at, view.created_at);
}

#[tokio::test]
async fn test_grantee_sees_full_grant_list() {
    let f = setup();
    let note_id = create(&f, f.owner, "Shared").await;
    f.service
        .share_note(note_id, f.owner, f.alice, Permission::Read)
        .await
        .unwrap();
    f.service
        .share_note(note_id, f.owner, f.bob, Permission::Write)
        .await
        .unwrap();

    let view = f.service.get_note(note_id, f.alice).await.unwrap();
    assert_eq!(view.owner.id, f.owner);
    assert_eq!(view.shared_users.len(), 2);
    assert_eq!(view.shared_users[0].username, "alice");
    assert_eq!(view.shared_users[1].username, "bob");
    assert_eq!(view.permission_of(f.bob), Some(Permission::Write));
}

// =============================================================================
// VISIBILITY
// =============================================================================

#[tokio::test]
async fn test_list_is_owned_union_shared_each_once() {
    let f = setup();
    let own = create(&f, f.alice, "Alice own").await;
    let shared = create(&f, f.owner, "Shared with alice").await;
    let shared_many = create(&f, f.bob, "Shared with everyone").await;
    let hidden = create(&f, f.owner, "Not for alice").await;
    let archived = create(&f, f.alice, "Alice archived").await;

    f.service
        .share_note(shared, f.owner, f.alice, Permission::Read)
        .await
        .unwrap();
    f.service
        .share_note(shared_many, f.bob, f.alice, Permission::Write)
        .await
        .unwrap();
    f.service
        .share_note(shared_many, f.bob, f.owner, Permission::Read)
        .await
        .unwrap();
    f.service
        .update_note(
            archived,
            f.alice,
            NotePatch {
                is_archived: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let page = f
        .service
        .list_visible_notes(f.alice, false, Pagination::default())
        .await
        .unwrap();

    let mut ids: Vec<Uuid> = page.notes.iter().map(|n| n.id).collect();
    ids.sort();
    let mut expected = vec![own, shared, shared_many];
    expected.sort();
    assert_eq!(ids, expected);
    assert_eq!(page.total_items, 3);
    assert!(!ids.contains(&hidden));

    let archived_page = f
        .service
        .list_visible_notes(f.alice, true, Pagination::default())
        .await
        .unwrap();
    assert_eq!(archived_page.notes.len(), 1);
    assert_eq!(archived_page.notes[0].id, archived);
}

#[tokio::test]
async fn test_list_orders_by_updated_desc_and_paginates() {
    let f = setup();
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(create(&f, f.alice, &format!("Note {i}")).await);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    // Touch the oldest note so it moves to the front
    f.service
        .update_note(
            ids[0],
            f.alice,
            NotePatch {
                content: Some("touched".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let first = f
        .service
        .list_visible_notes(f.alice, false, Pagination::new(1, 2))
        .await
        .unwrap();
    assert_eq!(first.total_items, 5);
    assert_eq!(first.total_pages, 3);
    assert_eq!(first.current_page, 1);
    assert_eq!(
        first.notes.iter().map(|n| n.id).collect::<Vec<_>>(),
        vec![ids[0], ids[4]]
    );

    let last = f
        .service
        .list_visible_notes(f.alice, false, Pagination::new(3, 2))
        .await
        .unwrap();
    assert_eq!(last.current_page, 3);
    assert_eq!(last.notes.len(), 1);
    assert_eq!(last.notes[0].id, ids[1]);
}

#[tokio::test]
async fn test_revoked_note_leaves_visibility_set() {
    let f = setup();
    let note_id = create(&f, f.owner, "Brief").await;
    f.service
        .share_note(note_id, f.owner, f.alice, Permission::Read)
        .await
        .unwrap();

    let page = f
        .service
        .list_visible_notes(f.alice, false, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, 1);

    f.service
        .remove_sharing(note_id, f.owner, f.alice)
        .await
        .unwrap();
    let page = f
        .service
        .list_visible_notes(f.alice, false, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, 0);
    assert!(page.notes.is_empty());
}

#[tokio::test]
async fn test_search_within_visibility_set() {
    let f = setup();
    let recipe = f
        .service
        .create_note(f.alice, new_note("Soup recipe", "leeks", &["cooking"]))
        .await
        .unwrap()
        .id;
    let shared = f
        .service
        .create_note(f.owner, new_note("Garden", "Plant LEEKS in spring", &[]))
        .await
        .unwrap()
        .id;
    let tagged = f
        .service
        .create_note(f.bob, new_note("Weekend", "market", &["errands"]))
        .await
        .unwrap()
        .id;
    // Matches the text but is not visible to alice
    f.service
        .create_note(f.bob, new_note("Leeks again", "leeks", &[]))
        .await
        .unwrap();

    f.service
        .share_note(shared, f.owner, f.alice, Permission::Read)
        .await
        .unwrap();
    f.service
        .share_note(tagged, f.bob, f.alice, Permission::Read)
        .await
        .unwrap();

    let page = f
        .service
        .search_notes(Some("leeks"), f.alice, false, Pagination::default())
        .await
        .unwrap();
    let mut ids: Vec<Uuid> = page.notes.iter().map(|n| n.id).collect();
    ids.sort();
    let mut expected = vec![recipe, shared];
    expected.sort();
    assert_eq!(ids, expected);

    let by_tag = f
        .service
        .search_notes(Some("errands, nothing"), f.alice, false, Pagination::default())
        .await
        .unwrap();
    assert_eq!(by_tag.notes.len(), 1);
    assert_eq!(by_tag.notes[0].id, tagged);

    let everything = f
        .service
        .search_notes(Some(""), f.alice, false, Pagination::default())
        .await
        .unwrap();
    assert_eq!(everything.total_items, 3);
}

#[tokio::test]
async fn test_search_uses_query_verbatim() {
    let f = setup();
    let airplane = f
        .service
        .create_note(f.alice, new_note("airplane", "boarding", &[]))
        .await
        .unwrap()
        .id;
    let spaced = f
        .service
        .create_note(f.alice, new_note("two  spaces", "body", &[]))
        .await
        .unwrap()
        .id;

    // Leading space is part of the needle, so "airplane" does not match
    let padded = f
        .service
        .search_notes(Some(" plan"), f.alice, false, Pagination::default())
        .await
        .unwrap();
    assert_eq!(padded.total_items, 0);

    let unpadded = f
        .service
        .search_notes(Some("plan"), f.alice, false, Pagination::default())
        .await
        .unwrap();
    assert_eq!(unpadded.total_items, 1);
    assert_eq!(unpadded.notes[0].id, airplane);

    // Whitespace-only is still a text filter
    let double_space = f
        .service
        .search_notes(Some("  "), f.alice, false, Pagination::default())
        .await
        .unwrap();
    assert_eq!(double_space.total_items, 1);
    assert_eq!(double_space.notes[0].id, spaced);
}

// =============================================================================
// CONCURRENCY
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_grants_yield_one_success() {
    let f = setup();
    let note_id = create(&f, f.owner, "Race").await;

    let attempts = (0..16).map(|i| {
        let service = f.service.clone();
        let (owner, alice) = (f.owner, f.alice);
        let permission = if i % 2 == 0 {
            Permission::Read
        } else {
            Permission::Write
        };
        tokio::spawn(async move {
            service
                .share_note(note_id, owner, alice, permission)
                .await
        })
    });

    let results = futures::future::join_all(attempts).await;
    let mut successes = 0;
    for result in results {
        match result.expect("task panicked") {
            Ok(_) => successes += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::AlreadyShared),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(f.store.grant_count(note_id), 1);
}
