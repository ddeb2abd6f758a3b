//! Tests for the user directory service.

use chrono::{Duration, Utc};
use tempfile::NamedTempFile;

use user_directory::{
    DirectoryError, EditUserData, FollowService, NewComment, NewPost, SignUpData, USER_NOT_FOUND,
    USERNAME_TAKEN, User, UserRepository, UserService,
};

fn setup_service() -> (NamedTempFile, UserService) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();

    let repo = UserRepository::new(db_path).expect("Failed to create repository");
    repo.run_migrations().expect("Migrations failed");
    let service = UserService::new(repo.clone(), FollowService::new(repo));
    (db_file, service)
}

fn signup(service: &UserService, username: &str) -> User {
    service
        .create(SignUpData::new(
            username.to_string(),
            format!("{username}@x.com"),
            "h".to_string(),
            None,
        ))
        .expect("Create failed")
}

#[test]
fn test_create_then_lookup_by_username_and_email() {
    let (_db, service) = setup_service();
    let created = service
        .create(SignUpData::new(
            "alice".to_string(),
            "a@x.com".to_string(),
            "h".to_string(),
            None,
        ))
        .expect("Create failed");
    assert_eq!(created.username(), "alice");

    let by_username = service
        .find_one_by_username("alice")
        .expect("Query failed")
        .expect("alice missing");
    assert_eq!(by_username, created);

    let by_email = service
        .find_one_by_email("a@x.com")
        .expect("Query failed")
        .expect("alice missing");
    assert_eq!(by_email, created);

    let by_id = service
        .find_one_by_id(*created.id())
        .expect("Query failed")
        .expect("alice missing");
    assert_eq!(by_id, created);
}

#[test]
fn test_lookups_miss_without_error() {
    let (_db, service) = setup_service();
    for id in [0, 1, 77, -3] {
        assert!(service.find_one_by_id(id).expect("Query failed").is_none());
    }
    assert!(service.find_one_by_email("no@x.com").expect("Query failed").is_none());
    assert!(service.find_one_by_username("nobody").expect("Query failed").is_none());
}

#[test]
fn test_create_duplicate_username_surfaces_db_error() {
    let (_db, service) = setup_service();
    signup(&service, "bob");
    let err = service
        .create(SignUpData::new(
            "bob".to_string(),
            "other@x.com".to_string(),
            "h".to_string(),
            None,
        ))
        .unwrap_err();
    match err {
        DirectoryError::Db(db) => assert!(db.is_unique_violation()),
        other => panic!("expected Db error, got {other:?}"),
    }
}

#[test]
fn test_find_all_returns_everyone() {
    let (_db, service) = setup_service();
    assert!(service.find_all().expect("List failed").is_empty());
    signup(&service, "one");
    signup(&service, "two");
    assert_eq!(service.find_all().expect("List failed").len(), 2);
}

#[test]
fn test_search_with_empty_query_returns_nothing() {
    let (_db, service) = setup_service();
    let me = signup(&service, "me");
    signup(&service, "anna");

    let found = service.find_all_by_username("", &me).expect("Search failed");
    assert!(found.is_empty());
}

#[test]
fn test_search_with_empty_query_does_not_touch_database() {
    let (db, service) = setup_service();
    let me = signup(&service, "me");
    drop(service);

    // A repository pointing at an unusable path fails on any query.
    let broken = UserRepository::new("/nonexistent/dir/users.db".to_string())
        .expect("Failed to create repository");
    let service = UserService::new(broken.clone(), FollowService::new(broken));

    let found = service.find_all_by_username("", &me).expect("Search failed");
    assert!(found.is_empty());
    assert!(service.find_all_by_username("m", &me).is_err());
    drop(db);
}

#[test]
fn test_search_matches_case_insensitively_excluding_current_user() {
    let (_db, service) = setup_service();
    let ann = signup(&service, "ann");
    signup(&service, "Joanne");
    signup(&service, "MaryANN");
    signup(&service, "zed");

    let found = service
        .find_all_by_username("ann", &ann)
        .expect("Search failed");
    let mut names: Vec<String> = found.iter().map(|u| u.username().clone()).collect();
    names.sort();
    assert_eq!(names, vec!["Joanne".to_string(), "MaryANN".to_string()]);
}

#[test]
fn test_profile_not_found() {
    let (_db, service) = setup_service();
    let err = service
        .find_one_by_username_with_posts("ghost")
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), USER_NOT_FOUND);
}

#[test]
fn test_profile_has_posts_counts_and_no_password() {
    let (_db, service) = setup_service();
    let carol = signup(&service, "carol");
    let dan = signup(&service, "dan");
    let erin = signup(&service, "erin");
    let repo = service.repository();

    let older = repo
        .create_post(NewPost::new(
            *carol.id(),
            "older".to_string(),
            (Utc::now() - Duration::hours(2)).naive_utc(),
        ))
        .expect("Post failed");
    repo.create_post(NewPost::new(
        *carol.id(),
        "newer".to_string(),
        Utc::now().naive_utc(),
    ))
    .expect("Post failed");
    repo.create_comment(NewComment::new(*older.id(), *dan.id(), "nice".to_string()))
        .expect("Comment failed");
    repo.like_post(*older.id(), *erin.id()).expect("Like failed");

    service.follows().follow(*dan.id(), *carol.id()).expect("Follow failed");
    service.follows().follow(*erin.id(), *carol.id()).expect("Follow failed");
    service.follows().follow(*carol.id(), *dan.id()).expect("Follow failed");

    let profile = service
        .find_one_by_username_with_posts("carol")
        .expect("Profile failed");

    assert_eq!(*profile.id(), *carol.id());
    assert_eq!(*profile.counts().posts(), 2);
    assert_eq!(*profile.counts().followers(), 2);
    assert_eq!(*profile.counts().following(), 1);

    let bodies: Vec<&str> = profile.posts().iter().map(|p| p.post().body().as_str()).collect();
    assert_eq!(bodies, vec!["newer", "older"]);
    assert_eq!(*profile.posts()[1].counts().comments(), 1);
    assert_eq!(*profile.posts()[1].counts().likes(), 1);

    let json = serde_json::to_value(&profile).expect("Serialize failed");
    assert!(json.get("password").is_none());
    assert_eq!(json["_count"]["followers"], 2);
    assert_eq!(json["posts"][1]["_count"]["comments"], 1);
}

#[test]
fn test_edit_with_empty_image_keeps_existing() {
    let (_db, service) = setup_service();
    let user = service
        .create(SignUpData::new(
            "fay".to_string(),
            "fay@x.com".to_string(),
            "h".to_string(),
            Some("http://old".to_string()),
        ))
        .expect("Create failed");

    let edited = service
        .edit(*user.id(), EditUserData::default().image(""))
        .expect("Edit failed");
    assert_eq!(edited.image().as_deref(), Some("http://old"));
}

#[test]
fn test_edit_with_image_updates_it() {
    let (_db, service) = setup_service();
    let user = signup(&service, "gus");

    let edited = service
        .edit(*user.id(), EditUserData::default().image("http://x"))
        .expect("Edit failed");
    assert_eq!(edited.image().as_deref(), Some("http://x"));

    let reloaded = service
        .find_one_by_id(*user.id())
        .expect("Query failed")
        .expect("gus missing");
    assert_eq!(reloaded.image().as_deref(), Some("http://x"));
}

#[test]
fn test_edit_username_taken_by_other_conflicts() {
    let (_db, service) = setup_service();
    signup(&service, "taken");
    let hal = signup(&service, "hal");

    let err = service
        .edit(*hal.id(), EditUserData::default().username("taken"))
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(err.to_string(), USERNAME_TAKEN);

    let unchanged = service
        .find_one_by_id(*hal.id())
        .expect("Query failed")
        .expect("hal missing");
    assert_eq!(unchanged.username(), "hal");
}

#[test]
fn test_edit_own_username_is_not_a_conflict() {
    let (_db, service) = setup_service();
    let owner = signup(&service, "taken");

    let edited = service
        .edit(
            *owner.id(),
            EditUserData::default().username("taken").email("new@x.com"),
        )
        .expect("Edit failed");
    assert_eq!(edited.username(), "taken");
    assert_eq!(edited.email(), "new@x.com");
}

#[test]
fn test_edit_renames_to_free_username() {
    let (_db, service) = setup_service();
    let ida = signup(&service, "ida");

    let edited = service
        .edit(*ida.id(), EditUserData::default().username("ida2"))
        .expect("Edit failed");
    assert_eq!(edited.username(), "ida2");
    assert!(service.find_one_by_username("ida").expect("Query failed").is_none());
    assert!(edited.updated_at() >= ida.updated_at());
}

#[test]
fn test_edit_missing_user_is_not_found() {
    let (_db, service) = setup_service();
    let err = service
        .edit(404, EditUserData::default().username("anyone"))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_edit_without_changes_returns_current() {
    let (_db, service) = setup_service();
    let jo = signup(&service, "jo");

    let edited = service
        .edit(*jo.id(), EditUserData::default())
        .expect("Edit failed");
    assert_eq!(edited, jo);
}

#[test]
fn test_follow_service_is_idempotent() {
    let (_db, service) = setup_service();
    let kim = signup(&service, "kim");
    let lou = signup(&service, "lou");
    let follows = service.follows();

    assert!(follows.follow(*kim.id(), *lou.id()).expect("Follow failed"));
    assert!(!follows.follow(*kim.id(), *lou.id()).expect("Follow failed"));
    assert!(follows.is_following(*kim.id(), *lou.id()).expect("Query failed"));
    assert_eq!(follows.followers(*lou.id()).expect("Query failed").len(), 1);
    assert_eq!(follows.following(*kim.id()).expect("Query failed").len(), 1);

    assert!(follows.unfollow(*kim.id(), *lou.id()).expect("Unfollow failed"));
    assert!(!follows.is_following(*kim.id(), *lou.id()).expect("Query failed"));
}

#[test]
fn test_self_follow_is_a_db_error() {
    let (_db, service) = setup_service();
    let max = signup(&service, "max");
    let err = service.follows().follow(*max.id(), *max.id()).unwrap_err();
    assert!(matches!(err, DirectoryError::Db(_)));
}

#[test]
fn test_search_ignores_non_ascii_case() {
    let (_db, service) = setup_service();
    let me = signup(&service, "me");
    signup(&service, "ÉMILE");
    signup(&service, "Ånnika");

    let emile = service
        .find_all_by_username("émile", &me)
        .expect("Search failed");
    assert_eq!(emile.len(), 1);
    assert_eq!(emile[0].username(), "ÉMILE");

    let annika = service
        .find_all_by_username("ånn", &me)
        .expect("Search failed");
    assert_eq!(annika.len(), 1);
    assert_eq!(annika[0].username(), "Ånnika");
}

#[test]
fn test_edit_to_taken_email_surfaces_unique_violation() {
    let (_db, service) = setup_service();
    signup(&service, "ana");
    let ben = signup(&service, "ben");

    let err = service
        .edit(*ben.id(), EditUserData::default().email("ana@x.com"))
        .unwrap_err();
    match err {
        DirectoryError::Db(db) => assert!(db.is_unique_violation(), "got {db}"),
        other => panic!("expected Db error, got {other:?}"),
    }

    let unchanged = service
        .find_one_by_id(*ben.id())
        .expect("Query failed")
        .expect("ben missing");
    assert_eq!(unchanged, ben);
}
