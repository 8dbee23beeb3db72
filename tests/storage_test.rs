//! Storage scenarios run against every backend through the public API.
//!
//! File-backend cases always run. Postgres cases need TEST_POSTGRES_URL and
//! are skipped otherwise; they share one database, so they only assert on the
//! entities they create.

use std::str::FromStr;

use hbnb::console::{Console, Reply};
use hbnb::models::{Amenity, City, Entity, Model, ModelKind, Place, Review, State, User};
use hbnb::relations;
use hbnb::storage::{self, FileStorage, PostgresStorage, StorageBackend};
use hbnb::StorageConfig;
use sqlx::postgres::PgConnectOptions;
use tempfile::{tempdir, TempDir};

fn init_logging() {
    dotenvy::dotenv().ok();
    let _ = tracing_subscriber::fmt().with_env_filter("debug").try_init();
}

async fn open_file(dir: &TempDir) -> Box<dyn StorageBackend> {
    init_logging();
    storage::open(&StorageConfig::file(dir.path().join("file.json")))
        .await
        .unwrap()
}

async fn open_postgres() -> Option<Box<dyn StorageBackend>> {
    init_logging();
    let url = std::env::var("TEST_POSTGRES_URL").ok()?;
    let options = PgConnectOptions::from_str(&url).ok()?;
    let mut storage = PostgresStorage::new(options, false);
    storage.reload().await.unwrap();
    Some(Box::new(storage))
}

// =============================================================================
// Scenarios
// =============================================================================

async fn state_survives_reload(storage: &mut dyn StorageBackend) {
    let california = State::new("California");
    storage.new(california.clone().into());
    storage.save().await.unwrap();

    storage.reload().await.unwrap();

    let states = storage.all(Some(ModelKind::State)).await.unwrap();
    let stored = states
        .get(&california.key())
        .cloned()
        .and_then(State::from_model)
        .expect("state should survive reload");
    assert_eq!(stored.base.id, california.base.id);
    assert_eq!(stored.name, "California");
}

async fn parent_delete_leaves_children(storage: &mut dyn StorageBackend) {
    let state = State::new("Oregon");
    let city = City::new(state.id(), "Portland");
    storage.new(state.clone().into());
    storage.new(city.clone().into());
    storage.save().await.unwrap();

    storage.delete(Some(&Model::from(state.clone())));
    storage.save().await.unwrap();
    storage.reload().await.unwrap();

    assert!(storage.get(ModelKind::State, state.id()).await.unwrap().is_none());
    assert!(storage.get(ModelKind::City, city.id()).await.unwrap().is_some());
}

async fn derived_children_are_exact(storage: &mut dyn StorageBackend) {
    let parent = State::new("California");
    let other = State::new("Nevada");
    let c1 = City::new(parent.id(), "San Francisco");
    let c2 = City::new(parent.id(), "San Jose");
    let c3 = City::new(other.id(), "Reno");
    for model in [
        Model::from(parent.clone()),
        other.into(),
        c1.clone().into(),
        c2.clone().into(),
        c3.into(),
    ] {
        storage.new(model);
    }
    storage.save().await.unwrap();

    let mut ids: Vec<String> = relations::cities_of_state(storage, &parent)
        .await
        .unwrap()
        .into_iter()
        .map(|city| city.base.id)
        .collect();
    ids.sort();
    let mut expected = vec![c1.base.id, c2.base.id];
    expected.sort();
    assert_eq!(ids, expected);

    let lonely = State::new("Wyoming");
    assert!(relations::cities_of_state(storage, &lonely)
        .await
        .unwrap()
        .is_empty());
}

async fn amenity_links_are_idempotent(storage: &mut dyn StorageBackend) {
    let host = User::new("host@example.com", "pwd");
    let city = City::new("state-1", "Napa");
    let mut place = Place::new(city.id(), host.id(), "Vineyard loft");
    let wifi = Amenity::new("Wifi");
    for model in [
        Model::from(host.clone()),
        city.into(),
        place.clone().into(),
        wifi.clone().into(),
    ] {
        storage.new(model);
    }

    assert!(relations::add_amenity(storage, &mut place, &wifi).await.unwrap());
    assert!(!relations::add_amenity(storage, &mut place, &wifi).await.unwrap());
    storage.save().await.unwrap();
    storage.reload().await.unwrap();

    let amenities = relations::amenities_of_place(storage, &place).await.unwrap();
    assert_eq!(amenities.len(), 1);
    assert_eq!(amenities[0].base.id, wifi.base.id);

    let pool = Amenity::new("Pool");
    storage.new(pool.clone().into());
    let mut stale = place.clone();
    stale.amenity_ids.clear();
    relations::add_amenity(storage, &mut stale, &pool).await.unwrap();
    storage.save().await.unwrap();
    let ids: Vec<String> = relations::amenities_of_place(storage, &place)
        .await
        .unwrap()
        .into_iter()
        .map(|amenity| amenity.base.id)
        .collect();
    assert_eq!(ids, vec![wifi.base.id.clone(), pool.base.id.clone()]);

    let review = Review::new(place.id(), host.id(), "Lovely stay");
    storage.new(review.clone().into());
    storage.save().await.unwrap();
    let reviews = relations::reviews_of_place(storage, &place).await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].text, "Lovely stay");
}

async fn console_roundtrip(storage: &mut dyn StorageBackend) {
    let mut console = Console::new(storage);

    let Reply::Output(id) = console
        .execute(r#"create State name="New_Mexico""#)
        .await
        .unwrap()
    else {
        panic!("create should print the id");
    };

    console
        .execute(&format!(r#"update State {id} name "Arizona""#))
        .await
        .unwrap();
    let Reply::Output(shown) = console.execute(&format!("show State {id}")).await.unwrap() else {
        panic!("show should print the instance");
    };
    assert!(shown.starts_with(&format!("[State] ({id})")));
    assert!(shown.contains("'name': 'Arizona'"));

    console.execute(&format!("destroy State {id}")).await.unwrap();
    let err = console
        .execute(&format!("show State {id}"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "** no instance found **");
}

// =============================================================================
// File backend
// =============================================================================

#[tokio::test]
async fn test_file_state_survives_reload() {
    let dir = tempdir().unwrap();
    state_survives_reload(open_file(&dir).await.as_mut()).await;
}

#[tokio::test]
async fn test_file_parent_delete_leaves_children() {
    let dir = tempdir().unwrap();
    parent_delete_leaves_children(open_file(&dir).await.as_mut()).await;
}

#[tokio::test]
async fn test_file_derived_children_are_exact() {
    let dir = tempdir().unwrap();
    derived_children_are_exact(open_file(&dir).await.as_mut()).await;
}

#[tokio::test]
async fn test_file_amenity_links_are_idempotent() {
    let dir = tempdir().unwrap();
    amenity_links_are_idempotent(open_file(&dir).await.as_mut()).await;
}

#[tokio::test]
async fn test_file_console_roundtrip() {
    let dir = tempdir().unwrap();
    console_roundtrip(open_file(&dir).await.as_mut()).await;
}

#[tokio::test]
async fn test_file_fresh_start_is_empty() {
    let dir = tempdir().unwrap();
    let storage = open_file(&dir).await;
    assert!(storage.all(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_file_survives_new_handle() {
    let dir = tempdir().unwrap();
    let state = State::new("Vermont");
    {
        let mut storage = open_file(&dir).await;
        storage::save_entity(storage.as_mut(), &mut state.clone())
            .await
            .unwrap();
    }

    let mut reopened = FileStorage::new(dir.path().join("file.json"));
    reopened.reload().await.unwrap();
    assert!(reopened
        .get(ModelKind::State, state.id())
        .await
        .unwrap()
        .is_some());
}

// =============================================================================
// Postgres backend
// =============================================================================

macro_rules! with_postgres {
    ($scenario:ident) => {
        match open_postgres().await {
            Some(mut storage) => {
                $scenario(storage.as_mut()).await;
                storage.close().await;
            }
            None => eprintln!("Skipping test: TEST_POSTGRES_URL not set"),
        }
    };
}

#[tokio::test]
async fn test_postgres_state_survives_reload() {
    with_postgres!(state_survives_reload);
}

#[tokio::test]
async fn test_postgres_parent_delete_leaves_children() {
    with_postgres!(parent_delete_leaves_children);
}

#[tokio::test]
async fn test_postgres_derived_children_are_exact() {
    with_postgres!(derived_children_are_exact);
}

#[tokio::test]
async fn test_postgres_amenity_links_are_idempotent() {
    with_postgres!(amenity_links_are_idempotent);
}

#[tokio::test]
async fn test_postgres_console_roundtrip() {
    with_postgres!(console_roundtrip);
}
