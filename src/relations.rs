//! Relations - Navigating between entities through storage
//!
//! TigerStyle: Derived on demand, never cached on the parent.
//!
//! One-to-many relations are a scan of the child kind for a matching foreign
//! key. Place to Amenity is many-to-many: the place carries the ordered list
//! of linked amenity ids and each backend persists it its own way (inline in
//! the JSON document, or in the `place_amenity` join table).
//!
//! Deleting a parent never removes its children. Orphans stay in storage
//! until they are deleted explicitly.

use crate::models::{key_for, Amenity, City, Entity, Model, Place, Review, State, User};
use crate::storage::{StorageBackend, StorageResult};

/// All entities of kind `T` whose foreign key equals `parent_id`.
async fn children_of<T: Entity>(
    storage: &dyn StorageBackend,
    parent_id: &str,
    foreign_key: impl Fn(&T) -> &str,
) -> StorageResult<Vec<T>> {
    let children: Vec<T> = storage
        .all(Some(T::KIND))
        .await?
        .into_values()
        .filter_map(T::from_model)
        .filter(|child| foreign_key(child) == parent_id)
        .collect();
    Ok(children)
}

/// Cities whose `state_id` is `state`.
pub async fn cities_of_state(
    storage: &dyn StorageBackend,
    state: &State,
) -> StorageResult<Vec<City>> {
    children_of(storage, state.id(), |city: &City| city.state_id.as_str()).await
}

/// Places whose `city_id` is `city`.
pub async fn places_in_city(
    storage: &dyn StorageBackend,
    city: &City,
) -> StorageResult<Vec<Place>> {
    children_of(storage, city.id(), |place: &Place| place.city_id.as_str()).await
}

/// Places owned by `user`.
pub async fn places_of_user(
    storage: &dyn StorageBackend,
    user: &User,
) -> StorageResult<Vec<Place>> {
    children_of(storage, user.id(), |place: &Place| place.user_id.as_str()).await
}

/// Reviews of `place`.
pub async fn reviews_of_place(
    storage: &dyn StorageBackend,
    place: &Place,
) -> StorageResult<Vec<Review>> {
    children_of(storage, place.id(), |review: &Review| review.place_id.as_str()).await
}

/// Reviews written by `user`.
pub async fn reviews_by_user(
    storage: &dyn StorageBackend,
    user: &User,
) -> StorageResult<Vec<Review>> {
    children_of(storage, user.id(), |review: &Review| review.user_id.as_str()).await
}

/// Amenities linked to `place`, in link order.
///
/// The stored copy of the place wins over the caller's, so links made through
/// another handle of the same entity are seen. Ids with no stored amenity are
/// skipped.
pub async fn amenities_of_place(
    storage: &dyn StorageBackend,
    place: &Place,
) -> StorageResult<Vec<Amenity>> {
    let stored = storage
        .get(Place::KIND, place.id())
        .await?
        .and_then(Place::from_model);
    let amenity_ids = match &stored {
        Some(stored) => &stored.amenity_ids,
        None => &place.amenity_ids,
    };

    let mut amenities = storage.all(Some(Amenity::KIND)).await?;
    let linked: Vec<Amenity> = amenity_ids
        .iter()
        .filter_map(|id| amenities.remove(&key_for(Amenity::KIND, id)))
        .filter_map(Amenity::from_model)
        .collect();

    // Postcondition
    assert!(linked.len() <= amenity_ids.len());
    Ok(linked)
}

/// Link `amenity` to `place` and stage the place. Linking twice is a no-op.
///
/// Links already stored for the place are kept even when `place` is a stale
/// copy; the merged list is written back into `place`. Durable after the next
/// `save`.
pub async fn add_amenity(
    storage: &mut dyn StorageBackend,
    place: &mut Place,
    amenity: &Amenity,
) -> StorageResult<bool> {
    let stored = storage
        .get(Place::KIND, place.id())
        .await?
        .and_then(Place::from_model);

    if let Some(stored) = stored {
        let mut merged = stored.amenity_ids;
        for id in &place.amenity_ids {
            if !merged.contains(id) {
                merged.push(id.clone());
            }
        }
        place.amenity_ids = merged;
    }

    let linked = place.link_amenity(amenity.id());
    if linked {
        tracing::debug!(place = %place.id(), amenity = %amenity.id(), "Linked amenity");
    }
    storage.new(Model::from(place.clone()));

    // Postcondition
    assert!(place.amenity_ids.iter().any(|id| id == amenity.id()));
    Ok(linked)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelKind;
    use crate::storage::FileStorage;
    use tempfile::{tempdir, TempDir};

    async fn storage_in(dir: &TempDir) -> FileStorage {
        let mut storage = FileStorage::new(dir.path().join("file.json"));
        storage.reload().await.unwrap();
        storage
    }

    fn ids<T: Entity>(entities: &[T]) -> Vec<String> {
        let mut ids: Vec<String> = entities.iter().map(|e| e.id().to_string()).collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_cities_of_state_exact() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir).await;

        let california = State::new("California");
        let nevada = State::new("Nevada");
        let sf = City::new(california.id(), "San Francisco");
        let la = City::new(california.id(), "Los Angeles");
        let reno = City::new(nevada.id(), "Reno");
        for model in [
            Model::from(california.clone()),
            nevada.into(),
            sf.clone().into(),
            la.clone().into(),
            reno.into(),
        ] {
            storage.new(model);
        }
        storage.save().await.unwrap();

        let cities = cities_of_state(&storage, &california).await.unwrap();
        let mut expected = vec![sf.id().to_string(), la.id().to_string()];
        expected.sort();
        assert_eq!(ids(&cities), expected);
    }

    #[tokio::test]
    async fn test_no_children_is_empty() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir).await;
        let state = State::new("Alaska");
        storage.new(state.clone().into());

        assert!(cities_of_state(&storage, &state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_and_place_relations() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir).await;

        let host = User::new("host@example.com", "pwd");
        let guest = User::new("guest@example.com", "pwd");
        let city = City::new("state-1", "Napa");
        let place = Place::new(city.id(), host.id(), "Vineyard loft");
        let review = Review::new(place.id(), guest.id(), "Lovely");
        for model in [
            Model::from(host.clone()),
            guest.clone().into(),
            city.clone().into(),
            place.clone().into(),
            review.clone().into(),
        ] {
            storage.new(model);
        }

        let place_ids = vec![place.id().to_string()];
        assert_eq!(ids(&places_in_city(&storage, &city).await.unwrap()), place_ids);
        assert_eq!(ids(&places_of_user(&storage, &host).await.unwrap()), place_ids);
        assert!(places_of_user(&storage, &guest).await.unwrap().is_empty());
        assert_eq!(
            ids(&reviews_of_place(&storage, &place).await.unwrap()),
            vec![review.id().to_string()]
        );
        assert_eq!(
            ids(&reviews_by_user(&storage, &guest).await.unwrap()),
            vec![review.id().to_string()]
        );
    }

    #[tokio::test]
    async fn test_add_amenity_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir).await;

        let mut place = Place::new("city-1", "user-1", "Cabin");
        let wifi = Amenity::new("Wifi");
        storage.new(wifi.clone().into());

        assert!(add_amenity(&mut storage, &mut place, &wifi).await.unwrap());
        assert!(!add_amenity(&mut storage, &mut place, &wifi).await.unwrap());
        storage.save().await.unwrap();

        let amenities = amenities_of_place(&storage, &place).await.unwrap();
        assert_eq!(amenities.len(), 1);
        assert_eq!(amenities[0].name, "Wifi");
    }

    #[tokio::test]
    async fn test_amenities_keep_link_order_and_skip_missing() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir).await;

        let mut place = Place::new("city-1", "user-1", "Loft");
        let pool = Amenity::new("Pool");
        let wifi = Amenity::new("Wifi");
        let gone = Amenity::new("Sauna");
        storage.new(pool.clone().into());
        storage.new(wifi.clone().into());

        add_amenity(&mut storage, &mut place, &wifi).await.unwrap();
        add_amenity(&mut storage, &mut place, &gone).await.unwrap();
        add_amenity(&mut storage, &mut place, &pool).await.unwrap();

        let names: Vec<String> = amenities_of_place(&storage, &place)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Wifi", "Pool"]);
    }

    #[tokio::test]
    async fn test_stored_place_links_win() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir).await;

        let mut place = Place::new("city-1", "user-1", "Loft");
        let stale = place.clone();
        let wifi = Amenity::new("Wifi");
        storage.new(wifi.clone().into());
        add_amenity(&mut storage, &mut place, &wifi).await.unwrap();

        assert_eq!(amenities_of_place(&storage, &stale).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_amenity_through_stale_copy_keeps_links() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir).await;

        let mut place = Place::new("city-1", "user-1", "Loft");
        let mut stale = place.clone();
        let wifi = Amenity::new("Wifi");
        let pool = Amenity::new("Pool");
        storage.new(wifi.clone().into());
        storage.new(pool.clone().into());

        add_amenity(&mut storage, &mut place, &wifi).await.unwrap();
        storage.save().await.unwrap();
        add_amenity(&mut storage, &mut stale, &pool).await.unwrap();
        storage.save().await.unwrap();

        let names: Vec<String> = amenities_of_place(&storage, &place)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Wifi", "Pool"]);
        assert_eq!(stale.amenity_ids, vec![wifi.base.id.clone(), pool.base.id.clone()]);
    }

    #[tokio::test]
    async fn test_delete_parent_leaves_orphans() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir).await;

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
        let orphans = cities_of_state(&storage, &state).await.unwrap();
        assert_eq!(ids(&orphans), vec![city.id().to_string()]);
    }
}
