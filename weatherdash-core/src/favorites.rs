//! Ordered, deduplicated list of saved cities.
//!
//! The whole list is persisted under a single key and rewritten on every
//! mutation. Identity for removal and reordering is the generated `id`;
//! uniqueness is enforced on the exact `(name, country)` pair.

use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::HashSet, sync::Arc};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    model::WeatherCondition,
    storage::{FAVORITES_KEY, KeyValueStore, load_json, save_json},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteCity {
    pub id: String,
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(
        default,
        deserialize_with = "rounded_temp",
        skip_serializing_if = "Option::is_none"
    )]
    pub cached_temp: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_condition: Option<WeatherCondition>,
}

/// Stored temperatures may be any JSON number; fractional ones are rounded.
fn rounded_temp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.filter(|t| t.is_finite()).map(|t| t.round() as i32))
}

impl FavoriteCity {
    fn matches(&self, name: &str, country: &str) -> bool {
        self.name == name && self.country == country
    }
}

/// Everything a favorite carries except its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFavorite {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub cached_temp: Option<i32>,
    pub cached_condition: Option<WeatherCondition>,
}

impl NewFavorite {
    pub fn new(name: impl Into<String>, country: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
            lat,
            lon,
            cached_temp: None,
            cached_condition: None,
        }
    }

    pub fn with_cache(mut self, temp: i32, condition: WeatherCondition) -> Self {
        self.cached_temp = Some(temp);
        self.cached_condition = Some(condition);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FavoritesError {
    #[error("Reordered list is not a permutation of the current favorites")]
    NotAPermutation,
    #[error("Position {index} is out of range for {len} favorites")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug)]
pub struct FavoritesStore {
    store: Arc<dyn KeyValueStore>,
    favorites: Vec<FavoriteCity>,
}

impl FavoritesStore {
    /// Restores the persisted list; unreadable data yields an empty list.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let favorites: Vec<FavoriteCity> =
            load_json(store.as_ref(), FAVORITES_KEY).unwrap_or_default();
        debug!(count = favorites.len(), "Loaded favorites");
        Self { store, favorites }
    }

    pub fn list(&self) -> &[FavoriteCity] {
        &self.favorites
    }

    pub fn len(&self) -> usize {
        self.favorites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.favorites.is_empty()
    }

    pub fn is_favorite(&self, name: &str, country: &str) -> bool {
        self.find(name, country).is_some()
    }

    pub fn find(&self, name: &str, country: &str) -> Option<&FavoriteCity> {
        self.favorites.iter().find(|f| f.matches(name, country))
    }

    /// Appends a new favorite unless one with the same `(name, country)`
    /// already exists. Returns the entry now in the list either way.
    pub fn add(&mut self, city: NewFavorite) -> &FavoriteCity {
        if let Some(pos) = self.favorites.iter().position(|f| f.matches(&city.name, &city.country))
        {
            debug!(name = %city.name, country = %city.country, "Already a favorite");
            return &self.favorites[pos];
        }

        let favorite = FavoriteCity {
            id: self.fresh_id(),
            name: city.name,
            country: city.country,
            lat: city.lat,
            lon: city.lon,
            cached_temp: city.cached_temp,
            cached_condition: city.cached_condition,
        };
        info!(id = %favorite.id, name = %favorite.name, "Added favorite");

        self.favorites.push(favorite);
        self.persist();
        let last = self.favorites.len() - 1;
        &self.favorites[last]
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.favorites.iter().any(|f| f.id == id) {
                return id;
            }
        }
    }

    /// Removes the favorite with `id`; absent ids are ignored.
    pub fn remove(&mut self, id: &str) -> Option<FavoriteCity> {
        let pos = self.favorites.iter().position(|f| f.id == id)?;
        let removed = self.favorites.remove(pos);
        info!(id, name = %removed.name, "Removed favorite");
        self.persist();
        Some(removed)
    }

    /// Puts the current entries in the order of the ids in `new_order`,
    /// which must name each current entry exactly once. Only ids are read;
    /// entry contents always come from the stored list. Anything else is
    /// rejected and the list is left as it was.
    pub fn reorder(&mut self, new_order: Vec<FavoriteCity>) -> Result<(), FavoritesError> {
        if new_order.len() != self.favorites.len() {
            return Err(FavoritesError::NotAPermutation);
        }

        let current: HashSet<&str> = self.favorites.iter().map(|f| f.id.as_str()).collect();
        let proposed: HashSet<&str> = new_order.iter().map(|f| f.id.as_str()).collect();
        if current != proposed || proposed.len() != new_order.len() {
            return Err(FavoritesError::NotAPermutation);
        }

        let mut reordered = Vec::with_capacity(new_order.len());
        for wanted in &new_order {
            match self.favorites.iter().find(|f| f.id == wanted.id) {
                Some(existing) => reordered.push(existing.clone()),
                None => return Err(FavoritesError::NotAPermutation),
            }
        }

        self.favorites = reordered;
        debug!(count = self.favorites.len(), "Reordered favorites");
        self.persist();
        Ok(())
    }

    /// Drag-and-drop reorder: lifts the entry at `from` and reinserts it at
    /// `to`. Dropping in place is a no-op.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), FavoritesError> {
        let len = self.favorites.len();
        for index in [from, to] {
            if index >= len {
                return Err(FavoritesError::OutOfRange { index, len });
            }
        }
        if from == to {
            return Ok(());
        }

        let mut reordered = self.favorites.clone();
        let moved = reordered.remove(from);
        reordered.insert(to, moved);
        self.reorder(reordered)
    }

    /// Records the last observed reading on every entry matching the pair.
    pub fn update_cache(
        &mut self,
        name: &str,
        country: &str,
        temp: i32,
        condition: WeatherCondition,
    ) {
        let mut touched = false;
        for favorite in self.favorites.iter_mut().filter(|f| f.matches(name, country)) {
            favorite.cached_temp = Some(temp);
            favorite.cached_condition = Some(condition);
            touched = true;
        }

        if touched {
            debug!(name, country, temp, %condition, "Updated favorite cache");
            self.persist();
        }
    }

    fn persist(&self) {
        save_json(self.store.as_ref(), FAVORITES_KEY, &self.favorites);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> (FavoritesStore, Arc<MemoryStore>) {
        let backend = Arc::new(MemoryStore::new());
        (FavoritesStore::load(backend.clone()), backend)
    }

    fn paris() -> NewFavorite {
        NewFavorite::new("Paris", "FR", 48.8566, 2.3522)
    }

    fn tokyo() -> NewFavorite {
        NewFavorite::new("Tokyo", "JP", 35.6762, 139.6503)
    }

    fn lima() -> NewFavorite {
        NewFavorite::new("Lima", "PE", -12.0464, -77.0428)
    }

    fn names(store: &FavoritesStore) -> Vec<&str> {
        store.list().iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn add_appends_in_order_with_unique_ids() {
        let (mut favs, _) = store();
        favs.add(paris());
        favs.add(tokyo());

        assert_eq!(names(&favs), ["Paris", "Tokyo"]);
        assert_ne!(favs.list()[0].id, favs.list()[1].id);
        assert!(favs.is_favorite("Tokyo", "JP"));
    }

    #[test]
    fn duplicate_pair_is_ignored() {
        let (mut favs, _) = store();
        let first_id = favs.add(paris()).id.clone();
        let again = favs.add(NewFavorite::new("Paris", "FR", 0.0, 0.0)).id.clone();

        assert_eq!(favs.len(), 1);
        assert_eq!(first_id, again);
        assert_eq!(favs.list()[0].lat, 48.8566);
    }

    #[test]
    fn pair_match_is_exact_and_case_sensitive() {
        let (mut favs, _) = store();
        favs.add(paris());
        favs.add(NewFavorite::new("Paris", "US", 33.66, -95.55));
        favs.add(NewFavorite::new("paris", "FR", 48.8566, 2.3522));

        assert_eq!(favs.len(), 3);
        assert!(!favs.is_favorite("PARIS", "FR"));
    }

    #[test]
    fn no_duplicates_after_any_add_sequence() {
        let (mut favs, _) = store();
        for city in [paris(), tokyo(), paris(), lima(), tokyo(), lima(), paris()] {
            favs.add(city);
        }

        let pairs: HashSet<(&str, &str)> =
            favs.list().iter().map(|f| (f.name.as_str(), f.country.as_str())).collect();
        assert_eq!(pairs.len(), favs.len());
        assert_eq!(favs.len(), 3);
    }

    #[test]
    fn add_then_remove_restores_previous_list() {
        let (mut favs, _) = store();
        favs.add(paris());
        favs.add(tokyo());
        let before = favs.list().to_vec();

        let id = favs.add(lima()).id.clone();
        favs.remove(&id);

        assert_eq!(favs.list(), before.as_slice());
    }

    #[test]
    fn removing_unknown_id_is_a_noop() {
        let (mut favs, _) = store();
        favs.add(paris());

        assert!(favs.remove("missing").is_none());
        assert_eq!(favs.len(), 1);
    }

    #[test]
    fn reorder_is_a_pure_permutation() {
        let (mut favs, _) = store();
        favs.add(paris());
        favs.add(tokyo());
        favs.add(lima());
        let original = favs.list().to_vec();

        let mut reversed = original.clone();
        reversed.reverse();
        favs.reorder(reversed).unwrap();

        assert_eq!(names(&favs), ["Lima", "Tokyo", "Paris"]);
        for entry in favs.list() {
            let same = original.iter().find(|o| o.id == entry.id).unwrap();
            assert_eq!(same, entry);
        }
    }

    #[test]
    fn reorder_ignores_edited_contents() {
        let (mut favs, backend) = store();
        favs.add(paris().with_cache(19, WeatherCondition::Sunny));
        favs.add(tokyo());
        let original = favs.list().to_vec();

        let mut edited = vec![original[1].clone(), original[0].clone()];
        edited[0].name = "Paris".into();
        edited[0].country = "FR".into();
        edited[0].lat = 0.0;
        edited[1].cached_temp = Some(-40);
        favs.reorder(edited).unwrap();

        assert_eq!(favs.list(), [original[1].clone(), original[0].clone()].as_slice());
        assert_eq!(FavoritesStore::load(backend).list(), favs.list());
    }

    #[test]
    fn reorder_rejects_non_permutations() {
        let (mut favs, _) = store();
        favs.add(paris());
        favs.add(tokyo());
        let original = favs.list().to_vec();

        let dropped = vec![original[0].clone()];
        assert_eq!(favs.reorder(dropped), Err(FavoritesError::NotAPermutation));

        let duplicated = vec![original[0].clone(), original[0].clone()];
        assert_eq!(favs.reorder(duplicated), Err(FavoritesError::NotAPermutation));

        let mut foreign = original.clone();
        foreign[1].id = "someone-else".into();
        assert_eq!(favs.reorder(foreign), Err(FavoritesError::NotAPermutation));

        assert_eq!(favs.list(), original.as_slice());
    }

    #[test]
    fn move_item_lifts_and_reinserts() {
        let (mut favs, _) = store();
        favs.add(paris());
        favs.add(tokyo());
        favs.add(lima());

        favs.move_item(0, 2).unwrap();
        assert_eq!(names(&favs), ["Tokyo", "Lima", "Paris"]);

        favs.move_item(2, 0).unwrap();
        assert_eq!(names(&favs), ["Paris", "Tokyo", "Lima"]);

        favs.move_item(1, 1).unwrap();
        assert_eq!(names(&favs), ["Paris", "Tokyo", "Lima"]);

        assert_eq!(favs.move_item(3, 0), Err(FavoritesError::OutOfRange { index: 3, len: 3 }));
    }

    #[test]
    fn update_cache_only_touches_matching_entries() {
        let (mut favs, _) = store();
        favs.add(paris());
        favs.add(tokyo());

        favs.update_cache("Tokyo", "JP", 21, WeatherCondition::Rainy);

        let tokyo = favs.find("Tokyo", "JP").unwrap();
        assert_eq!(tokyo.cached_temp, Some(21));
        assert_eq!(tokyo.cached_condition, Some(WeatherCondition::Rainy));
        let paris = favs.find("Paris", "FR").unwrap();
        assert_eq!(paris.cached_temp, None);
        assert_eq!(paris.cached_condition, None);
    }

    #[test]
    fn update_cache_without_match_changes_nothing() {
        let (mut favs, backend) = store();
        favs.add(paris());
        let before = favs.list().to_vec();
        let persisted = backend.get(FAVORITES_KEY);

        favs.update_cache("Oslo", "NO", -3, WeatherCondition::Snow);

        assert_eq!(favs.list(), before.as_slice());
        assert_eq!(backend.get(FAVORITES_KEY), persisted);
    }

    #[test]
    fn list_survives_reload() {
        let (mut favs, backend) = store();
        favs.add(paris().with_cache(19, WeatherCondition::Sunny));
        favs.add(tokyo());
        favs.move_item(1, 0).unwrap();

        let reloaded = FavoritesStore::load(backend);
        assert_eq!(reloaded.list(), favs.list());
    }

    #[test]
    fn persisted_entries_use_camel_case_and_omit_empty_cache() {
        let (mut favs, backend) = store();
        favs.add(paris().with_cache(19, WeatherCondition::NightCloudy));
        favs.add(tokyo());

        let raw: serde_json::Value =
            serde_json::from_str(&backend.get(FAVORITES_KEY).unwrap()).unwrap();
        assert_eq!(raw[0]["cachedTemp"], 19);
        assert_eq!(raw[0]["cachedCondition"], "night-cloudy");
        assert!(raw[1].get("cachedTemp").is_none());
    }

    #[test]
    fn fractional_cached_temp_is_rounded_on_load() {
        let backend = Arc::new(MemoryStore::new());
        backend.set(
            FAVORITES_KEY,
            r#"[
                {"id": "a", "name": "Paris", "country": "FR", "lat": 48.85, "lon": 2.35,
                 "cachedTemp": 21.5, "cachedCondition": "sunny"},
                {"id": "b", "name": "Tokyo", "country": "JP", "lat": 35.67, "lon": 139.65,
                 "cachedTemp": -3.4},
                {"id": "c", "name": "Lima", "country": "PE", "lat": -12.04, "lon": -77.04,
                 "cachedTemp": null}
            ]"#,
        );

        let mut favs = FavoritesStore::load(backend.clone());
        assert_eq!(names(&favs), ["Paris", "Tokyo", "Lima"]);
        assert_eq!(favs.list()[0].cached_temp, Some(22));
        assert_eq!(favs.list()[1].cached_temp, Some(-3));
        assert_eq!(favs.list()[2].cached_temp, None);

        favs.add(NewFavorite::new("Oslo", "NO", 59.91, 10.75));
        assert_eq!(FavoritesStore::load(backend).len(), 4);
    }

    #[test]
    fn corrupt_storage_loads_empty() {
        let backend = Arc::new(MemoryStore::new());
        backend.set(FAVORITES_KEY, "[{\"id\": 1");

        let favs = FavoritesStore::load(backend);
        assert!(favs.is_empty());
    }
}
