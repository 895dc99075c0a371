use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::TripLocations;

/// Cities trips are said to start and end in
pub const CITY_POOL: &[&str] = &[
    "Helsinki",
    "Espoo",
    "Tampere",
    "Vantaa",
    "Oulu",
    "Turku",
    "Jyväskylä",
    "Lahti",
    "Kuopio",
    "Pori",
];

/// Pick two different cities from the pool
pub fn pick_locations<R: Rng>(rng: &mut R) -> TripLocations {
    let mut picked = CITY_POOL.choose_multiple(rng, 2);
    // Sampled without replacement
    let start_location = picked.next().copied().unwrap_or(CITY_POOL[0]);
    let end_location = picked.next().copied().unwrap_or(CITY_POOL[1]);

    TripLocations {
        start_location: start_location.to_string(),
        end_location: end_location.to_string(),
    }
}
