// This file is part of gateway-qos.
//
// Copyright (C) 2026 The Gateway Team.
//
// gateway-qos is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// gateway-qos is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License
// for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with gateway-qos. If not, see <https://www.gnu.org/licenses/>.

//! Shared primitives used across the crate.

use rand::seq::SliceRandom;
use std::time::{SystemTime, UNIX_EPOCH};

pub use parking_lot::{Mutex, RwLock};

/// Pick one element uniformly at random.
/// Returns `None` if the slice is empty.
pub fn pick_random<T>(items: &[T]) -> Option<&T> {
    items.choose(&mut rand::thread_rng())
}

/// Seconds elapsed since the unix epoch, zero for instants preceding it.
pub fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
