#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::similar_names)]

//! Curve and surface geometry for seeding structured meshes.
//!
//! Everything lives under [`geom`]: vector primitives, cubic Hermite curve
//! interpolation, sampling and smoothing, ellipse and ellipsoid geometry, and
//! the [`geom::TrackSurface`] for locating, projecting and tracking positions
//! over a bicubic Hermite lattice.

pub mod geom;

cfg_if::cfg_if! {
    if #[cfg(feature = "debug_logs")] {
        /// Install an `env_logger` backend at debug level.
        ///
        /// Safe to call more than once; later calls are ignored.
        pub fn init_logger() {
            let _ = env_logger::Builder::from_default_env()
                .filter_level(log::LevelFilter::Debug)
                .is_test(cfg!(test))
                .try_init();
        }
    } else {
        pub fn init_logger() {
            // no-op fallback when debug logs are disabled
        }
    }
}
