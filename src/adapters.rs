pub mod profile_api;

pub use profile_api::HttpProfileService;
