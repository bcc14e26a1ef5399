/// Platform name constants to ensure consistency across the codebase.
/// These are the keys used in `platformMappings` and in the sender registry.

pub const FACEBOOK_PLATFORM: &str = "facebook";
pub const GA4_PLATFORM: &str = "ga4";
pub const GOOGLE_ADS_PLATFORM: &str = "googleAds";

/// Version literal stamped on every generated config. No semantic
/// versioning logic exists yet; re-compilation replaces the artifact wholesale.
pub const CONFIG_VERSION: &str = "1.0.0";

/// The GTM macro parameter key that binds a variable to a dataLayer path.
pub const DATA_LAYER_VARIABLE_KEY: &str = "dataLayerVariable";

/// Currency fallback written into purchase mappings when the container
/// defines no currency macro.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Variable-name prefixes that are trusted to already be dataLayer keys.
/// Matching is case-insensitive against the start of the name.
pub const KNOWN_DATA_LAYER_PREFIXES: &[&str] = &[
    "event",
    "page",
    "ecommerce",
    "user",
    "google_tag_params",
    "enhanced ecommerce data",
];

/// Get all platforms a generated config may target
pub fn supported_platforms() -> Vec<&'static str> {
    vec![FACEBOOK_PLATFORM, GA4_PLATFORM, GOOGLE_ADS_PLATFORM]
}
