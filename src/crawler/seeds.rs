//! Common investor-relations and press paths used for auto-seeding

use url::Url;

/// Paths tried on the root host when auto-seeding is enabled
pub const AUTO_SEED_PATHS: &[&str] = &[
    "/ir",
    "/investors",
    "/investerare",
    "/investor-relations",
    "/press",
    "/press-releases",
    "/pressmeddelanden",
    "/news",
    "/nyheter",
    "/media",
    "/reports",
    "/financial-reports",
    "/rapporter",
    "/rapporter-och-presentationer",
    "/annual-report",
    "/arsredovisning",
    "/delarsrapporter",
    "/bolagsstyrning",
    "/corporate-governance",
    "/documents",
    "/dokument",
];

/// Builds the auto-seed URLs for the root seed's origin
pub fn auto_seed_urls(root: &Url) -> Vec<Url> {
    AUTO_SEED_PATHS
        .iter()
        .filter_map(|path| root.join(path).ok())
        .collect()
}
