/// Role given to directors whose program has no dedicated role.
pub const DEFAULT_ROLE: &str = "subscriber";

/// Program category slug to user role.
const PROGRAM_ROLES: [(&str, &str); 7] = [
    ("bhwet-para", "bhwet-para-user"),
    ("bhwet-pro", "bhwet-pro-user"),
    ("bhwet-social", "bhwet-social-user"),
    ("gpe", "gpe-user"),
    ("istp", "istp-user"),
    ("oifsp", "oifsp-user"),
    ("amf", "amf-user"),
];

pub fn map_role(category: &str) -> &'static str {
    PROGRAM_ROLES
        .iter()
        .find(|(slug, _)| *slug == category)
        .map_or(DEFAULT_ROLE, |(_, role)| *role)
}

/// Category slugs that have a dedicated role.
pub fn known_categories() -> impl Iterator<Item = &'static str> {
    PROGRAM_ROLES.iter().map(|(slug, _)| *slug)
}
