//! Authority extraction from provider role claims.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::jwt::claims::DecodedClaims;

/// Fallback granted to every validated identity that carries no role data,
/// so a successfully authenticated principal always has at least one
/// authority.
pub const DEFAULT_AUTHORITY: &str = "ROLE_USER";

/// Maps provider-specific role claims to normalized authority strings.
///
/// Keeping the claim shape behind this trait is what lets the rest of the
/// pipeline stay provider-agnostic: swapping identity providers means
/// swapping the mapper, not the orchestrator.
pub trait AuthorityMapper: Send + Sync {
    /// Extract the authority set for a validated identity. Never fails;
    /// an identity without role data still receives [`DEFAULT_AUTHORITY`].
    fn authorities(&self, claims: &DecodedClaims) -> BTreeSet<String>;
}

/// Mapper for Keycloak's realm/resource role layout.
///
/// `realm_access.roles[]` entries become `ROLE_<NAME>`, and
/// `resource_access.<client>.roles[]` entries become
/// `ROLE_<CLIENT>_<NAME>`; names are uppercased and the results unioned.
#[derive(Debug, Clone, Default)]
pub struct KeycloakAuthorityMapper;

impl AuthorityMapper for KeycloakAuthorityMapper {
    fn authorities(&self, claims: &DecodedClaims) -> BTreeSet<String> {
        let mut authorities = BTreeSet::new();

        if let Some(realm) = claims.object_claim("realm_access") {
            for role in string_entries(realm.get("roles")) {
                authorities.insert(format!("ROLE_{}", role.to_uppercase()));
            }
        }

        if let Some(resources) = claims.object_claim("resource_access") {
            for (client, access) in resources {
                for role in string_entries(access.get("roles")) {
                    authorities.insert(format!(
                        "ROLE_{}_{}",
                        client.to_uppercase(),
                        role.to_uppercase()
                    ));
                }
            }
        }

        if authorities.is_empty() {
            authorities.insert(DEFAULT_AUTHORITY.to_owned());
        }
        authorities
    }
}

fn string_entries<'a>(value: Option<&'a Value>) -> impl Iterator<Item = &'a str> + 'a {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}
