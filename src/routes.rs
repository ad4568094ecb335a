// ABOUTME: Route derivation from manifest content and infrastructure defaults.
// ABOUTME: Covers no-route declarations and blue/green temporary-route conventions.

use serde_yaml::Value;

use crate::error::{ConfigError, Result};
use crate::manifest::{self, ManifestPackage};

const NO_ROUTE_KEY: &str = "no-route";
const ROUTES_KEY: &str = "routes";
const ROUTE_KEY: &str = "route";

/// Route lists an infrastructure definition supplies when the manifest
/// declares none.
#[derive(Debug, Clone, Default)]
pub struct InfraRoutes {
    pub routes: Vec<String>,
    pub temp_routes: Vec<String>,
}

/// Whether the application opted out of routing entirely.
pub fn declares_no_route(manifest_yml: &str) -> Result<bool> {
    let app = manifest::application_map_of(manifest_yml)?;
    Ok(manifest::get_ci(&app, NO_ROUTE_KEY)
        .and_then(Value::as_bool)
        .unwrap_or(false))
}

/// Derive the route list for an application.
///
/// An explicit `routes:` block wins outright over infrastructure defaults;
/// `no-route: true` forces an empty result regardless of defaults; absence
/// of any declaration falls back to the infrastructure routes. The result
/// is always a list, never absent.
pub fn route_maps(manifest_yml: &str, infra_routes: &[String]) -> Result<Vec<String>> {
    let app = manifest::application_map_of(manifest_yml)?;

    if manifest::get_ci(&app, NO_ROUTE_KEY)
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return Ok(Vec::new());
    }

    match manifest::get_ci(&app, ROUTES_KEY) {
        None | Some(Value::Null) => Ok(infra_routes.to_vec()),
        Some(declared) => parse_route_block(declared),
    }
}

fn parse_route_block(declared: &Value) -> Result<Vec<String>> {
    let entries = declared
        .as_sequence()
        .ok_or(ConfigError::InvalidRouteFormat)?;

    entries
        .iter()
        .map(|entry| {
            entry
                .as_mapping()
                .and_then(|m| manifest::get_ci(m, ROUTE_KEY))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(ConfigError::InvalidRouteFormat)
        })
        .collect()
}

/// Resolve `((VAR))` tokens embedded in route strings against the package's
/// variable documents.
pub fn apply_variable_substitution(
    routes: Vec<String>,
    package: &ManifestPackage,
) -> Result<Vec<String>> {
    routes
        .into_iter()
        .filter(|r| !r.is_empty())
        .map(|r| manifest::substitute(&r, &package.variable_ymls))
        .collect()
}

/// The final route set for a blue/green swap: manifest-derived routes plus
/// any final-route override from the phase. An empty union means the phase
/// has no routing information at all, which is fatal.
pub fn final_routes(
    derived: &[String],
    override_routes: &[String],
    service: &str,
) -> Result<Vec<String>> {
    let mut all: Vec<String> = derived.to_vec();
    for route in override_routes {
        if !all.contains(route) {
            all.push(route.clone());
        }
    }
    if all.is_empty() {
        return Err(ConfigError::MissingRoutes {
            service: service.to_string(),
        });
    }
    Ok(all)
}

/// The temporary route set for a blue/green swap: the phase override wins,
/// else the infrastructure's temporary defaults.
pub fn temp_routes(phase_override: Option<&[String]>, infra: &InfraRoutes) -> Vec<String> {
    match phase_override {
        Some(routes) if !routes.is_empty() => routes.to_vec(),
        _ => infra.temp_routes.clone(),
    }
}
