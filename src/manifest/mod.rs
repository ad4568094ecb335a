// ABOUTME: Manifest resolution - layered override levels merged into one ManifestPackage.
// ABOUTME: Also renders application names and extracts instance ceilings from manifest content.

mod vars;

pub use vars::{has_tokens, substitute, substitute_required, variable_value};

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{ConfigError, Result};
use crate::types::{AppName, NamePolicy};

/// Manifest name placeholder written by older pipelines; substituted with
/// the caller's fallback prefix.
pub const LEGACY_NAME_PLACEHOLDER: &str = "${APPLICATION_NAME}";
/// Generic name placeholder; substituted with the caller's fallback prefix.
pub const GENERIC_NAME_PLACEHOLDER: &str = "((APP_NAME))";
/// Instance-count placeholder written by older pipelines; substituted with
/// the caller's fallback count.
pub const LEGACY_INSTANCE_PLACEHOLDER: &str = "${INSTANCE_COUNT}";

const APPLICATIONS_KEY: &str = "applications";
const NAME_KEY: &str = "name";
const INSTANCES_KEY: &str = "instances";
const PROCESSES_KEY: &str = "processes";
const PROCESS_TYPE_KEY: &str = "type";
const WEB_PROCESS_TYPE: &str = "web";

/// Where an override level's manifest content came from. The resolver treats
/// all three uniformly; callers populate them from different stores.
#[derive(Debug, Clone)]
pub enum ManifestSource {
    /// File contents attached inline to the service definition.
    Inline(Vec<String>),
    /// File contents fetched from a git repository ahead of the phase.
    Fetched(Vec<String>),
    /// File contents produced by a custom fetch task.
    Custom(Vec<String>),
}

impl ManifestSource {
    fn files(&self) -> &[String] {
        match self {
            ManifestSource::Inline(files)
            | ManifestSource::Fetched(files)
            | ManifestSource::Custom(files) => files,
        }
    }
}

/// Override levels, least specific first. The most specific level present
/// wins outright; levels are never field-merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OverrideLevel {
    Service,
    EnvironmentGlobal,
    Environment,
}

impl fmt::Display for OverrideLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideLevel::Service => write!(f, "Service"),
            OverrideLevel::EnvironmentGlobal => write!(f, "Environment Global"),
            OverrideLevel::Environment => write!(f, "Environment"),
        }
    }
}

/// Whether multiple manifest candidates at the winning level are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Enforcement {
    /// Exactly one manifest per level; anything else is a configuration error.
    Strict,
    /// Pick one candidate (legacy behavior; selection among several is
    /// deliberately unspecified).
    #[default]
    Lenient,
}

/// What kind of document a manifest file is, judged by its YAML shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Application,
    Variables,
    Autoscaler,
}

/// Classify one file's content. Returns `None` for unparseable content or
/// shapes that are none of the three kinds.
pub fn classify(content: &str) -> Option<ManifestKind> {
    let doc: Value = serde_yaml::from_str(content).ok()?;
    let map = doc.as_mapping()?;

    if get_ci(map, APPLICATIONS_KEY).is_some() {
        return Some(ManifestKind::Application);
    }
    if get_ci(map, "instance_limits").is_some() || get_ci(map, "rules").is_some() {
        return Some(ManifestKind::Autoscaler);
    }
    if !map.is_empty()
        && map
            .values()
            .all(|v| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null))
    {
        return Some(ManifestKind::Variables);
    }
    None
}

/// The rendered output of manifest resolution: one application manifest,
/// the ordered variable documents that accompany it, and an optional
/// autoscaler document. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPackage {
    pub manifest_yml: String,
    pub variable_ymls: Vec<String>,
    pub autoscaler_yml: Option<String>,
}

impl ManifestPackage {
    /// Merge layered sources into one package. The most specific level
    /// present supplies the manifest, variable files, and autoscaler
    /// document; less specific levels are ignored entirely.
    pub fn resolve(
        sources: &BTreeMap<OverrideLevel, ManifestSource>,
        enforcement: Enforcement,
    ) -> Result<Self> {
        // BTreeMap iterates least specific first; the last entry wins.
        let (level, source) = sources
            .iter()
            .next_back()
            .ok_or(ConfigError::NoManifestAtLevel(OverrideLevel::Service))?;

        let mut applications = Vec::new();
        let mut variables = Vec::new();
        let mut autoscaler = None;

        for content in source.files() {
            match classify(content) {
                Some(ManifestKind::Application) => applications.push(content.clone()),
                Some(ManifestKind::Variables) => variables.push(content.clone()),
                Some(ManifestKind::Autoscaler) => autoscaler = Some(content.clone()),
                None => debug!(level = %level, "skipping unrecognized manifest file"),
            }
        }

        let manifest_yml = match (applications.len(), enforcement) {
            (0, _) => return Err(ConfigError::NoManifestAtLevel(*level)),
            (1, _) => applications.pop().expect("one candidate"),
            (_, Enforcement::Strict) => return Err(ConfigError::AmbiguousManifest(*level)),
            (n, Enforcement::Lenient) => {
                warn!(level = %level, candidates = n, "multiple manifests at level, selecting one");
                applications.pop().expect("at least one candidate")
            }
        };

        Ok(Self {
            manifest_yml,
            variable_ymls: variables,
            autoscaler_yml: autoscaler,
        })
    }

    /// The first application entry of the manifest, keys compared
    /// case-insensitively. The first entry is always the application being
    /// deployed.
    pub fn application_map(&self) -> Result<Mapping> {
        application_map_of(&self.manifest_yml)
    }

    /// Derive the application name. Literal names pass through, placeholder
    /// names collapse to `fallback_prefix`, `((VAR))` tokens resolve against
    /// the variable documents, and the result is normalized per `policy`.
    ///
    /// Pure: identical inputs always produce identical output.
    pub fn fetch_application_name(
        &self,
        fallback_prefix: &str,
        policy: NamePolicy,
    ) -> Result<AppName> {
        let app = self.application_map()?;
        let declared = get_ci(&app, NAME_KEY).and_then(Value::as_str).unwrap_or("");

        let name = if declared.trim().is_empty() {
            fallback_prefix.to_string()
        } else {
            let declared = declared
                .replace(LEGACY_NAME_PLACEHOLDER, fallback_prefix)
                .replace(GENERIC_NAME_PLACEHOLDER, fallback_prefix);
            substitute(&declared, &self.variable_ymls)?
        };

        AppName::normalized(&name, policy)
            .map_err(|e| ConfigError::MissingApplicationName(e.to_string()))
    }

    /// Read the manifest's instance ceiling. A `processes:` entry of type
    /// `web` takes precedence over the top-level `instances:` key. Literal
    /// integers pass through, the legacy placeholder (or a missing value)
    /// collapses to `fallback_count`, and `((VAR))` values resolve against
    /// the variable documents - failing when no variable document exists.
    pub fn fetch_max_count(&self, fallback_count: u32) -> Result<u32> {
        let app = self.application_map()?;

        let raw = match instance_count_value(&app) {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };

        if raw.trim().is_empty() || raw == LEGACY_INSTANCE_PLACEHOLDER {
            return Ok(fallback_count);
        }

        let resolved = substitute_required(&raw, &self.variable_ymls)?;
        resolved
            .parse()
            .map_err(|_| ConfigError::InvalidInstanceCount { value: resolved })
    }
}

/// Parse manifest content and return its first application entry.
pub fn application_map_of(manifest_yml: &str) -> Result<Mapping> {
    let doc: Value = serde_yaml::from_str(manifest_yml)?;
    let apps = doc
        .as_mapping()
        .and_then(|m| get_ci(m, APPLICATIONS_KEY))
        .and_then(Value::as_sequence)
        .cloned()
        .unwrap_or_default();

    let apps: Vec<Mapping> = apps
        .into_iter()
        .filter_map(|v| v.as_mapping().cloned())
        .collect();
    let apps = NonEmpty::from_vec(apps).ok_or(ConfigError::NoApplications)?;
    Ok(apps.head)
}

/// Case-insensitive lookup in a YAML mapping.
pub fn get_ci<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_str().is_some_and(|k| k.eq_ignore_ascii_case(key)))
        .map(|(_, v)| v)
}

/// The instance count for the web process, falling back to the top-level
/// `instances:` key when no web process is declared.
fn instance_count_value(app: &Mapping) -> Option<Value> {
    if let Some(processes) = get_ci(app, PROCESSES_KEY).and_then(Value::as_sequence) {
        let web = processes.iter().filter_map(Value::as_mapping).find(|p| {
            get_ci(p, PROCESS_TYPE_KEY)
                .and_then(Value::as_str)
                .is_some_and(|t| t == WEB_PROCESS_TYPE)
        });
        if let Some(web) = web {
            return get_ci(web, INSTANCES_KEY).cloned();
        }
    }
    get_ci(app, INSTANCES_KEY).cloned()
}
