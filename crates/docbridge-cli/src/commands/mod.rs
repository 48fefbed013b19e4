pub mod read;
pub mod write;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use docbridge::{AdapterSpec, InMemoryCounters};
use docbridge_local::LocalFactory;
use docbridge_types::settings::keys;
use docbridge_types::{Fields, Settings};

/// Arguments shared by every task command.
#[derive(Args, Debug)]
pub struct TaskArgs {
    /// Store root directory (one `.jsonl` file per resource)
    #[arg(long)]
    pub store: PathBuf,
    /// Resource to read from or write to
    #[arg(short, long)]
    pub resource: String,
    /// Tuple fields, e.g. `name,age:long`
    #[arg(short, long)]
    pub fields: Option<String>,
    /// Field aliases, e.g. `name:user.name` (repeatable)
    #[arg(short, long)]
    pub alias: Vec<String>,
    /// YAML settings file (supports `${VAR}` substitution)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Extra setting as `key=value` (repeatable, overrides --config)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub settings: Vec<String>,
}

impl TaskArgs {
    pub fn factory(&self) -> LocalFactory {
        LocalFactory::new(&self.store)
    }

    pub fn fields(&self) -> Result<Fields> {
        Fields::parse(self.fields.as_deref().unwrap_or_default())
            .context("Invalid --fields")
    }

    /// Engine-side task configuration: settings file, then `--set` pairs.
    pub fn task_config(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_yaml_file(path)
                .with_context(|| format!("Failed to load settings: {}", path.display()))?,
            None => Settings::new(),
        };
        for pair in &self.settings {
            let (key, value) = parse_setting(pair)?;
            settings = settings.with(key, value);
        }
        Ok(settings)
    }

    /// Adapter description with aliases as adapter-local properties.
    pub fn spec(&self) -> Result<AdapterSpec> {
        let mut spec = AdapterSpec::new(self.resource.clone()).fields(self.fields()?);
        if !self.alias.is_empty() {
            spec = spec.props(Settings::new().with(keys::MAPPING_NAMES, self.alias.join(",")));
        }
        Ok(spec)
    }
}

fn parse_setting(pair: &str) -> Result<(&str, &str)> {
    pair.split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .with_context(|| format!("Invalid --set '{pair}', expected KEY=VALUE"))
}

/// Print non-zero pipeline counters to stderr.
pub fn print_counters(counters: &InMemoryCounters) {
    let snapshot = counters.snapshot();
    eprintln!("Counters:");
    for (counter, value) in snapshot.entries().filter(|(_, v)| *v > 0) {
        eprintln!("  {:16} {value}", format!("{counter}:"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(alias: &[&str], settings: &[&str]) -> TaskArgs {
        TaskArgs {
            store: PathBuf::from("/tmp/store"),
            resource: "people".into(),
            fields: Some("name, age:long".into()),
            alias: alias.iter().map(|s| (*s).to_string()).collect(),
            config: None,
            settings: settings.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn set_pairs_become_task_config() {
        let config = args(&[], &["store.format=legacy", " store.port = 9300 "])
            .task_config()
            .unwrap();
        assert_eq!(config.get(keys::FORMAT), Some("legacy"));
        assert_eq!(config.port().unwrap(), 9300);
    }

    #[test]
    fn malformed_set_pair_is_rejected() {
        assert!(args(&[], &["no-equals"]).task_config().is_err());
        assert!(args(&[], &["=value"]).task_config().is_err());
    }

    #[test]
    fn aliases_join_into_mapping_names() {
        let spec = args(&["name:user.name", "age:user.age"], &[]).spec().unwrap();
        assert_eq!(
            spec.props.get(keys::MAPPING_NAMES),
            Some("name:user.name,age:user.age")
        );
        assert_eq!(spec.fields.as_slice().len(), 2);
    }
}
