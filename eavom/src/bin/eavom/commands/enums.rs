use anyhow::{Context, Result};
use clap::Subcommand;
use eavom::{EavStore, EnumGroup, EnumValue};
use serde::Serialize;

use crate::context::{EnumGroupSpec, ProjectContext};
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Inspect",
        commands: &["eavom enums list", "eavom --output json enums list"],
    },
    ExampleGroup {
        title: "Sync from config",
        commands: &["eavom enums apply", "eavom --config ./clinic.toml enums apply"],
    },
];

#[derive(Subcommand)]
pub enum EnumCommands {
    /// List enum groups and their values
    List,
    /// Create the enum groups and values declared in the config file
    Apply,
}

#[derive(Debug, Serialize)]
pub struct EnumGroupRow {
    pub id: u64,
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct EnumGroupList(pub Vec<EnumGroupRow>);

impl TableDisplay for EnumGroupList {
    fn headers(&self) -> Vec<&'static str> {
        vec!["Id", "Group", "Values"]
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.0
            .iter()
            .map(|group| vec![group.id.to_string(), group.name.clone(), group.values.join(", ")])
            .collect()
    }

    fn to_compact(&self) -> String {
        self.0
            .iter()
            .map(|group| format!("{}: {}", group.name, group.values.join(",")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn handle_enum_commands(command: EnumCommands, context: &ProjectContext, output: &OutputManager) -> Result<()> {
    let store = context.open_store()?;
    match command {
        EnumCommands::List => list(&store, output),
        EnumCommands::Apply => apply(&store, &context.config.enum_groups, output),
    }
}

fn list(store: &dyn EavStore, output: &OutputManager) -> Result<()> {
    let mut rows = Vec::new();
    for group in store.enum_groups()? {
        let values = group.members(store)?.into_iter().map(|value| value.value).collect();
        rows.push(EnumGroupRow {
            id: group.require_id()?.0,
            name: group.name,
            values,
        });
    }
    output.display(&EnumGroupList(rows))
}

#[derive(Debug, Default, PartialEq)]
pub struct ApplySummary {
    pub groups_created: usize,
    pub values_created: usize,
    pub values_moved: usize,
}

/// Makes the store contain every declared group and value. Existing values that
/// belong to another group are moved into the declared one.
pub fn apply_enum_groups(store: &dyn EavStore, specs: &[EnumGroupSpec]) -> Result<ApplySummary> {
    let mut summary = ApplySummary::default();
    for spec in specs {
        let group = match store.enum_group_by_name(&spec.name)? {
            Some(group) => group,
            None => {
                let mut group = EnumGroup::new(&spec.name);
                group
                    .save(store)
                    .with_context(|| format!("enum group '{}'", spec.name))?;
                summary.groups_created += 1;
                group
            }
        };
        let group_id = group.require_id()?;

        for raw in &spec.values {
            match store.enum_value_by_value(raw)? {
                Some(existing) if existing.group == Some(group_id) => {}
                Some(mut existing) => {
                    group
                        .add(store, &mut existing)
                        .with_context(|| format!("enum value '{raw}'"))?;
                    summary.values_moved += 1;
                }
                None => {
                    group
                        .add(store, &mut EnumValue::new(raw))
                        .with_context(|| format!("enum value '{raw}'"))?;
                    summary.values_created += 1;
                }
            }
        }
    }
    Ok(summary)
}

fn apply(store: &dyn EavStore, specs: &[EnumGroupSpec], output: &OutputManager) -> Result<()> {
    if specs.is_empty() {
        output.warning("No [[enum_groups]] declared in the config file.");
        return Ok(());
    }
    output.verbose(&format!("applying {} enum groups", specs.len()));
    let summary = apply_enum_groups(store, specs)?;
    output.success(&format!(
        "Enum groups applied: {} groups created, {} values created, {} values moved",
        summary.groups_created, summary.values_created, summary.values_moved
    ));
    Ok(())
}
