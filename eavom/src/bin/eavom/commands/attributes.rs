use anyhow::{Context, Result, anyhow};
use clap::{Args, Subcommand};
use eavom::{Attribute, DEFAULT_ATTRIBUTE_NAMESPACE, EavStore};
use serde::Serialize;

use crate::context::{AttributeSpec, ProjectContext};
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Inspect",
        commands: &[
            "eavom attributes list",
            "eavom attributes list --namespace encounter_attributes",
            "eavom attributes list --entity-type patient --output json",
        ],
    },
    ExampleGroup {
        title: "Sync from config",
        commands: &["eavom attributes apply"],
    },
];

#[derive(Subcommand)]
pub enum AttributeCommands {
    /// List attribute definitions
    List(ListArgs),
    /// Create or update the attributes declared in the config file
    Apply,
}

#[derive(Args)]
pub struct ListArgs {
    /// Attribute table to read from
    #[arg(long, default_value = DEFAULT_ATTRIBUTE_NAMESPACE)]
    pub namespace: String,

    /// Only attributes applicable to this entity type
    #[arg(long)]
    pub entity_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct AttributeList(pub Vec<Attribute>);

impl TableDisplay for AttributeList {
    fn headers(&self) -> Vec<&'static str> {
        vec!["Id", "Slug", "Name", "Datatype", "Required", "Site", "Parent"]
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.0
            .iter()
            .map(|attribute| {
                vec![
                    attribute.id.map(|id| id.to_string()).unwrap_or_default(),
                    attribute.slug.clone(),
                    attribute.name.clone(),
                    attribute.datatype.label().to_string(),
                    if attribute.required { "yes" } else { "no" }.to_string(),
                    attribute.site.clone().unwrap_or_else(|| "-".into()),
                    attribute.parent.clone().unwrap_or_else(|| "*".into()),
                ]
            })
            .collect()
    }

    fn to_compact(&self) -> String {
        self.0
            .iter()
            .map(|attribute| format!("{}:{}", attribute.slug, attribute.datatype))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn handle_attribute_commands(
    command: AttributeCommands,
    context: &ProjectContext,
    output: &OutputManager,
) -> Result<()> {
    let store = context.open_store()?;
    match command {
        AttributeCommands::List(args) => {
            let attributes = match args.entity_type.as_deref() {
                Some(entity_type) => Attribute::get_for_model(&store, &args.namespace, entity_type)?,
                None => store.attributes(&args.namespace)?,
            };
            output.display(&AttributeList(attributes))
        }
        AttributeCommands::Apply => apply(&store, &context.config.attributes, output),
    }
}

/// Turns a declared attribute into a definition, updating the stored one
/// with the same slug and scope when it exists.
pub fn resolve_attribute(store: &dyn EavStore, spec: &AttributeSpec) -> Result<Attribute> {
    let enum_group = match spec.enum_group.as_deref() {
        Some(name) => Some(
            store
                .enum_group_by_name(name)?
                .ok_or_else(|| anyhow!("enum group '{name}' does not exist; run `eavom enums apply` first"))?
                .require_id()?,
        ),
        None => None,
    };

    let mut attribute = Attribute::new(&spec.name, spec.datatype).in_namespace(&spec.namespace);
    if let Some(slug) = &spec.slug {
        attribute.slug = slug.clone();
    } else {
        attribute.slug = eavom::slug::slug_from_name(&spec.name);
    }

    if let Some(existing) = store.attributes(&spec.namespace)?.into_iter().find(|existing| {
        existing.slug == attribute.slug && existing.site == spec.site && existing.parent == spec.parent
    }) {
        attribute = existing;
        attribute.name = spec.name.clone();
        attribute.datatype = spec.datatype;
    }

    attribute.required = spec.required;
    attribute.description = spec.description.clone();
    attribute.enum_group = enum_group;
    attribute.site = spec.site.clone();
    attribute.parent = spec.parent.clone();
    attribute.rules = spec.rules.clone();
    Ok(attribute)
}

/// Applies every declared attribute. Failures are collected so one bad
/// entry does not stop the rest.
pub fn apply_attributes(store: &dyn EavStore, specs: &[AttributeSpec]) -> (Vec<Attribute>, Vec<anyhow::Error>) {
    let mut saved = Vec::new();
    let mut failures = Vec::new();
    for spec in specs {
        let result = resolve_attribute(store, spec).and_then(|mut attribute| {
            attribute.save(store)?;
            Ok(attribute)
        });
        match result.with_context(|| format!("attribute '{}' in {}", spec.name, spec.namespace)) {
            Ok(attribute) => saved.push(attribute),
            Err(err) => failures.push(err),
        }
    }
    (saved, failures)
}

fn apply(store: &dyn EavStore, specs: &[AttributeSpec], output: &OutputManager) -> Result<()> {
    if specs.is_empty() {
        output.warning("No [[attributes]] declared in the config file.");
        return Ok(());
    }

    let (saved, failures) = apply_attributes(store, specs);
    for attribute in &saved {
        output.verbose(&format!("saved {attribute} in {}", attribute.namespace));
    }
    if !failures.is_empty() {
        output.heading("Failed attributes");
        for failure in &failures {
            output.bullet(&format!("{failure:#}"));
        }
        anyhow::bail!("{} of {} attributes could not be applied", failures.len(), specs.len());
    }

    output.success(&format!("{} attributes applied", saved.len()));
    Ok(())
}
