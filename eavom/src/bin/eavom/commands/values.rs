use std::collections::BTreeMap;

use anyhow::Result;
use clap::Args;
use eavom::{AttrValue, DEFAULT_ATTRIBUTE_NAMESPACE, EavStore, Value};
use serde::Serialize;

use crate::context::ProjectContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Inspect one entity",
    commands: &[
        "eavom values show --value-type patient_values --entity 42",
        "eavom values show --value-type encounter_values --entity e-7 --namespace encounter_attributes",
    ],
}];

#[derive(Args)]
pub struct ShowArgs {
    /// Value table the entity's values are stored in
    #[arg(long)]
    pub value_type: String,

    /// Entity id
    #[arg(long)]
    pub entity: String,

    /// Attribute table the values refer to
    #[arg(long, default_value = DEFAULT_ATTRIBUTE_NAMESPACE)]
    pub namespace: String,
}

#[derive(Debug, Serialize)]
pub struct ValueLine {
    pub slug: String,
    pub datatype: String,
    pub value: Option<AttrValue>,
    pub display: String,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ValueList(pub Vec<ValueLine>);

impl TableDisplay for ValueList {
    fn headers(&self) -> Vec<&'static str> {
        vec!["Attribute", "Datatype", "Value"]
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.0
            .iter()
            .map(|line| vec![line.slug.clone(), line.datatype.clone(), line.display.clone()])
            .collect()
    }

    fn to_compact(&self) -> String {
        self.0
            .iter()
            .map(|line| format!("{}={}", line.slug, line.display))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn handle_show(args: ShowArgs, context: &ProjectContext, output: &OutputManager) -> Result<()> {
    let store = context.open_store()?;
    output.verbose(&format!("reading {} for entity {}", args.value_type, args.entity));
    let lines = collect_values(&store, &args)?;
    output.display(&ValueList(lines))
}

/// Stored values of one entity, sorted by slug. Rows whose attribute is gone are skipped.
pub fn collect_values(store: &dyn EavStore, args: &ShowArgs) -> Result<Vec<ValueLine>> {
    let attributes: BTreeMap<_, _> = store
        .attributes(&args.namespace)?
        .into_iter()
        .filter_map(|attribute| attribute.id.map(|id| (id, attribute)))
        .collect();

    let mut lines = Vec::new();
    for row in store.value_rows(&args.value_type, &args.entity)? {
        let Some(attribute) = attributes.get(&row.attribute_id) else {
            log::warn!("value row for unknown attribute {} skipped", row.attribute_id);
            continue;
        };
        let value = Value::from_row(row, attribute.clone());
        let display = match value.value() {
            Some(stored) => display_value(store, stored)?,
            None => String::new(),
        };
        lines.push(ValueLine {
            slug: attribute.slug.clone(),
            datatype: attribute.datatype.as_str().to_string(),
            value: value.value().cloned(),
            display,
        });
    }
    lines.sort_by(|left, right| left.slug.cmp(&right.slug));
    Ok(lines)
}

fn display_value(store: &dyn EavStore, value: &AttrValue) -> Result<String> {
    let AttrValue::Enum(choice) = value else {
        return Ok(value.to_string());
    };
    let mut labels = Vec::new();
    for id in choice.ids() {
        let label = store
            .enum_value(id)?
            .map(|enum_value| enum_value.value)
            .unwrap_or_else(|| format!("#{id}"));
        labels.push(label);
    }
    Ok(labels.join(", "))
}
