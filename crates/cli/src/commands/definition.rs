//! Workflow definition command

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;
use workflow_lib::workflow::WorkflowDefinition;
use workflow_lib::WorkloadConfig;

use crate::output::{print_json, OutputFormat};

/// Row for the parameter defaults table
#[derive(Tabled)]
struct ParameterRow {
    #[tabled(rename = "Parameter")]
    name: String,
    #[tabled(rename = "Default")]
    value: String,
}

/// Print the pipeline definition for the configured workload
pub fn show_definition(config: &WorkloadConfig, format: OutputFormat) -> Result<()> {
    let definition = WorkflowDefinition::from_config(config);

    match format {
        OutputFormat::Json => print_json(&definition.definition())?,
        OutputFormat::Table => {
            println!("{}", "Pipeline".bold());
            println!("{}", "=".repeat(60));
            println!("Name:          {}", definition.pipeline_name.cyan());
            println!("Bucket:        {}", definition.bucket);
            println!("Model group:   {}", definition.model_package_group);
            println!("Target:        {}", definition.target_attribute);
            println!("Endpoint type: {}", definition.endpoint_type);
            println!();

            let rows: Vec<ParameterRow> = definition
                .default_parameters()
                .to_parameters()
                .into_iter()
                .map(|p| ParameterRow {
                    name: p.name,
                    value: p.value,
                })
                .collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
