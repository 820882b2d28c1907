//! `peerlab list` command handler

use std::io::Write;

use serde::Serialize;

use crate::error::CliError;
use crate::output::{OutputWriter, Render, write_columns};
use crate::scenarios;

/// Execute the `list` command.
pub fn execute(writer: &OutputWriter) -> Result<(), CliError> {
    writer.render(&build_list_report())
}

fn build_list_report() -> ScenarioList {
    let scenarios = scenarios::builtin()
        .iter()
        .map(|case| ScenarioEntry {
            name: case.name().to_owned(),
            description: case.description().to_owned(),
        })
        .collect();
    ScenarioList { scenarios }
}

/// Built-in scenarios available to `peerlab run`.
#[derive(Serialize)]
pub struct ScenarioList {
    pub scenarios: Vec<ScenarioEntry>,
}

#[derive(Serialize)]
pub struct ScenarioEntry {
    pub name: String,
    pub description: String,
}

impl Render for ScenarioList {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "{}", "Scenarios".bold())?;
        write_columns(
            w,
            self.scenarios
                .iter()
                .map(|s| (s.name.as_str(), s.description.as_str())),
        )
    }
}
