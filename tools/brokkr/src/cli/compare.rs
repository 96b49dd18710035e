use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use miette::Result;
use retarget::{
    RetargetConfig,
    compare::{ConfigDiff, EntryDiff, TableDiff},
    config::BodyCorrespondence,
};

const RULE_WIDTH: usize = 110;

/// Compare two retargeting configurations and highlight their differences.
#[derive(Parser, Debug)]
#[clap(name = "compare")]
pub struct Compare {
    /// The reference configuration
    pub a: PathBuf,

    /// The configuration compared against the reference
    pub b: PathBuf,

    /// Also compare `ik_match_table2`
    #[clap(long)]
    pub include_table2: bool,
}

impl Compare {
    pub fn compare(self) -> Result<()> {
        let a = RetargetConfig::load(&self.a)?;
        let b = RetargetConfig::load(&self.b)?;
        let diff = ConfigDiff::between(&a, &b, self.include_table2);

        println!("{} {}", "Config A:".bold(), self.a.display());
        println!("{} {}", "Config B:".bold(), self.b.display());

        if diff.is_empty() {
            println!("\n{}", "Configurations are equivalent".green().bold());
            return Ok(());
        }

        if !diff.fields.is_empty() {
            header("Settings", &format!("{:<26}{:>16}{:>16}", "Field", "Config A", "Config B"));
            for change in &diff.fields {
                println!("{:<26}{:>16}{:>16}", change.field, change.a, change.b.yellow());
            }
        }

        header(
            "Human Scale Table",
            &format!("{:<18}{:>7}{:>7}{:>7}", "Body Part", "A", "B", "Δ"),
        );
        for row in &diff.scale {
            let line = format!(
                "{:<18}{}{}{}",
                row.human_body,
                optional(row.a),
                optional(row.b),
                optional(row.delta())
            );
            if row.is_changed() {
                println!("{}", line.yellow());
            } else {
                println!("{line}");
            }
        }

        for table in &diff.tables {
            print_table(table);
        }

        Ok(())
    }
}

fn header(title: &str, columns: &str) {
    println!("\n{}", title.bold());
    println!("{}", "-".repeat(RULE_WIDTH));
    println!("{columns}");
    println!("{}", "-".repeat(RULE_WIDTH));
}

fn print_table(table: &TableDiff) {
    header(
        &format!("{} differences", table.table),
        &format!(
            "{:<18}{:<16}{:<16}{:>7}{:>7}{:>7}{:>7}{:>7}{:>7}",
            "Robot Part", "Human (A)", "Human (B)", "Pos A", "Pos B", "ΔP", "Rot A", "Rot B", "ΔR"
        ),
    );

    let mut changed = 0;
    for entry in table.changed() {
        changed += 1;
        print_entry(entry);
    }

    if changed == 0 {
        println!("{}", "no differences".dimmed());
    }
}

fn print_entry(entry: &EntryDiff) {
    let human = |side: Option<&BodyCorrespondence>| {
        side.map_or_else(|| "--".to_string(), |entry| entry.human_body.clone())
    };
    let (a, b) = (entry.a.as_ref(), entry.b.as_ref());

    println!(
        "{:<18}{:<16}{:<16}{}{}{}{}{}{}",
        entry.robot_body.bold(),
        human(a),
        human(b),
        optional(a.map(|entry| entry.position_weight)),
        optional(b.map(|entry| entry.position_weight)),
        optional(entry.position_weight_delta()),
        optional(a.map(|entry| entry.rotation_weight)),
        optional(b.map(|entry| entry.rotation_weight)),
        optional(entry.rotation_weight_delta()),
    );

    let quaternion = |side: Option<&BodyCorrespondence>| {
        side.map_or_else(
            || "[--]".to_string(),
            |entry| {
                let q = entry.rotation_offset;
                format!("[{:+.2}, {:+.2}, {:+.2}, {:+.2}]", q.w, q.i, q.j, q.k)
            },
        )
    };
    if a.map(|entry| entry.rotation_offset) != b.map(|entry| entry.rotation_offset) {
        println!(
            "{:<18}{} {} {}",
            "",
            quaternion(a).dimmed(),
            "->".dimmed(),
            quaternion(b)
        );
    }
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| format!("{:>7}", "--"), |value| format!("{value:7.2}"))
}
