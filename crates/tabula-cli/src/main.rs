use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use tabula_keys::KeyIndex;
use tabula_model::{ColumnDef, KeyScope};

#[derive(Parser)]
#[command(
    name = "tabula",
    about = "Manage grouped configuration tables: check key constraints, create tables, \
             and export encrypted binary images."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the key occupancy index over a config tree and report conflicts.
    Check {
        /// Config root (one directory per group).
        root: PathBuf,
    },
    /// Export every table under the config root as encrypted binary images.
    Export {
        root: PathBuf,
        /// Output directory; images land in per-group subdirectories.
        out_dir: PathBuf,
        /// Encryption key; the built-in development key is used when omitted.
        #[arg(long)]
        key: Option<String>,
    },
    /// Create a new empty table file.
    NewTable {
        root: PathBuf,
        group: String,
        name: String,
        /// Key scope: 'group' or 'global'.
        #[arg(long, default_value = "group")]
        scope: String,
        /// Column definition as 'name:type' (repeatable; the first column
        /// must be the int primary key).
        #[arg(long = "column", value_name = "NAME:TYPE", required = true)]
        columns: Vec<String>,
    },
    /// Decrypt a binary image and print its rows as JSON lines.
    Show {
        image: PathBuf,
        /// Table file providing the schema the image was exported with.
        #[arg(long)]
        table: PathBuf,
        #[arg(long)]
        key: Option<String>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Command::Check { root } => check(&root),
        Command::Export { root, out_dir, key } => export(&root, &out_dir, key.as_deref()),
        Command::NewTable {
            root,
            group,
            name,
            scope,
            columns,
        } => new_table(&root, &group, &name, &scope, &columns),
        Command::Show { image, table, key } => show(&image, &table, key.as_deref()),
    }
}

fn key_bytes(key: Option<&str>) -> Vec<u8> {
    key.map_or_else(|| tabula_export::DEFAULT_KEY.to_vec(), |k| k.as_bytes().to_vec())
}

fn check(root: &Path) -> Result<ExitCode> {
    let mut index = KeyIndex::new();
    let conflicts = tabula_store::rebuild_index(root, &mut index);
    for conflict in &conflicts {
        eprintln!("conflict: {conflict}");
    }
    println!(
        "{} keys registered, {} conflicts",
        index.len(),
        conflicts.len()
    );
    Ok(if conflicts.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn export(root: &Path, out_dir: &Path, key: Option<&str>) -> Result<ExitCode> {
    let key = key_bytes(key);
    let mut exported = 0usize;
    for (group, paths) in tabula_store::all_tables(root) {
        let group_dir = out_dir.join(&group);
        fs::create_dir_all(&group_dir)
            .with_context(|| format!("creating {}", group_dir.display()))?;
        for path in paths {
            let table = tabula_store::load_table(&path)
                .with_context(|| format!("loading {}", path.display()))?;
            let image = tabula_export::export_table(&table, &key)
                .with_context(|| format!("exporting table '{}'", table.table_name))?;
            let out_path = group_dir.join(format!("{}.bytes", table.table_name));
            fs::write(&out_path, image)
                .with_context(|| format!("writing {}", out_path.display()))?;
            exported += 1;
        }
    }
    println!("exported {exported} tables to {}", out_dir.display());
    Ok(ExitCode::SUCCESS)
}

fn new_table(
    root: &Path,
    group: &str,
    name: &str,
    scope: &str,
    columns: &[String],
) -> Result<ExitCode> {
    let scope: KeyScope = scope.parse()?;
    let mut defs = Vec::with_capacity(columns.len());
    for spec in columns {
        let Some((col_name, ty)) = spec.split_once(':') else {
            bail!("column '{spec}' is not in 'name:type' form");
        };
        defs.push(ColumnDef::new(col_name.trim(), ty.trim().parse()?));
    }

    let path = tabula_store::table_path(root, group, name);
    if path.exists() {
        bail!("table file {} already exists", path.display());
    }
    tabula_store::create_table(&path, name, group, defs, scope)
        .with_context(|| format!("creating {}", path.display()))?;
    println!("created {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn show(image: &Path, table: &Path, key: Option<&str>) -> Result<ExitCode> {
    let table = tabula_store::load_table(table)
        .with_context(|| format!("loading schema from {}", table.display()))?;
    let bytes = fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let rows = tabula_export::read_rows(&bytes, &table.columns, &key_bytes(key))
        .with_context(|| format!("decoding {}", image.display()))?;
    for row in rows {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(ExitCode::SUCCESS)
}
