// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Mirror of the `abbs-meta` command line, used only for the man page
fn build_cli() -> Command {
    Command::new("abbs-meta")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Package metadata catalog for abbs trees")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .default_value("abbs-meta.toml")
                .help("Configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log per-group detail"),
        )
        .subcommand(Command::new("init").about("Create the catalog database"))
        .subcommand(
            Command::new("scan")
                .about("Reconcile configured trees from their checkouts on disk")
                .arg(Arg::new("tree").help("Only scan this tree")),
        )
        .subcommand(
            Command::new("reset")
                .about("Forget a tree's reconciled history")
                .arg(Arg::new("tree").required(true)),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("abbs-meta.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
