// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn catalog_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("source")
            .default_value("datapackage.json")
            .help("Manifest file, package directory or URL"),
    )
    .arg(
        Arg::new("host")
            .long("host")
            .env("CKAN_HOST")
            .value_name("URL")
            .required(true)
            .help("Catalog base URL"),
    )
    .arg(
        Arg::new("key")
            .long("key")
            .env("CKAN_KEY")
            .value_name("KEY")
            .help("Catalog API key"),
    )
    .arg(
        Arg::new("timeout")
            .long("timeout")
            .value_name("SECONDS")
            .default_value("30")
            .help("HTTP request timeout in seconds"),
    )
}

fn datastore_flag(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("no_datastore")
            .long("no-datastore")
            .action(clap::ArgAction::SetTrue)
            .help("Do not register resource schemas with the datastore"),
    )
}

fn build_cli() -> Command {
    Command::new("dpsync")
        .version(env!("CARGO_PKG_VERSION"))
        .author("dpsync Contributors")
        .about("Publish and update data packages on a CKAN catalog")
        .subcommand_required(false)
        .subcommand(datastore_flag(catalog_args(
            Command::new("publish").about("Create the dataset and all of its resources"),
        )))
        .subcommand(datastore_flag(catalog_args(
            Command::new("update").about("Push only the resources that changed since the last run"),
        )))
        .subcommand(datastore_flag(catalog_args(
            Command::new("sync").about("Publish if the dataset is absent, update otherwise"),
        )))
        .subcommand(catalog_args(
            Command::new("diff").about("Show which resources differ from the published dataset"),
        ))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer)
        .expect("Failed to render man page");

    let man_path = man_dir.join("dpsync.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
