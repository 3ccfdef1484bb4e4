//! Build-time assets under `$OUT_DIR`: roff man pages and shell completions.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::Shell;

// cli.rs needs only clap and clap_complete, both build-dependencies.
#[path = "src/cli.rs"]
#[allow(dead_code)]
mod cli;

const BIN: &str = "aquameter";

fn main() {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let Some(out_dir) = std::env::var_os("OUT_DIR").map(PathBuf::from) else {
        panic!("OUT_DIR not set by Cargo");
    };
    write_man_pages(&out_dir.join("man"));
    write_completions(&out_dir.join("completions"));
}

fn create_dir(dir: &Path) {
    fs::create_dir_all(dir).unwrap_or_else(|e| panic!("cannot create {}: {e}", dir.display()));
}

/// One page per visible command, named after its path: `aquameter-config-add.1`.
fn write_man_pages(dir: &Path) {
    create_dir(dir);

    let mut pending = VecDeque::from([(BIN.to_owned(), cli::Cli::command())]);
    while let Some((page, cmd)) = pending.pop_front() {
        pending.extend(
            cmd.get_subcommands()
                .filter(|sub| !sub.is_hide_set())
                .map(|sub| {
                    let name = format!("{page}-{}", sub.get_name());
                    (name.clone(), sub.clone().name(name))
                }),
        );

        let mut roff = Vec::new();
        clap_mangen::Man::new(cmd)
            .render(&mut roff)
            .unwrap_or_else(|e| panic!("cannot render {page}.1: {e}"));
        let path = dir.join(format!("{page}.1"));
        fs::write(&path, roff).unwrap_or_else(|e| panic!("cannot write {}: {e}", path.display()));
    }
}

fn write_completions(dir: &Path) {
    create_dir(dir);

    let mut cmd = cli::Cli::command();
    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
        clap_complete::generate_to(shell, &mut cmd, BIN, dir)
            .unwrap_or_else(|e| panic!("cannot write {shell} completions: {e}"));
    }
}
